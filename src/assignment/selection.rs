//! Uniform random reviewer selection.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::User;

/// Shared random source for reviewer picks.
///
/// Seeded selectors replay the same picks for the same inputs.
pub struct Selector {
    rng: Mutex<StdRng>,
}

impl Selector {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Pick `min(k, candidates.len())` distinct user ids without replacement.
    pub fn select_random(&self, candidates: &[User], k: usize) -> Vec<String> {
        if candidates.is_empty() || k == 0 {
            return Vec::new();
        }

        // A poisoned lock only means another pick panicked; the rng is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        candidates
            .choose_multiple(&mut *rng, k)
            .map(|user| user.user_id.clone())
            .collect()
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn users(ids: &[&str]) -> Vec<User> {
        ids.iter()
            .map(|id| User {
                user_id: id.to_string(),
                username: id.to_string(),
                team_name: "t".to_string(),
                is_active: true,
            })
            .collect()
    }

    #[test]
    fn test_seeded_selection_is_deterministic() {
        let pool = users(&["a", "b", "c", "d", "e"]);

        let first = Selector::seeded(7).select_random(&pool, 2);
        let second = Selector::seeded(7).select_random(&pool, 2);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_picks_are_distinct_and_capped() {
        let pool = users(&["a", "b", "c"]);
        let selector = Selector::seeded(1);

        for _ in 0..20 {
            let picked = selector.select_random(&pool, 5);
            let unique: HashSet<&String> = picked.iter().collect();
            assert_eq!(picked.len(), 3);
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_empty_pool_yields_nothing() {
        let selector = Selector::from_entropy();
        assert!(selector.select_random(&[], 2).is_empty());
        assert!(selector.select_random(&users(&["a"]), 0).is_empty());
    }

    #[test]
    fn test_input_is_untouched() {
        let pool = users(&["a", "b", "c", "d"]);
        let before = pool.clone();
        Selector::seeded(3).select_random(&pool, 2);
        assert_eq!(pool, before);
    }
}
