//! Tiered replacement search used by team deactivation.
//!
//! A vacated reviewer slot is refilled from the first tier that yields any
//! eligible user: the outgoing reviewer's team, then the author's team, then
//! every active user.

use std::collections::{HashMap, HashSet};

use crate::db::ReviewStore;
use crate::errors::AppError;
use crate::models::{ReplacementStrategy, User};

/// One stage of the fallback search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    SameTeam,
    AuthorTeam,
    Global,
}

impl Tier {
    /// Tiers in search order for a strategy.
    ///
    /// The author-team tier always follows an exhausted same-team tier,
    /// whatever strategy was requested.
    pub fn order(strategy: ReplacementStrategy) -> &'static [Tier] {
        match strategy {
            ReplacementStrategy::SameTeam => &[Tier::SameTeam, Tier::AuthorTeam, Tier::Global],
            ReplacementStrategy::AuthorTeam => &[Tier::AuthorTeam, Tier::Global],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::SameTeam => "same_team",
            Tier::AuthorTeam => "author_team",
            Tier::Global => "global",
        }
    }
}

/// Author records resolved during one deactivation call.
///
/// A missing author is cached as `None` too, so the store is asked once.
#[derive(Debug, Default)]
pub struct AuthorCache {
    authors: HashMap<String, Option<User>>,
}

impl AuthorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &mut self,
        store: &dyn ReviewStore,
        author_id: &str,
    ) -> Result<Option<User>, AppError> {
        if let Some(cached) = self.authors.get(author_id) {
            return Ok(cached.clone());
        }

        let author = store.get_user(author_id).await?;
        self.authors.insert(author_id.to_string(), author.clone());
        Ok(author)
    }
}

/// Everything a tier query needs to know about one vacated slot.
#[derive(Debug)]
pub struct SearchContext<'a> {
    pub outgoing: &'a User,
    pub author_id: &'a str,
    /// `None` when the author no longer exists; the author-team tier is then empty.
    pub author: Option<&'a User>,
    /// Reviewers the request keeps or has already gained, outgoing one removed.
    pub working_set: &'a [String],
    pub deactivation_set: &'a HashSet<String>,
}

/// Drop ineligible users from a tier pool and collapse duplicate ids.
///
/// Ineligible means the author, someone already on the request, or someone
/// being deactivated.
pub fn filter_candidates(
    pool: Vec<User>,
    author_id: &str,
    working_set: &[String],
    deactivation_set: &HashSet<String>,
) -> Vec<User> {
    let mut seen = HashSet::new();
    pool.into_iter()
        .filter(|user| user.user_id != author_id)
        .filter(|user| !working_set.contains(&user.user_id))
        .filter(|user| !deactivation_set.contains(&user.user_id))
        .filter(|user| seen.insert(user.user_id.clone()))
        .collect()
}

/// Eligible candidates produced by a single tier.
pub async fn search_tier(
    store: &dyn ReviewStore,
    tier: Tier,
    ctx: &SearchContext<'_>,
) -> Result<Vec<User>, AppError> {
    let pool = match tier {
        Tier::SameTeam => {
            store
                .get_active_users_by_team(&ctx.outgoing.team_name, Some(&ctx.outgoing.user_id))
                .await?
        }
        Tier::AuthorTeam => match ctx.author {
            Some(author) => {
                store
                    .get_active_users_by_team(&author.team_name, Some(&author.user_id))
                    .await?
            }
            None => Vec::new(),
        },
        Tier::Global => {
            let mut exclude: Vec<String> = ctx.working_set.to_vec();
            exclude.extend(ctx.deactivation_set.iter().cloned());
            exclude.push(ctx.outgoing.user_id.clone());
            store.get_all_active_users(&exclude).await?
        }
    };

    Ok(filter_candidates(
        pool,
        ctx.author_id,
        ctx.working_set,
        ctx.deactivation_set,
    ))
}

/// Walk the tiers for `strategy` and return the first non-empty pool, tagged
/// with the tier that produced it.
pub async fn find_candidates(
    store: &dyn ReviewStore,
    strategy: ReplacementStrategy,
    ctx: &SearchContext<'_>,
) -> Result<Option<(Tier, Vec<User>)>, AppError> {
    for &tier in Tier::order(strategy) {
        let candidates = search_tier(store, tier, ctx).await?;
        if !candidates.is_empty() {
            return Ok(Some((tier, candidates)));
        }
        tracing::debug!(
            reviewer = %ctx.outgoing.user_id,
            tier = tier.as_str(),
            "No replacement candidates in tier"
        );
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn user(id: &str, team: &str, is_active: bool) -> User {
        User {
            user_id: id.to_string(),
            username: id.to_string(),
            team_name: team.to_string(),
            is_active,
        }
    }

    fn ids(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.user_id.as_str()).collect()
    }

    async fn store_with(users: &[User]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for u in users {
            store.create_or_update_user(u).await.unwrap();
        }
        store
    }

    #[test]
    fn test_filter_excludes_working_deactivation_and_author() {
        let pool = vec![
            user("a", "t", true),
            user("b", "t", true),
            user("c", "t", true),
            user("d", "t", true),
            user("b", "t", true),
        ];
        let deactivating: HashSet<String> = ["c".to_string()].into();

        let kept = filter_candidates(pool, "d", &["a".to_string()], &deactivating);

        assert_eq!(ids(&kept), vec!["b"]);
    }

    #[test]
    fn test_tier_order_per_strategy() {
        assert_eq!(
            Tier::order(ReplacementStrategy::SameTeam),
            &[Tier::SameTeam, Tier::AuthorTeam, Tier::Global]
        );
        assert_eq!(
            Tier::order(ReplacementStrategy::AuthorTeam),
            &[Tier::AuthorTeam, Tier::Global]
        );
    }

    #[tokio::test]
    async fn test_same_team_exhaustion_falls_to_author_team() {
        let outgoing = user("r1", "ops", true);
        let author = user("au", "web", true);
        let store = store_with(&[
            outgoing.clone(),
            user("r2", "ops", true),
            author.clone(),
            user("w1", "web", true),
            user("g1", "misc", true),
        ])
        .await;
        let deactivating: HashSet<String> = ["r1".to_string(), "r2".to_string()].into();

        let ctx = SearchContext {
            outgoing: &outgoing,
            author_id: "au",
            author: Some(&author),
            working_set: &[],
            deactivation_set: &deactivating,
        };

        let same_team = search_tier(&store, Tier::SameTeam, &ctx).await.unwrap();
        assert!(same_team.is_empty());

        let (tier, found) = find_candidates(&store, ReplacementStrategy::SameTeam, &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tier, Tier::AuthorTeam);
        assert_eq!(ids(&found), vec!["w1"]);
    }

    #[tokio::test]
    async fn test_missing_author_skips_to_global() {
        let outgoing = user("r1", "ops", true);
        let store = store_with(&[outgoing.clone(), user("g1", "misc", true)]).await;
        let deactivating: HashSet<String> = ["r1".to_string()].into();

        let ctx = SearchContext {
            outgoing: &outgoing,
            author_id: "ghost",
            author: None,
            working_set: &[],
            deactivation_set: &deactivating,
        };

        let (tier, found) = find_candidates(&store, ReplacementStrategy::AuthorTeam, &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tier, Tier::Global);
        assert_eq!(ids(&found), vec!["g1"]);
    }

    #[tokio::test]
    async fn test_global_tier_skips_inactive_and_kept_reviewers() {
        let outgoing = user("r1", "ops", true);
        let store = store_with(&[
            outgoing.clone(),
            user("keep", "misc", true),
            user("off", "misc", false),
        ])
        .await;
        let deactivating: HashSet<String> = ["r1".to_string()].into();

        let ctx = SearchContext {
            outgoing: &outgoing,
            author_id: "au",
            author: None,
            working_set: &["keep".to_string()],
            deactivation_set: &deactivating,
        };

        assert!(find_candidates(&store, ReplacementStrategy::SameTeam, &ctx)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_author_cache_asks_store_once() {
        let store = store_with(&[user("au", "web", true)]).await;
        let mut cache = AuthorCache::new();

        let first = cache.resolve(&store, "au").await.unwrap();
        store
            .update_user_active("au", false)
            .await
            .unwrap();
        let second = cache.resolve(&store, "au").await.unwrap();

        assert_eq!(first, second);
        assert!(first.unwrap().is_active);
        assert!(cache.resolve(&store, "ghost").await.unwrap().is_none());
    }
}
