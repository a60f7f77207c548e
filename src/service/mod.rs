//! Review service.
//!
//! The operations callers invoke: team management, user activation, pull
//! request lifecycle and reviewer statistics. Each operation runs under the
//! configured deadline.

mod pull_requests;
mod teams;
mod users;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::assignment::{DeactivationSettings, Selector};
use crate::config::Config;
use crate::db::ReviewStore;
use crate::errors::AppError;

/// Shared engine handle. Cheap to clone through the `Arc` in `AppState`.
pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    selector: Selector,
    deadline: Duration,
    deactivation: DeactivationSettings,
}

impl ReviewService {
    pub fn new(store: Arc<dyn ReviewStore>, config: &Config) -> Self {
        Self::with_selector(
            store,
            Selector::new(config.rng_seed),
            config.operation_timeout,
            DeactivationSettings {
                revalidate_before_write: config.revalidate_before_write,
                max_attempts: config.max_reassign_attempts,
            },
        )
    }

    pub fn with_selector(
        store: Arc<dyn ReviewStore>,
        selector: Selector,
        deadline: Duration,
        deactivation: DeactivationSettings,
    ) -> Self {
        Self {
            store,
            selector,
            deadline,
            deactivation,
        }
    }

    pub fn store(&self) -> &dyn ReviewStore {
        self.store.as_ref()
    }

    /// Drop `operation` and fail with `Timeout` once the deadline passes.
    /// Store writes committed before that point stay committed.
    async fn within_deadline<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.deadline, operation).await?
    }
}

/// Reject blank identifiers before they reach the store.
fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::{Team, TeamMember};

    pub fn service() -> ReviewService {
        ReviewService::with_selector(
            Arc::new(InMemoryStore::new()),
            Selector::seeded(5),
            Duration::from_secs(5),
            DeactivationSettings::default(),
        )
    }

    pub async fn add_team(service: &ReviewService, name: &str, members: &[(&str, bool)]) {
        service
            .create_team(Team {
                team_name: name.to_string(),
                members: members
                    .iter()
                    .map(|(id, is_active)| TeamMember {
                        user_id: id.to_string(),
                        username: format!("{}-name", id),
                        is_active: *is_active,
                    })
                    .collect(),
            })
            .await
            .unwrap();
    }
}
