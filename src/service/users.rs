//! User operations.

use super::{require, ReviewService};
use crate::errors::AppError;
use crate::models::{User, UserReviews};

impl ReviewService {
    pub async fn set_user_is_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        require(user_id, "user_id")?;

        self.within_deadline(async {
            self.store.update_user_active(user_id, is_active).await?;
            tracing::info!(user = %user_id, is_active, "User activity changed");

            self.store
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
        })
        .await
    }

    /// Pull requests the user currently reviews, newest first.
    pub async fn get_user_reviews(&self, user_id: &str) -> Result<UserReviews, AppError> {
        self.within_deadline(async {
            if self.store.get_user(user_id).await?.is_none() {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }

            let pull_requests = self.store.get_prs_by_reviewer(user_id).await?;
            Ok(UserReviews {
                user_id: user_id.to_string(),
                pull_requests,
            })
        })
        .await
    }
}
