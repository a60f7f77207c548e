//! SQLite repository implementing `ReviewStore`.
//!
//! Multi-row writes run inside transactions; pull request writes are
//! conditional on status and version so concurrent writers to one pull
//! request are serialized or rejected.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::ReviewStore;
use crate::errors::AppError;
use crate::models::{
    PullRequest, PullRequestShort, PullRequestStatus, ReviewerStat, Team, TeamMember, User,
};

const USER_COLUMNS: &str = "user_id, username, team_name, is_active";

/// SQLite-backed store.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn reviewers_of(&self, pull_request_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT reviewer_id FROM pull_request_reviewers WHERE pull_request_id = ? ORDER BY slot",
        )
        .bind(pull_request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("reviewer_id")).collect())
    }
}

#[async_trait]
impl ReviewStore for Repository {
    // ==================== TEAM OPERATIONS ====================

    async fn team_exists(&self, team_name: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM teams WHERE team_name = ?")
            .bind(team_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_team(&self, team: &Team) -> Result<(), AppError> {
        let now = timestamp(&Utc::now());
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query("INSERT INTO teams (team_name, created_at) VALUES (?, ?)")
            .bind(&team.team_name)
            .bind(&now)
            .execute(&mut *tx)
            .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(AppError::TeamExists(format!(
                    "Team {} already exists",
                    team.team_name
                )));
            }
            return Err(err.into());
        }

        for user in team.member_users() {
            upsert_user(&mut tx, &user, &now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_team(&self, team_name: &str) -> Result<Option<Team>, AppError> {
        if !self.team_exists(team_name).await? {
            return Ok(None);
        }

        let members = self
            .get_users_by_team(team_name)
            .await?
            .into_iter()
            .map(|user| TeamMember {
                user_id: user.user_id,
                username: user.username,
                is_active: user.is_active,
            })
            .collect();

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }

    async fn bulk_deactivate_by_team(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE users SET is_active = 0, updated_at = ? WHERE team_name = ? AND is_active = 1 AND user_id IN ({})",
            placeholders(user_ids.len())
        );
        let now = timestamp(&Utc::now());

        let mut query = sqlx::query(&sql).bind(&now).bind(team_name);
        for id in user_ids {
            query = query.bind(id);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    // ==================== USER OPERATIONS ====================

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn create_or_update_user(&self, user: &User) -> Result<(), AppError> {
        let now = timestamp(&Utc::now());
        let mut conn = self.pool.acquire().await?;
        upsert_user(&mut conn, user, &now).await?;
        Ok(())
    }

    async fn get_active_users_by_team(
        &self,
        team_name: &str,
        exclude_user_id: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE team_name = ? AND is_active = 1 AND (? IS NULL OR user_id != ?) ORDER BY user_id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(team_name)
            .bind(exclude_user_id)
            .bind(exclude_user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get_all_active_users(&self, exclude_ids: &[String]) -> Result<Vec<User>, AppError> {
        let mut sql = format!("SELECT {} FROM users WHERE is_active = 1", USER_COLUMNS);
        if !exclude_ids.is_empty() {
            sql.push_str(&format!(
                " AND user_id NOT IN ({})",
                placeholders(exclude_ids.len())
            ));
        }
        sql.push_str(" ORDER BY user_id");

        let mut query = sqlx::query(&sql);
        for id in exclude_ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn update_user_active(&self, user_id: &str, is_active: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE user_id = ?")
            .bind(is_active as i32)
            .bind(timestamp(&Utc::now()))
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn get_users_by_team(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE team_name = ? ORDER BY user_id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(team_name)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    // ==================== PULL REQUEST OPERATIONS ====================

    async fn pr_exists(&self, pull_request_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM pull_requests WHERE pull_request_id = ?")
            .bind(pull_request_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_pr(&self, pr: &PullRequest) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // The primary key settles concurrent creations of the same id
        let inserted = sqlx::query(
            r#"INSERT INTO pull_requests (
                pull_request_id, pull_request_name, author_id, status, created_at, merged_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&pr.pull_request_id)
        .bind(&pr.pull_request_name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(timestamp(&pr.created_at))
        .bind(pr.merged_at.as_ref().map(timestamp))
        .bind(pr.version)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(AppError::PrExists(format!(
                    "Pull request {} already exists",
                    pr.pull_request_id
                )));
            }
            return Err(err.into());
        }

        insert_reviewers(&mut tx, &pr.pull_request_id, &pr.assigned_reviewers).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_pr(&self, pull_request_id: &str) -> Result<Option<PullRequest>, AppError> {
        let row = sqlx::query(
            r#"SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at, version
               FROM pull_requests WHERE pull_request_id = ?"#,
        )
        .bind(pull_request_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reviewers = self.reviewers_of(pull_request_id).await?;
        pr_from_row(&row, reviewers).map(Some)
    }

    async fn update_pr_status(
        &self,
        pull_request_id: &str,
        status: PullRequestStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        // merged_at is written once; COALESCE keeps an existing value
        let result = sqlx::query(
            r#"UPDATE pull_requests
               SET status = ?, merged_at = COALESCE(merged_at, ?), version = version + 1
               WHERE pull_request_id = ? AND status = 'OPEN'"#,
        )
        .bind(status.as_str())
        .bind(merged_at.as_ref().map(timestamp))
        .bind(pull_request_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_pr_reviewers(
        &self,
        pull_request_id: &str,
        reviewers: &[String],
        expected_version: Option<i64>,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        // Take the write lock first so the version check and the reviewer
        // rewrite are one unit.
        let updated = sqlx::query(
            r#"UPDATE pull_requests SET version = version + 1
               WHERE pull_request_id = ? AND status = 'OPEN' AND (? IS NULL OR version = ?)
               RETURNING version"#,
        )
        .bind(pull_request_id)
        .bind(expected_version)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            let current = sqlx::query(
                "SELECT status, version FROM pull_requests WHERE pull_request_id = ?",
            )
            .bind(pull_request_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match current {
                None => AppError::NotFound(format!("Pull request {} not found", pull_request_id)),
                Some(row) if row.get::<String, _>("status") != PullRequestStatus::Open.as_str() => {
                    AppError::PrMerged(format!(
                        "Pull request {} is merged and cannot be changed",
                        pull_request_id
                    ))
                }
                Some(row) => AppError::Conflict {
                    message: format!(
                        "Concurrent modification detected for pull request {}",
                        pull_request_id
                    ),
                    current_version: row.get("version"),
                },
            });
        };

        sqlx::query("DELETE FROM pull_request_reviewers WHERE pull_request_id = ?")
            .bind(pull_request_id)
            .execute(&mut *tx)
            .await?;

        insert_reviewers(&mut tx, pull_request_id, reviewers).await?;

        tx.commit().await?;
        Ok(updated.get("version"))
    }

    async fn get_prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        let rows = sqlx::query(
            r#"SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id, pr.status
               FROM pull_requests pr
               INNER JOIN pull_request_reviewers prr ON pr.pull_request_id = prr.pull_request_id
               WHERE prr.reviewer_id = ?
               ORDER BY pr.created_at DESC, pr.pull_request_id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pr_short_from_row).collect()
    }

    async fn get_open_prs_by_reviewers(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"SELECT pr.pull_request_id FROM pull_requests pr
               WHERE pr.status = 'OPEN' AND EXISTS (
                   SELECT 1 FROM pull_request_reviewers prr
                   WHERE prr.pull_request_id = pr.pull_request_id AND prr.reviewer_id IN ({})
               )
               ORDER BY pr.created_at, pr.pull_request_id"#,
            placeholders(user_ids.len())
        );

        let mut query = sqlx::query(&sql);
        for id in user_ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("pull_request_id")).collect())
    }

    async fn get_reviewer_stats(&self) -> Result<(Vec<ReviewerStat>, i64), AppError> {
        let rows = sqlx::query(
            r#"SELECT reviewer_id, COUNT(*) AS reviews_count
               FROM pull_request_reviewers
               GROUP BY reviewer_id
               ORDER BY reviews_count DESC, reviewer_id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let stats: Vec<ReviewerStat> = rows
            .iter()
            .map(|row| ReviewerStat {
                user_id: row.get("reviewer_id"),
                reviews_count: row.get("reviews_count"),
            })
            .collect();
        let total = stats.iter().map(|stat| stat.reviews_count).sum();

        Ok((stats, total))
    }
}

// Helper functions for writes and row conversion

async fn upsert_user(
    conn: &mut SqliteConnection,
    user: &User,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO users (user_id, username, team_name, is_active, updated_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (user_id) DO UPDATE SET
               username = excluded.username,
               team_name = excluded.team_name,
               is_active = excluded.is_active,
               updated_at = excluded.updated_at"#,
    )
    .bind(&user.user_id)
    .bind(&user.username)
    .bind(&user.team_name)
    .bind(user.is_active as i32)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_reviewers(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    reviewers: &[String],
) -> Result<(), sqlx::Error> {
    for (slot, reviewer_id) in reviewers.iter().enumerate() {
        sqlx::query(
            "INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id, slot) VALUES (?, ?, ?)",
        )
        .bind(pull_request_id)
        .bind(reviewer_id)
        .bind(slot as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp {:?}: {}", value, e)))
}

fn parse_status(value: &str) -> Result<PullRequestStatus, AppError> {
    PullRequestStatus::from_str(value)
        .ok_or_else(|| AppError::Database(format!("Invalid pull request status {:?}", value)))
}

fn user_from_row(row: &SqliteRow) -> User {
    let is_active: i32 = row.get("is_active");
    User {
        user_id: row.get("user_id"),
        username: row.get("username"),
        team_name: row.get("team_name"),
        is_active: is_active != 0,
    }
}

fn pr_from_row(row: &SqliteRow, assigned_reviewers: Vec<String>) -> Result<PullRequest, AppError> {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let merged_at: Option<String> = row.get("merged_at");

    Ok(PullRequest {
        pull_request_id: row.get("pull_request_id"),
        pull_request_name: row.get("pull_request_name"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
        assigned_reviewers,
        created_at: parse_timestamp(&created_at)?,
        merged_at: merged_at.as_deref().map(parse_timestamp).transpose()?,
        version: row.get("version"),
    })
}

fn pr_short_from_row(row: &SqliteRow) -> Result<PullRequestShort, AppError> {
    let status: String = row.get("status");
    Ok(PullRequestShort {
        pull_request_id: row.get("pull_request_id"),
        pull_request_name: row.get("pull_request_name"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
    })
}
