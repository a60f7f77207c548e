//! Integration tests for the roster backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::assignment::{DeactivationSettings, Selector};
use crate::db::{init_database, Repository};
use crate::service::ReviewService;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let service = ReviewService::with_selector(
            Arc::new(Repository::new(pool)),
            Selector::seeded(42),
            Duration::from_secs(10),
            DeactivationSettings::default(),
        );

        let state = AppState {
            service: Arc::new(service),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn add_team(&self, name: &str, ids: &[&str]) {
        let members: Vec<Value> = ids
            .iter()
            .map(|id| json!({"user_id": id, "username": format!("User {}", id), "is_active": true}))
            .collect();
        let (status, _) = self
            .post("/team/add", json!({"team_name": name, "members": members}))
            .await;
        assert_eq!(status, 201);
    }

    async fn create_pr(&self, id: &str, author: &str) -> (u16, Value) {
        self.post(
            "/pullRequest/create",
            json!({"pull_request_id": id, "pull_request_name": format!("Change {}", id), "author_id": author}),
        )
        .await
    }
}

fn reviewers(pr: &Value) -> Vec<String> {
    pr["assigned_reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_team_lifecycle() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u2", "u1"]).await;

    let (status, body) = fixture.get("/team/get?team_name=backend").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["team_name"], "backend");
    assert_eq!(body["data"]["members"][0]["user_id"], "u1");
    assert_eq!(body["data"]["members"][1]["user_id"], "u2");

    let (status, body) = fixture
        .post("/team/add", json!({"team_name": "backend", "members": []}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "TEAM_EXISTS");

    let (status, body) = fixture.get("/team/get?team_name=nope").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_pull_request_flow() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u1", "u2", "u3", "u4"]).await;

    let (status, body) = fixture.create_pr("pr-1", "u1").await;
    assert_eq!(status, 201);
    let pr = &body["data"];
    assert_eq!(pr["status"], "OPEN");
    assert!(pr.get("merged_at").is_none());
    let assigned = reviewers(pr);
    assert_eq!(assigned.len(), 2);
    assert!(!assigned.contains(&"u1".to_string()));

    let (status, body) = fixture.create_pr("pr-1", "u1").await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "PR_EXISTS");

    // Reassign the first reviewer; the only free teammate takes the slot.
    let outgoing = assigned[0].clone();
    let (status, body) = fixture
        .post(
            "/pullRequest/reassign",
            json!({"pull_request_id": "pr-1", "old_user_id": outgoing}),
        )
        .await;
    assert_eq!(status, 200);
    let replaced_by = body["data"]["replaced_by"].as_str().unwrap().to_string();
    let after = reviewers(&body["data"]["pr"]);
    assert_eq!(after, vec![replaced_by.clone(), assigned[1].clone()]);
    assert!(!after.contains(&outgoing));

    let (status, body) = fixture.get(&format!("/users/getReview?user_id={}", replaced_by)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["pull_requests"][0]["pull_request_id"], "pr-1");

    // Merge twice: same snapshot both times
    let (status, first) = fixture
        .post("/pullRequest/merge", json!({"pull_request_id": "pr-1"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["status"], "MERGED");
    let (_, second) = fixture
        .post("/pullRequest/merge", json!({"pull_request_id": "pr-1"}))
        .await;
    assert_eq!(first["data"]["merged_at"], second["data"]["merged_at"]);

    let (status, body) = fixture
        .post(
            "/pullRequest/reassign",
            json!({"pull_request_id": "pr-1", "old_user_id": replaced_by}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "PR_MERGED");
}

#[tokio::test]
async fn test_reassign_error_codes() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u1", "u2", "u3"]).await;
    fixture.create_pr("pr-1", "u1").await;

    let (status, body) = fixture
        .post(
            "/pullRequest/reassign",
            json!({"pull_request_id": "pr-1", "old_user_id": "u2"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE");

    let (status, body) = fixture
        .post(
            "/pullRequest/reassign",
            json!({"pull_request_id": "pr-1", "old_user_id": "u1"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "NOT_ASSIGNED");

    let (status, body) = fixture
        .post(
            "/pullRequest/reassign",
            json!({"pull_request_id": "missing", "old_user_id": "u2"}),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_deactivate_team_moves_reviews() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u1", "u2", "u3"]).await;
    fixture.add_team("platform", &["p1", "p2"]).await;
    fixture.create_pr("pr-1", "u1").await;

    let (status, body) = fixture
        .post(
            "/team/deactivate",
            json!({"team_name": "backend", "replacement_strategy": "author_team"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["deactivated_users"], 3);
    assert_eq!(body["data"]["reassigned_prs"], 2);
    assert_eq!(body["data"]["skipped_prs"], 0);

    let (_, body) = fixture.get("/team/get?team_name=backend").await;
    for member in body["data"]["members"].as_array().unwrap() {
        assert_eq!(member["is_active"], false);
    }

    for id in ["p1", "p2"] {
        let (_, body) = fixture.get(&format!("/users/getReview?user_id={}", id)).await;
        assert_eq!(body["data"]["pull_requests"][0]["pull_request_id"], "pr-1");
    }
}

#[tokio::test]
async fn test_deactivate_team_partial_failure() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u1", "u2", "u3"]).await;
    fixture.create_pr("pr-1", "u1").await;

    let (status, body) = fixture
        .post("/team/deactivate", json!({"team_name": "backend"}))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE");
    assert_eq!(body["error"]["details"]["deactivated_users"], 3);
    assert_eq!(body["error"]["details"]["skipped_prs"], 1);

    let (status, body) = fixture
        .post(
            "/team/deactivate",
            json!({"team_name": "backend", "replacement_strategy": "nearest"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["message"], "invalid replacement strategy");
}

#[tokio::test]
async fn test_set_is_active_and_stats() {
    let fixture = TestFixture::new().await;
    fixture.add_team("backend", &["u1", "u2"]).await;
    fixture.create_pr("pr-1", "u1").await;
    fixture.create_pr("pr-2", "u1").await;

    let (status, body) = fixture
        .post("/users/setIsActive", json!({"user_id": "u2", "is_active": false}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = fixture
        .post("/users/setIsActive", json!({"user_id": "ghost", "is_active": true}))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    // u2 is inactive, so the third request gets nobody
    let (_, body) = fixture.create_pr("pr-3", "u1").await;
    assert!(reviewers(&body["data"]).is_empty());

    let (status, body) = fixture.get("/stats/reviewers").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total_reviews"], 2);
    assert_eq!(body["data"]["stats"][0]["user_id"], "u2");
    assert_eq!(body["data"]["stats"][0]["reviews_count"], 2);
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/pullRequest/create", json!({"pull_request_id": "pr-1"}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = fixture.get("/users/getReview").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
