//! # Profile Endpoint
//!
//! Keyed read of the `users` table through the REST API.

use async_trait::async_trait;
use lib_auth::ProfileStore;
use lib_core::{AppError, Result};
use shared::Profile;

use super::client::{network_error, read_json, ApiClient};

const PROFILE_TABLE_PATH: &str = "/rest/v1/users";

#[async_trait]
impl ProfileStore for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let filter = format!("eq.{}", user_id);

        let response = self
            .client
            .get(self.url(PROFILE_TABLE_PATH))
            .query(&[("id", filter.as_str()), ("select", "*")])
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| network_error(e, "Fetch profile"))?;

        let rows: Vec<Profile> = read_json(response, "Fetch profile").await?;
        single_row(rows, user_id)
    }
}

/// The row for `user_id`; no rows means the profile is not materialized yet.
fn single_row(rows: Vec<Profile>, user_id: &str) -> Result<Profile> {
    if rows.len() > 1 {
        tracing::warn!(user_id, rows = rows.len(), "Multiple profile rows for one user");
    }

    rows.into_iter()
        .find(|row| row.id == user_id)
        .ok_or_else(|| AppError::NotFound("User profile not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lib_auth::MemoryStore;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn profile_server(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_TABLE_PATH))
            .and(query_param("id", "eq.u1"))
            .and(query_param("select", "*"))
            .and(header("authorization", "Bearer anon"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), "anon", Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_get_profile_without_rows_is_not_found() {
        // Arrange
        let server = profile_server(200, serde_json::json!([])).await;
        let client = client_for(&server);

        // Act
        let result = client.get_profile("u1").await;

        // Assert
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_get_profile_accepts_null_columns() {
        // Arrange
        let server = profile_server(
            200,
            serde_json::json!([{
                "id": "u1",
                "full_name": "Ana",
                "kyc_status": null,
                "role": null,
                "trading_balance": null,
                "preferences": null,
                "created_at": "2025-01-01T00:00:00.123456+00:00",
                "updated_at": null
            }]),
        )
        .await;
        let client = client_for(&server);

        // Act
        let profile = client.get_profile("u1").await.unwrap();

        // Assert
        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.trading_balance, 0.0);
        assert!(profile.preferences.is_empty());
        assert!(profile.created_at.is_some());
    }

    #[tokio::test]
    async fn test_get_profile_server_error_is_api_error() {
        // Arrange
        let server = profile_server(500, serde_json::json!({ "message": "boom" })).await;
        let client = client_for(&server);

        // Act
        let result = client.get_profile("u1").await;

        // Assert
        assert!(matches!(result, Err(AppError::Api(msg)) if msg.contains("boom")));
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let result = single_row(Vec::new(), "u1");

        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_matching_row_is_returned() {
        let rows: Vec<Profile> =
            serde_json::from_str(r#"[{"id": "u1", "full_name": "Ana", "trading_balance": 10.5}]"#).unwrap();

        let profile = single_row(rows, "u1").unwrap();

        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.trading_balance, 10.5);
    }

    #[test]
    fn test_row_for_another_user_is_ignored() {
        let rows = vec![Profile::new("u2")];

        assert!(single_row(rows, "u1").is_err());
    }
}
