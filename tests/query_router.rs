//! Query Router Integration Tests
//!
//! Drives the query layer with a recording mock client to verify:
//! - fetch strategy selection (bounded vs bulk)
//! - session lifecycle (every unit of work logs out, including failures)
//! - error translation (timeouts, auth failures, empty results)
//! - normalization of heterogeneous records

use litehouse::client::{BillingClient, ClientError, RawRecord};
use litehouse::query::{
    close_session, execute, list_entities, list_entity_fields, open_session, run_query,
    test_connection, ENTITY_LIST_SQL,
};
use litehouse::{ConnectionProfile, FetchStrategy, LitehouseError, QueryRequest};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Login(String),
    Query { sql: String, offset: u64, limit: u64 },
    Bulk(String),
    Logout(u32),
}

/// Mock client that records every call and replays canned results
struct MockClient {
    login: Result<u32, ClientError>,
    response: Result<Vec<RawRecord>, ClientError>,
    calls: Mutex<Vec<Call>>,
}

impl MockClient {
    fn returning(records: serde_json::Value) -> Self {
        Self {
            login: Ok(7),
            response: Ok(serde_json::from_value(records).unwrap()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_query(err: ClientError) -> Self {
        Self { response: Err(err), ..Self::returning(json!([])) }
    }

    fn failing_login(err: ClientError) -> Self {
        Self { login: Err(err), ..Self::returning(json!([])) }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn logouts(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Logout(_))).count()
    }
}

impl BillingClient for MockClient {
    type Session = u32;

    async fn get_session(&self, profile: &ConnectionProfile) -> Result<u32, ClientError> {
        self.calls.lock().push(Call::Login(profile.name.clone()));
        self.login.clone()
    }

    async fn query(
        &self,
        _session: &u32,
        sql: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawRecord>, ClientError> {
        self.calls.lock().push(Call::Query {
            sql: sql.to_string(),
            offset,
            limit,
        });
        self.response.clone()
    }

    async fn bulk_query(&self, _session: &u32, sql: &str) -> Result<Vec<RawRecord>, ClientError> {
        self.calls.lock().push(Call::Bulk(sql.to_string()));
        self.response.clone()
    }

    async fn logout(&self, session: u32) {
        self.calls.lock().push(Call::Logout(session));
    }
}

fn profile() -> ConnectionProfile {
    litehouse::ConnectionInput {
        name: "Production".to_string(),
        base_url: "https://prod.billing.example.com".to_string(),
        ..Default::default()
    }
    .into_profile("13a7c655a7d4213c".to_string())
}

fn query_call(sql: &str, offset: u64, limit: u64) -> Call {
    Call::Query {
        sql: sql.to_string(),
        offset,
        limit,
    }
}

const SQL: &str = "SELECT Id, Name FROM account WHERE Status = 'ACTIVE'";

// ============================================================================
// Strategy Selection
// ============================================================================

#[tokio::test]
async fn test_no_limit_or_offset_uses_bulk() {
    let client = MockClient::returning(json!([{"Id": 1}]));

    let outcome = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap();

    assert_eq!(outcome.strategy, FetchStrategy::Bulk);
    assert_eq!(outcome.entity, "ACCOUNT");
    assert_eq!(
        client.calls(),
        vec![Call::Login("Production".to_string()), Call::Bulk(SQL.to_string()), Call::Logout(7)]
    );
}

#[tokio::test]
async fn test_limit_uses_bounded() {
    let client = MockClient::returning(json!([{"Id": 1}]));

    let outcome =
        run_query(&client, &profile(), &QueryRequest::new(SQL).with_limit(50)).await.unwrap();

    assert_eq!(
        outcome.strategy,
        FetchStrategy::Bounded {
            limit: 50,
            offset: 0
        }
    );
    assert_eq!(client.calls()[1], query_call(SQL, 0, 50));
}

#[tokio::test]
async fn test_offset_alone_uses_bounded() {
    let client = MockClient::returning(json!([{"Id": 1}]));
    let session = open_session(&client, &profile()).await.unwrap();

    execute(&client, &session, SQL, 0, 100).await.unwrap();
    close_session(&client, session).await;

    assert_eq!(client.calls()[1], query_call(SQL, 100, 0));
    assert_eq!(client.logouts(), 1);
}

// ============================================================================
// Normalization
// ============================================================================

#[tokio::test]
async fn test_records_are_normalized() {
    let client = MockClient::returning(json!([{"a": 1}, {"b": 2}]));

    let outcome = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap();

    assert_eq!(outcome.records.columns(), ["a", "b"]);
    assert_eq!(
        serde_json::to_value(outcome.records.rows()).unwrap(),
        json!([{"a": 1, "b": null}, {"a": null, "b": 2}])
    );
}

// ============================================================================
// Error Translation and Session Lifecycle
// ============================================================================

#[tokio::test]
async fn test_no_data_found_is_warning_and_logs_out() {
    let client = MockClient::failing_query(ClientError::Request("No data found for query.".into()));

    let err = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap_err();

    assert!(err.is_warning());
    assert_eq!(err.error_code(), "EMPTY_RESULT");
    assert_eq!(client.logouts(), 1);
}

#[tokio::test]
async fn test_zero_rows_is_warning() {
    let client = MockClient::returning(json!([]));

    let err = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap_err();

    assert!(matches!(err, LitehouseError::EmptyResult(_)));
    assert_eq!(client.logouts(), 1);
}

#[tokio::test]
async fn test_query_failure_keeps_message_and_logs_out() {
    let client =
        MockClient::failing_query(ClientError::Request("Unknown column 'Nme' on ACCOUNT".into()));

    let err = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap_err();

    assert_eq!(err.error_code(), "QUERY_FAILED");
    assert!(err.message().contains("Unknown column 'Nme' on ACCOUNT"));
    assert_eq!(client.logouts(), 1);
}

#[tokio::test]
async fn test_login_timeout_is_distinct() {
    let client = MockClient::failing_login(ClientError::ConnectTimeout("10s elapsed".into()));

    let err = run_query(&client, &profile(), &QueryRequest::new(SQL)).await.unwrap_err();

    assert_eq!(err.error_code(), "CONNECTION_TIMEOUT");
    assert!(err.hint().unwrap().contains("temporarily down"));
    // no session was acquired, so nothing to log out
    assert_eq!(client.calls(), vec![Call::Login("Production".to_string())]);
}

#[tokio::test]
async fn test_login_rejection_is_authentication_failure() {
    let client = MockClient::failing_login(ClientError::Authentication("invalid grant".into()));

    let err = test_connection(&client, &profile()).await.unwrap_err();

    assert!(matches!(err, LitehouseError::AuthenticationFailed(_)));
    assert_eq!(err.hint(), Some("Please verify connection settings."));
}

#[tokio::test]
async fn test_empty_query_text_is_rejected_without_login() {
    let client = MockClient::returning(json!([{"Id": 1}]));

    let err = run_query(&client, &profile(), &QueryRequest::new("   ")).await.unwrap_err();

    assert_eq!(err.error_code(), "INVALID_INPUT");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_connection_check_logs_out() {
    let client = MockClient::returning(json!([]));

    test_connection(&client, &profile()).await.unwrap();

    assert_eq!(client.calls(), vec![Call::Login("Production".to_string()), Call::Logout(7)]);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_catalog_queries_use_bounded_defaults() {
    let client = MockClient::returning(json!([{"Id": 3, "EntityName": "ACCOUNT"}]));

    list_entities(&client, &profile()).await.unwrap();
    list_entity_fields(&client, &profile(), 3).await.unwrap();

    let calls = client.calls();
    assert_eq!(calls[1], query_call(ENTITY_LIST_SQL, 0, 0));
    assert!(matches!(
        &calls[4],
        Call::Query { sql, offset: 0, limit: 0 } if sql.contains("EntityId = 3")
    ));
    assert_eq!(client.logouts(), 2);
}
