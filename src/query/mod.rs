//! Query Execution
//!
//! Routes ad-hoc queries to the right billing API call and shapes the result.
//!
//! # Fetch Strategies
//! - **Bounded**: used when a limit or offset is given. Delegates to the paged
//!   `query` call, which the client caps at a fixed row count per call.
//! - **Bulk**: used otherwise. Delegates to `bulk_query`, which is uncapped.
//!
//! # Error Policy
//! - A "No data found" message from the API, or zero returned rows, becomes
//!   [`LitehouseError::EmptyResult`] (a warning)
//! - Login timeouts become [`LitehouseError::ConnectionTimeout`]
//! - Other login failures become [`LitehouseError::AuthenticationFailed`]
//! - Every other query failure becomes [`LitehouseError::QueryFailed`] with the
//!   API's message attached
//!
//! Each unit of work opens its own session and always logs out before
//! returning, including on the error paths.

mod normalize;

pub use normalize::RecordSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{BillingClient, ClientError};
use crate::config::{ConnectionProfile, SavedQuery};
use crate::entity::resolve_entity;
use crate::error::{LitehouseError, Result};

/// Marker the billing API uses when a query matches nothing
pub const NO_DATA_FOUND: &str = "No data found";

/// Lists every entity in the org
pub const ENTITY_LIST_SQL: &str =
    "SELECT Id, EntityLabel, EntityName, SystemFlag FROM ENTITY ORDER BY EntityLabel";

/// Field metadata for one entity, excluding layout-only field types
#[must_use]
pub fn entity_fields_sql(entity_id: u64) -> String {
    format!(
        "SELECT Id, FieldLabel, FieldName, DataType, DataLength, DefaultValue, ExternalKeyFlag, \
         SystemFlag, UniqueField, RequiredFlag, ReferencedEntityIdObj.EntityName, \
         (SELECT ListValue FROM ENTITY_FIELD_PICK_LIST.EntityFieldIdObj) \
         FROM ENTITY_FIELD WHERE EntityId = {entity_id} \
         AND DataType NOT IN ('DIVIDER', 'EMBEDDED_LIST', 'EMBEDDED_LIST_ADD', \
         'EXTENSION_WIDGET', 'LABEL', 'LISTFORM', 'QUICK_LINK', 'RELATED_LIST') \
         AND Status = 'ACTIVE' ORDER BY FieldLabel"
    )
}

/// How a query is fetched from the billing API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Paged call, capped by the client
    Bounded { limit: u64, offset: u64 },
    /// Uncapped bulk call
    Bulk,
}

impl FetchStrategy {
    /// Bounded when either a limit or an offset is set, bulk otherwise
    #[must_use]
    pub const fn select(limit: u64, offset: u64) -> Self {
        if limit > 0 || offset > 0 {
            Self::Bounded { limit, offset }
        } else {
            Self::Bulk
        }
    }
}

/// An ad-hoc query as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            limit: 0,
            offset: 0,
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

impl From<&SavedQuery> for QueryRequest {
    fn from(saved: &SavedQuery) -> Self {
        Self {
            sql: saved.text.clone(),
            limit: saved.limit,
            offset: saved.offset,
        }
    }
}

/// Result of one query unit of work
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Root entity label of the query text
    pub entity: String,
    pub strategy: FetchStrategy,
    pub records: RecordSet,
}

/// Acquire a session for `profile`
pub async fn open_session<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
) -> Result<C::Session> {
    debug!(connection = %profile.name, "opening session");

    client.get_session(profile).await.map_err(|e| match e {
        ClientError::ConnectTimeout(detail) => LitehouseError::connection_timeout(format!(
            "The connection ({}) timed out: {detail}",
            profile.name
        )),
        other => LitehouseError::authentication_failed(format!(
            "Unable to authenticate with connection ({}): {other}",
            profile.name
        )),
    })
}

/// Release a session; never fails the unit of work
pub async fn close_session<C: BillingClient>(client: &C, session: C::Session) {
    client.logout(session).await;
    debug!("session closed");
}

/// Run `sql` on an open session, choosing the fetch strategy from `limit`/`offset`
pub async fn execute<C: BillingClient>(
    client: &C,
    session: &C::Session,
    sql: &str,
    limit: u64,
    offset: u64,
) -> Result<RecordSet> {
    fetch(client, session, FetchStrategy::select(limit, offset), sql).await
}

async fn fetch<C: BillingClient>(
    client: &C,
    session: &C::Session,
    strategy: FetchStrategy,
    sql: &str,
) -> Result<RecordSet> {
    debug!(?strategy, "executing query");

    let raw = match strategy {
        FetchStrategy::Bounded { limit, offset } => client.query(session, sql, offset, limit).await,
        FetchStrategy::Bulk => client.bulk_query(session, sql).await,
    }
    .map_err(map_query_error)?;

    if raw.is_empty() {
        warn!("query returned no rows");
        return Err(LitehouseError::empty_result(format!("{NO_DATA_FOUND} for query.")));
    }

    let records = RecordSet::normalize(raw);
    debug!(rows = records.len(), columns = records.columns().len(), "query returned");
    Ok(records)
}

fn map_query_error(err: ClientError) -> LitehouseError {
    match err {
        ClientError::Request(message) if message.contains(NO_DATA_FOUND) => {
            warn!("query returned no data");
            LitehouseError::empty_result(message)
        }
        ClientError::ConnectTimeout(detail) => LitehouseError::connection_timeout(detail),
        other => LitehouseError::query_failed(other.to_string()),
    }
}

/// Execute one query against `profile` as a complete unit of work
///
/// Opens a session, executes, logs out (on every path) and labels the result
/// with the query's root entity.
pub async fn run_query<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
    request: &QueryRequest,
) -> Result<QueryOutcome> {
    if request.sql.trim().is_empty() {
        return Err(LitehouseError::invalid_input("Query text cannot be empty"));
    }

    let entity = resolve_entity(&request.sql);
    let strategy = FetchStrategy::select(request.limit, request.offset);

    let session = open_session(client, profile).await?;
    let result = fetch(client, &session, strategy, &request.sql).await;
    close_session(client, session).await;

    Ok(QueryOutcome {
        entity,
        strategy,
        records: result?,
    })
}

/// Check that a session can be opened for `profile`
pub async fn test_connection<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
) -> Result<()> {
    let session = open_session(client, profile).await?;
    close_session(client, session).await;
    Ok(())
}

/// List the entities of the org behind `profile`
pub async fn list_entities<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
) -> Result<RecordSet> {
    catalog_query(client, profile, ENTITY_LIST_SQL).await
}

/// List the active fields of one entity
pub async fn list_entity_fields<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
    entity_id: u64,
) -> Result<RecordSet> {
    catalog_query(client, profile, &entity_fields_sql(entity_id)).await
}

async fn catalog_query<C: BillingClient>(
    client: &C,
    profile: &ConnectionProfile,
    sql: &str,
) -> Result<RecordSet> {
    let session = open_session(client, profile).await?;
    let strategy = FetchStrategy::Bounded {
        limit: 0,
        offset: 0,
    };
    let result = fetch(client, &session, strategy, sql).await;
    close_session(client, session).await;
    result
}
