//! Litehouse - Billing Platform Admin Core
//!
//! Litehouse manages connection profiles for a billing platform's REST API,
//! runs ad-hoc SQL-like queries through an external client, and exports the
//! results as CSV, spreadsheet, or JSON artifacts.
//!
//! # Architecture
//! Every operation is one request-scoped unit of work. The library owns all
//! behavior; the CLI binary is a thin wrapper that turns results into JSON
//! envelopes.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`config`] - Persistent configuration and the [`ConfigStore`]
//! - [`entity`] - Root entity label extraction from query text
//! - [`client`] - Billing API capability consumed by the query layer
//! - [`query`] - Fetch strategy routing and record normalization
//! - [`export`] - CSV, spreadsheet, and JSON export

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod output;
pub mod query;

pub use client::{BillingClient, ClientError, RawRecord};
pub use config::{
    derive_id, AppConfig, AppPaths, AuthMode, ConfigStore, ConnectionInput, ConnectionProfile,
    QueryInput, SavedQuery,
};
pub use entity::{resolve_entity, COMPLEX_QUERY};
pub use error::{LitehouseError, Result};
pub use export::{export, write_export, ExportFormat};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, Severity, SuccessEnvelope};
pub use query::{run_query, FetchStrategy, QueryOutcome, QueryRequest, RecordSet};
