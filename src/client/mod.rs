//! Billing API Client Abstraction
//!
//! The REST client itself (authentication modes, paging, certificates) lives
//! outside this crate. This module defines the capability Litehouse consumes.
//!
//! # Session Lifecycle
//! A session is acquired fresh for every unit of work and released with
//! [`BillingClient::logout`] before the unit ends, on success and on failure.
//! Sessions are never pooled or reused.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ConnectionProfile;

/// One flat record as returned by the billing API
pub type RawRecord = Map<String, Value>;

/// Failures reported by a [`BillingClient`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The login request timed out
    #[error("connect timeout: {0}")]
    ConnectTimeout(String),

    /// Login was rejected or could not be completed
    #[error("{0}")]
    Authentication(String),

    /// A query request failed; the message is the API's own text
    #[error("{0}")]
    Request(String),
}

/// Billing API capability
///
/// Implementations own the wire protocol. Litehouse only decides which call to
/// make and how to shape the result.
pub trait BillingClient {
    /// Authenticated session handle
    type Session: Send + Sync;

    /// Authenticate against the org described by `profile`
    fn get_session(
        &self,
        profile: &ConnectionProfile,
    ) -> impl std::future::Future<Output = Result<Self::Session, ClientError>> + Send;

    /// Paginated query
    ///
    /// The client caps the number of rows per call. `offset` and `limit` of 0
    /// leave paging to the client's defaults.
    fn query(
        &self,
        session: &Self::Session,
        sql: &str,
        offset: u64,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<RawRecord>, ClientError>> + Send;

    /// Uncapped bulk query
    fn bulk_query(
        &self,
        session: &Self::Session,
        sql: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RawRecord>, ClientError>> + Send;

    /// Release the session
    fn logout(&self, session: Self::Session) -> impl std::future::Future<Output = ()> + Send;
}
