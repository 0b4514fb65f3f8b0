//! Query gateways - parameterized queries against remote endpoints
//!
//! This module provides:
//! - The [`QueryGateway`] trait both stores are accessed through
//! - Typed terms and rows for the SPARQL JSON results format
//! - Token-aware binding substitution
//! - [`SparqlClient`], the HTTP implementation with timeout and retry
//! - [`StubGateway`], a scripted in-memory implementation for tests

mod client;
mod stub;
mod types;

pub use client::{SparqlClient, SparqlClientBuilder};
pub use stub::StubGateway;
pub use types::{Bindings, Row, Term};

use async_trait::async_trait;

use crate::error::Result;

/// Remote query executor
///
/// Implementations substitute `bindings` into the query text before
/// execution and preserve the query's declared row ordering. Instances are
/// shared across concurrent traversals, so implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Run a SELECT query, returning one row per solution
    async fn select(&self, query: &str, bindings: &Bindings) -> Result<Vec<Row>>;

    /// Run an ASK query, returning its boolean verdict
    async fn ask(&self, query: &str, bindings: &Bindings) -> Result<bool>;
}
