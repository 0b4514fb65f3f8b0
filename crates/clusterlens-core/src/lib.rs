//! Clusterlens Core Library
//!
//! This crate provides the core functionality for Clusterlens, including:
//! - Query gateways for the primary store and the knowledge base
//! - Lazy cluster/member model with per-attribute memoization
//! - Weighted, deduplicated relation edges and bounded-hop neighborhoods
//! - Knowledge-base entity resolution with a process-wide memo
//! - Persisted cache overlay and its offline builder
//! - Cluster listings and display-path mapping

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod listing;
pub mod model;
pub mod resolver;
pub mod vocab;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::CacheOverlay;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{Bindings, QueryGateway, SparqlClient};
    pub use crate::graph::ClusterGraph;
    pub use crate::listing::{ClusterKind, ClusterSummary, SortMode};
    pub use crate::model::{Cluster, ClusterMember, Resolution, SuperEdge, Uri};
    pub use crate::resolver::KbNode;
}
