//! Cluster data model - lazy materialization over the query gateways
//!
//! This module provides:
//! - [`Cluster`], the aggregate coreference unit
//! - [`ClusterMember`], one mention inside a cluster
//! - [`SuperEdge`], a weighted deduplicated relation edge between clusters
//! - [`Resolution`], the tri-state memo value for external lookups
//! - [`Uri`], the canonical string key all identities hang off
//!
//! Every attribute resolves lazily: the first access runs one targeted
//! query through the gateway and memoizes the outcome on the owning object.
//! A failed query leaves the memo empty so a later access can retry.

mod cluster;
mod edge;
mod member;
mod resolution;

pub use cluster::Cluster;
pub use edge::{MAX_EDGE_WEIGHT, MIN_EDGE_CONFIDENCE, SuperEdge, confidence_weight};
pub use member::{ClusterMember, SourceInfo};
pub use resolution::Resolution;

use serde::{Deserialize, Serialize};

/// Canonical URI key for clusters, members and edges
///
/// Equality, hashing and ordering all follow the canonical string form, so
/// two handles for the same store node compare equal no matter where they
/// were materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// Canonicalize a raw identifier (surrounding whitespace is dropped)
    pub fn new(value: impl AsRef<str>) -> Self {
        Uri(value.as_ref().trim().to_string())
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable local name of the identifier
    pub fn local_name(&self) -> &str {
        crate::vocab::local_name(&self.0)
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Uri::new(value)
    }
}

impl From<String> for Uri {
    fn from(value: String) -> Self {
        Uri::new(value)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_canonicalizes_whitespace() {
        let a = Uri::new(" http://x/c1 ");
        let b = Uri::new("http://x/c1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "http://x/c1");
    }

    #[test]
    fn test_uri_local_name() {
        assert_eq!(Uri::new("http://x/ont#Person").local_name(), "Person");
    }

    #[test]
    fn test_uri_usable_as_map_key() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Uri::new("http://x/c1"));
        assert!(set.contains(&Uri::new(" http://x/c1")));
    }
}
