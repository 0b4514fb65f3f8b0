//! Aggregated relation edges between clusters.
//!
//! The store records relations at mention level with a confidence value
//! per assertion. The model folds each assertion into a `SuperEdge`, an
//! aggregated edge between two clusters carrying an integer weight
//! derived from the confidence. Edge identity deliberately excludes the
//! weight so that duplicate assertions collapse in a set.

use std::hash::{Hash, Hasher};

use tracing::warn;

use super::Uri;
use super::cluster::Cluster;

/// Ceiling for derived edge weights.
pub const MAX_EDGE_WEIGHT: u32 = 1000;

/// Assertions at or below this confidence are filtered out at query time.
pub const MIN_EDGE_CONFIDENCE: f64 = 0.2;

/// Derive an integer edge weight from an assertion confidence.
///
/// The weight grows with confidence as `round(1 / (2 * (1 - c)))`, so
/// `c = 0.75` maps to 2 and `c = 0.9` to 5. Confidences at or above 1.0
/// would blow up the formula; they are clamped to [`MAX_EDGE_WEIGHT`]
/// and logged, since they indicate degenerate data upstream.
pub fn confidence_weight(confidence: f64) -> u32 {
    if !confidence.is_finite() || confidence >= 1.0 {
        warn!(confidence, "Degenerate assertion confidence, clamping edge weight");
        return MAX_EDGE_WEIGHT;
    }
    let weight = (1.0 / (2.0 * (1.0 - confidence))).round();
    weight.min(MAX_EDGE_WEIGHT as f64) as u32
}

/// A weighted, aggregated edge between two clusters.
///
/// Equality and hashing cover the subject, predicate and object only.
/// Two edges over the same triple compare equal even when their weights
/// differ, and inserting both into a set keeps the first.
#[derive(Clone)]
pub struct SuperEdge {
    subject: Cluster,
    predicate: Uri,
    object: Cluster,
    count: u32,
}

impl SuperEdge {
    pub(crate) fn new(subject: Cluster, predicate: Uri, object: Cluster, count: u32) -> Self {
        Self {
            subject,
            predicate,
            object,
            count,
        }
    }

    pub fn subject(&self) -> &Cluster {
        &self.subject
    }

    pub fn predicate(&self) -> &Uri {
        &self.predicate
    }

    pub fn object(&self) -> &Cluster {
        &self.object
    }

    /// Aggregated weight of the edge.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl PartialEq for SuperEdge {
    fn eq(&self, other: &Self) -> bool {
        self.subject.uri() == other.subject.uri()
            && self.predicate == other.predicate
            && self.object.uri() == other.object.uri()
    }
}

impl Eq for SuperEdge {}

impl Hash for SuperEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.uri().hash(state);
        self.predicate.hash(state);
        self.object.uri().hash(state);
    }
}

impl std::fmt::Debug for SuperEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperEdge")
            .field("subject", self.subject.uri())
            .field("predicate", &self.predicate)
            .field("object", self.object.uri())
            .field("count", &self.count)
            .finish()
    }
}

// ========== Tests ==========
