//! Cluster listings: kinds, sort modes, query assembly and display paths.
//!
//! A listing is one aggregate query over every cluster of a kind. Entity
//! clusters are listed by their prototype's name; event and relation
//! clusters carry no names, so their reified ontology category stands in
//! as the label and doubles as the type-sort key.

use serde::{Deserialize, Serialize};

use crate::config::PathPrefix;
use crate::model::Uri;

/// The three kinds of clusters a store distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Entity,
    Event,
    Relation,
}

impl ClusterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterKind::Entity => "entity",
            ClusterKind::Event => "event",
            ClusterKind::Relation => "relation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entity" | "entities" => Some(ClusterKind::Entity),
            "event" | "events" => Some(ClusterKind::Event),
            "relation" | "relations" => Some(ClusterKind::Relation),
            _ => None,
        }
    }

    pub fn all() -> [ClusterKind; 3] {
        [ClusterKind::Entity, ClusterKind::Event, ClusterKind::Relation]
    }
}

impl std::fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Largest clusters first.
    #[default]
    Size,
    /// Group by ontology category, then largest first within a group.
    Type,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Size => "size",
            SortMode::Type => "type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "size" => Some(SortMode::Size),
            "type" => Some(SortMode::Type),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub uri: Uri,
    pub path: String,
    pub label: String,
    pub count: usize,
}

/// Assemble the aggregate listing query for one kind.
///
/// Entity listings always come largest-first; the type sort only
/// distinguishes kinds whose label is the category.
pub fn build_list_query(
    kind: ClusterKind,
    sort: SortMode,
    limit: Option<usize>,
    offset: Option<usize>,
) -> String {
    let class = match kind {
        ClusterKind::Entity => "aida:Entity",
        ClusterKind::Event => "aida:Event",
        ClusterKind::Relation => "aida:Relation",
    };
    let label_pattern = match kind {
        ClusterKind::Entity => "?prototype aida:hasName ?label .",
        _ => {
            "?statement a rdf:Statement ;\n               rdf:subject ?prototype ;\n               rdf:predicate rdf:type ;\n               rdf:object ?label ."
        }
    };
    let order = match (kind, sort) {
        (ClusterKind::Entity, _) => "DESC(?memberN)",
        (_, SortMode::Type) => "?label DESC(?memberN)",
        (_, SortMode::Size) => "DESC(?memberN) ?label",
    };
    let mut query = format!(
        r#"
SELECT ?cluster ?label (COUNT(?member) AS ?memberN)
WHERE {{
    ?cluster aida:prototype ?prototype .
    ?prototype a {class} .
    {label_pattern}
    ?membership aida:cluster ?cluster ;
                aida:clusterMember ?member .
}}
GROUP BY ?cluster ?label
ORDER BY {order}"#
    );
    if let Some(limit) = limit {
        query.push_str(&format!("\nLIMIT {limit}"));
    }
    if let Some(offset) = offset {
        query.push_str(&format!("\nOFFSET {offset}"));
    }
    query
}

/// Map a cluster URI onto its display path. The first matching prefix
/// wins; URIs outside every prefix pass through unchanged.
pub fn display_path(uri: &str, prefixes: &[PathPrefix]) -> String {
    for prefix in prefixes {
        if let Some(rest) = uri.strip_prefix(prefix.uri_prefix.as_str()) {
            return format!("{}{}", prefix.path, rest);
        }
    }
    uri.to_string()
}

// ========== Tests ==========
