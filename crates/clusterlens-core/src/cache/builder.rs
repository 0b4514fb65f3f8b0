//! Offline construction of the cache overlay.
//!
//! Four store-wide sweeps, one query each: member counts for every
//! cluster, labels and categories for named entity prototypes, and
//! category-derived labels for event and relation prototypes. Relation
//! clusters keep the interchange `Relation` class as their cached type
//! so listings can key on it. Results merge into one record per cluster
//! and land on disk atomically (write to a sibling temp file, rename).

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::gateway::{Bindings, QueryGateway, Term};
use crate::model::Uri;
use crate::vocab;

use super::CacheRecord;

/// Run all sweeps against the store and write the overlay to `out_path`.
/// Returns the number of clusters cached.
pub async fn build_cache(store: &dyn QueryGateway, out_path: &Path) -> Result<usize> {
    let none = Bindings::new();
    let mut entries: HashMap<Uri, CacheRecord> = HashMap::new();

    let query = r#"
SELECT ?cluster (COUNT(?member) AS ?size)
WHERE {
    ?membership aida:cluster ?cluster ;
                aida:clusterMember ?member .
}
GROUP BY ?cluster"#;
    let rows = store.select(query, &none).await?;
    let mut swept = 0usize;
    for row in &rows {
        let Some(cluster) = row.get("cluster").map(Term::as_str) else {
            continue;
        };
        let Some(size) = row.get("size").and_then(Term::as_i64) else {
            warn!(cluster, "Skipping size row with non-numeric count");
            continue;
        };
        entries.entry(Uri::from(cluster)).or_default().size = Some(size.max(0) as u64);
        swept += 1;
    }
    info!(clusters = swept, "Swept cluster sizes");

    let query = r#"
SELECT ?cluster (MIN(?label) AS ?mlabel) ?category
WHERE {
    ?cluster aida:prototype ?prototype .
    ?prototype aida:hasName ?label .
    ?statement a rdf:Statement ;
               rdf:subject ?prototype ;
               rdf:predicate rdf:type ;
               rdf:object ?category .
}
GROUP BY ?cluster ?category"#;
    let rows = store.select(query, &none).await?;
    let mut swept = 0usize;
    for row in &rows {
        let (Some(cluster), Some(label), Some(category)) = (
            row.get("cluster").map(Term::as_str),
            row.text("mlabel"),
            row.get("category").map(Term::as_str),
        ) else {
            continue;
        };
        let record = entries.entry(Uri::from(cluster)).or_default();
        record.label = Some(label.to_string());
        record.category = Some(category.to_string());
        swept += 1;
    }
    info!(clusters = swept, "Swept entity labels");

    let query = r#"
SELECT ?cluster ?category
WHERE {
    ?cluster aida:prototype ?prototype .
    ?prototype a aida:Event .
    ?statement a rdf:Statement ;
               rdf:subject ?prototype ;
               rdf:predicate rdf:type ;
               rdf:object ?category .
}"#;
    let rows = store.select(query, &none).await?;
    let mut swept = 0usize;
    for row in &rows {
        let (Some(cluster), Some(category)) = (
            row.get("cluster").map(Term::as_str),
            row.get("category").map(Term::as_str),
        ) else {
            continue;
        };
        let record = entries.entry(Uri::from(cluster)).or_default();
        record.label = Some(vocab::local_name(category).to_string());
        record.category = Some(category.to_string());
        swept += 1;
    }
    info!(clusters = swept, "Swept event categories");

    let query = r#"
SELECT ?cluster ?category
WHERE {
    ?cluster aida:prototype ?prototype .
    ?prototype a aida:Relation .
    ?statement a rdf:Statement ;
               rdf:subject ?prototype ;
               rdf:predicate rdf:type ;
               rdf:object ?category .
}"#;
    let rows = store.select(query, &none).await?;
    let mut swept = 0usize;
    for row in &rows {
        let (Some(cluster), Some(category)) = (
            row.get("cluster").map(Term::as_str),
            row.get("category").map(Term::as_str),
        ) else {
            continue;
        };
        let record = entries.entry(Uri::from(cluster)).or_default();
        record.label = Some(vocab::local_name(category).to_string());
        // Listings key relation clusters on the interchange class, not
        // the ontology category.
        record.category = Some(vocab::class::RELATION.to_string());
        swept += 1;
    }
    info!(clusters = swept, "Swept relation categories");

    write_overlay(out_path, &entries)?;
    info!(path = %out_path.display(), clusters = entries.len(), "Cache overlay written");
    Ok(entries.len())
}

fn write_overlay(path: &Path, entries: &HashMap<Uri, CacheRecord>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ========== Tests ==========
