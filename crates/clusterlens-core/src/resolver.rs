//! Resolution of external link targets against the knowledge base.
//!
//! Link targets name entities in an external reference KB by a legacy
//! identifier scheme (`LDC2015E42:703448`). The resolver rewrites the
//! identifier into the lookup key the knowledge base indexes, fetches
//! the matching node with its English label and aliases, and memoizes
//! the outcome per raw target string. Hits and confirmed misses are both
//! remembered; gateway failures are not, so the next access retries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::gateway::{Bindings, QueryGateway};
use crate::model::Resolution;
use crate::vocab;

/// Substring marking a target as explicitly unlinkable.
pub const NIL_MARKER: &str = ":NIL";

/// A resolved knowledge-base node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KbNode {
    /// Short identifier, the local name of the node URI (e.g. `Q7747`).
    pub id: String,
    /// Full node URI.
    pub uri: String,
    /// English label.
    pub label: String,
    /// English alternate labels.
    pub aliases: Vec<String>,
}

/// Rewrite a raw link target into the key the knowledge base indexes.
///
/// Everything up to and including the first `:` is catalog noise and is
/// dropped; dots separate path segments in the legacy scheme, so they
/// become slashes; the key is rooted with a leading slash.
/// `LDC2015E42:12345.67` becomes `/12345/67`.
pub fn lookup_key(target: &str) -> String {
    let tail = target
        .find(':')
        .map(|i| &target[i + 1..])
        .unwrap_or(target);
    format!("/{}", tail.replace('.', "/"))
}

/// Memoizing resolver for link targets.
///
/// One resolver is shared across every cluster and member of a graph,
/// so a target appearing in many clusters is looked up once.
pub struct EntityResolver {
    kb: Arc<dyn QueryGateway>,
    memo: RwLock<HashMap<String, Resolution<KbNode>>>,
}

impl EntityResolver {
    pub fn new(kb: Arc<dyn QueryGateway>) -> Self {
        Self {
            kb,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a raw link target. NIL and empty targets are absent
    /// without touching the wire.
    pub async fn resolve(&self, target: &str) -> Result<Resolution<KbNode>> {
        if let Ok(memo) = self.memo.read() {
            if let Some(hit) = memo.get(target) {
                return Ok(hit.clone());
            }
        }
        let resolved = self.lookup(target).await?;
        if let Ok(mut memo) = self.memo.write() {
            memo.insert(target.to_string(), resolved.clone());
        }
        Ok(resolved)
    }

    async fn lookup(&self, target: &str) -> Result<Resolution<KbNode>> {
        if target.is_empty() || target.contains(NIL_MARKER) {
            return Ok(Resolution::Absent);
        }
        let key = lookup_key(target);
        let bindings = Bindings::new().literal("freebase", key.as_str());

        let query = r#"
SELECT ?qid ?label
WHERE {
    ?qid wdt:P646 ?freebase .
    ?qid rdfs:label ?label .
    FILTER(lang(?label) = "en")
}
LIMIT 1"#;
        let rows = self.kb.select(query, &bindings).await?;
        let Some(row) = rows.first() else {
            debug!(target, "No knowledge base match");
            return Ok(Resolution::Absent);
        };
        let uri = row.require("qid")?.as_str().to_string();
        let label = row.require("label")?.as_str().to_string();
        let id = vocab::local_name(&uri).to_string();

        let alias_query = r#"
SELECT ?alias
WHERE {
    ?qid wdt:P646 ?freebase .
    ?qid skos:altLabel ?alias .
    FILTER(lang(?alias) = "en")
}"#;
        let alias_rows = self.kb.select(alias_query, &bindings).await?;
        let aliases = alias_rows
            .iter()
            .filter_map(|r| r.text("alias"))
            .map(str::to_string)
            .collect();

        debug!(target, id = %id, "Resolved knowledge base node");
        Ok(Resolution::Present(KbNode {
            id,
            uri,
            label,
            aliases,
        }))
    }
}

impl std::fmt::Debug for EntityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.memo.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("EntityResolver")
            .field("cached", &cached)
            .finish()
    }
}

// ========== Tests ==========
