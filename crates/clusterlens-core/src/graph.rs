//! Graph wiring and entry points.
//!
//! A `ClusterGraph` ties together the two query gateways (primary store
//! and knowledge base), the shared entity resolver, the persisted cache
//! overlay and the display-path table. Handles produced by the graph all
//! carry the same `GraphContext`, so memoization is shared wherever a
//! cluster or member shows up.
//!
//! Only `get` probes existence. Clusters materialized internally as edge
//! endpoints skip the probe; they are trusted because the store asserted
//! them as endpoints of a relation.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cache::{self, CacheOverlay};
use crate::config::PathPrefix;
use crate::error::{Error, Result};
use crate::gateway::{Bindings, QueryGateway, Term};
use crate::listing::{self, ClusterKind, ClusterSummary, SortMode};
use crate::model::{Cluster, ClusterMember, Resolution, Uri};
use crate::resolver::{EntityResolver, KbNode};
use crate::vocab;

/// Existence probe for cluster URIs.
pub(crate) const SAME_AS_CLUSTER_ASK: &str = "ASK { ?cluster a aida:SameAsCluster }";

/// Shared wiring carried by every cluster and member handle.
pub(crate) struct GraphContext {
    pub(crate) store: Arc<dyn QueryGateway>,
    pub(crate) resolver: EntityResolver,
    pub(crate) overlay: CacheOverlay,
    pub(crate) path_prefixes: Vec<PathPrefix>,
}

impl GraphContext {
    pub(crate) fn new(
        store: Arc<dyn QueryGateway>,
        kb: Arc<dyn QueryGateway>,
        overlay: CacheOverlay,
        path_prefixes: Vec<PathPrefix>,
    ) -> Self {
        Self {
            store,
            resolver: EntityResolver::new(kb),
            overlay,
            path_prefixes,
        }
    }
}

/// Handle to the materialized view of a remote triple store.
///
/// Cheap to clone; clones share gateways, resolver memo and overlay.
#[derive(Clone)]
pub struct ClusterGraph {
    ctx: Arc<GraphContext>,
}

impl ClusterGraph {
    pub fn builder() -> ClusterGraphBuilder {
        ClusterGraphBuilder::default()
    }

    /// A graph with no overlay and no display-path table.
    pub fn new(store: Arc<dyn QueryGateway>, kb: Arc<dyn QueryGateway>) -> Self {
        Self {
            ctx: Arc::new(GraphContext::new(
                store,
                kb,
                CacheOverlay::empty(),
                Vec::new(),
            )),
        }
    }

    /// Whether the store knows `uri` as a coreference cluster.
    pub async fn exists(&self, uri: &str) -> Result<bool> {
        self.ctx
            .store
            .ask(SAME_AS_CLUSTER_ASK, &Bindings::new().iri("cluster", uri))
            .await
    }

    /// Fetch a cluster handle, gated on existence. `None` means the URI
    /// is not a cluster; nothing else has been fetched yet.
    pub async fn get(&self, uri: &str) -> Result<Option<Cluster>> {
        if self.exists(uri).await? {
            Ok(Some(Cluster::new(Uri::from(uri), self.ctx.clone())))
        } else {
            Ok(None)
        }
    }

    /// A bare member handle. No existence probe: members resolve their
    /// own absence terminally on first attribute access.
    pub fn member(&self, uri: &str) -> ClusterMember {
        ClusterMember::new(Uri::from(uri), self.ctx.clone())
    }

    /// List clusters of one kind, mapped to display rows.
    pub async fn list(
        &self,
        kind: ClusterKind,
        sort: SortMode,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<ClusterSummary>> {
        let query = listing::build_list_query(kind, sort, limit, offset);
        let rows = self.ctx.store.select(&query, &Bindings::new()).await?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let uri = Uri::from(row.require("cluster")?.as_str());
            let label_term = row.require("label")?;
            let label = match label_term.as_iri() {
                Some(iri) => vocab::local_name(iri).to_string(),
                None => label_term.as_str().to_string(),
            };
            let count = row
                .get("memberN")
                .and_then(Term::as_i64)
                .unwrap_or(0)
                .max(0) as usize;
            let path = listing::display_path(uri.as_str(), &self.ctx.path_prefixes);
            summaries.push(ClusterSummary {
                uri,
                path,
                label,
                count,
            });
        }
        info!(kind = %kind, rows = summaries.len(), "Listed clusters");
        Ok(summaries)
    }

    /// Resolve a raw link target against the knowledge base, through the
    /// graph-wide memo.
    pub async fn resolve_target(&self, target: &str) -> Result<Resolution<KbNode>> {
        self.ctx.resolver.resolve(target).await
    }

    /// Sweep the store and write the cache overlay to `out_path`.
    /// Returns the number of clusters cached.
    pub async fn build_cache(&self, out_path: &Path) -> Result<usize> {
        cache::build_cache(self.ctx.store.as_ref(), out_path).await
    }

    /// The overlay this graph consults.
    pub fn overlay(&self) -> &CacheOverlay {
        &self.ctx.overlay
    }
}

impl std::fmt::Debug for ClusterGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterGraph")
            .field("overlay_entries", &self.ctx.overlay.len())
            .finish()
    }
}

/// Builder for [`ClusterGraph`]. Both gateways are required; overlay and
/// path table default to empty.
#[derive(Default)]
pub struct ClusterGraphBuilder {
    store: Option<Arc<dyn QueryGateway>>,
    kb: Option<Arc<dyn QueryGateway>>,
    overlay: CacheOverlay,
    path_prefixes: Vec<PathPrefix>,
}

impl ClusterGraphBuilder {
    pub fn store(mut self, store: Arc<dyn QueryGateway>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn kb(mut self, kb: Arc<dyn QueryGateway>) -> Self {
        self.kb = Some(kb);
        self
    }

    pub fn overlay(mut self, overlay: CacheOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn path_prefixes(mut self, prefixes: Vec<PathPrefix>) -> Self {
        self.path_prefixes = prefixes;
        self
    }

    pub fn build(self) -> Result<ClusterGraph> {
        let store = self
            .store
            .ok_or_else(|| Error::ConfigError("no store gateway configured".into()))?;
        let kb = self
            .kb
            .ok_or_else(|| Error::ConfigError("no knowledge base gateway configured".into()))?;
        Ok(ClusterGraph {
            ctx: Arc::new(GraphContext::new(
                store,
                kb,
                self.overlay,
                self.path_prefixes,
            )),
        })
    }
}

// ========== Test support ==========

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::gateway::StubGateway;

    pub(crate) fn stub_context(store: Arc<StubGateway>) -> Arc<GraphContext> {
        stub_context_full(store, Arc::new(StubGateway::new()), CacheOverlay::empty())
    }

    pub(crate) fn stub_context_kb(
        store: Arc<StubGateway>,
        kb: Arc<StubGateway>,
    ) -> Arc<GraphContext> {
        stub_context_full(store, kb, CacheOverlay::empty())
    }

    pub(crate) fn stub_context_overlay(
        store: Arc<StubGateway>,
        overlay: CacheOverlay,
    ) -> Arc<GraphContext> {
        stub_context_full(store, Arc::new(StubGateway::new()), overlay)
    }

    fn stub_context_full(
        store: Arc<StubGateway>,
        kb: Arc<StubGateway>,
        overlay: CacheOverlay,
    ) -> Arc<GraphContext> {
        Arc::new(GraphContext::new(store, kb, overlay, Vec::new()))
    }
}

// ========== Tests ==========
