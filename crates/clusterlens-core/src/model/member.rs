//! Cluster members and their lazily materialized attributes.
//!
//! A `ClusterMember` is a cheap handle over one mention-level node in the
//! store. Nothing is fetched at construction: label, type, link target,
//! provenance and the knowledge-base node each live behind their own
//! memoization cell and are filled on first access. Members born from a
//! cluster's membership listing arrive with label/type (and sometimes the
//! link target) pre-seeded, so browsing a cluster does not re-query per
//! member.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::{Bindings, Term};
use crate::graph::{GraphContext, SAME_AS_CLUSTER_ASK};
use crate::resolver::KbNode;
use crate::vocab;

use super::Uri;
use super::cluster::Cluster;
use super::resolution::Resolution;

/// Provenance of a member: the source document and its mention spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    /// Identifier of the document the member is justified in.
    pub document: String,
    /// Inclusive (start, end) character offsets, ascending by start.
    pub spans: Vec<(i64, i64)>,
}

/// Label and direct type of a member, fetched as one unit.
#[derive(Debug, Clone)]
struct MemberIdent {
    label: String,
    member_type: Option<Uri>,
}

struct MemberInner {
    uri: Uri,
    ctx: Arc<GraphContext>,
    ident: OnceCell<MemberIdent>,
    target: OnceCell<Resolution<String>>,
    kb: OnceCell<Resolution<KbNode>>,
    all_labels: OnceCell<String>,
    source: OnceCell<Option<SourceInfo>>,
    cluster: OnceCell<Option<Cluster>>,
}

/// Handle to one member of a coreference cluster.
///
/// Clones share the same memoization cells, like the clusters that
/// produce them. Identity is the member URI.
#[derive(Clone)]
pub struct ClusterMember {
    inner: Arc<MemberInner>,
}

impl ClusterMember {
    /// A bare handle; every attribute will be fetched on first access.
    pub(crate) fn new(uri: Uri, ctx: Arc<GraphContext>) -> Self {
        Self {
            inner: Arc::new(MemberInner {
                uri,
                ctx,
                ident: OnceCell::new(),
                target: OnceCell::new(),
                kb: OnceCell::new(),
                all_labels: OnceCell::new(),
                source: OnceCell::new(),
                cluster: OnceCell::new(),
            }),
        }
    }

    /// A handle pre-seeded with attributes another query already produced.
    ///
    /// A `None` target leaves the cell unresolved: membership rows omit
    /// the target when the member has none *or* when the store simply did
    /// not join it, so absence is only confirmed by a member-level fetch.
    pub(crate) fn with_attrs(
        uri: Uri,
        ctx: Arc<GraphContext>,
        label: String,
        member_type: Option<Uri>,
        target: Option<String>,
    ) -> Self {
        let target_cell = match target {
            Some(t) => OnceCell::new_with(Some(Resolution::Present(t))),
            None => OnceCell::new(),
        };
        Self {
            inner: Arc::new(MemberInner {
                uri,
                ctx,
                ident: OnceCell::new_with(Some(MemberIdent { label, member_type })),
                target: target_cell,
                kb: OnceCell::new(),
                all_labels: OnceCell::new(),
                source: OnceCell::new(),
                cluster: OnceCell::new(),
            }),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Display label. Falls back to the local name of the member's type,
    /// then of the member URI itself, when the store has no name.
    pub async fn label(&self) -> Result<&str> {
        Ok(self.ident().await?.label.as_str())
    }

    /// Direct `rdf:type` of the member, when the store records one.
    pub async fn member_type(&self) -> Result<Option<&Uri>> {
        Ok(self.ident().await?.member_type.as_ref())
    }

    /// External knowledge-base link target, e.g. `LDC2015E42:703448`.
    ///
    /// Resolves lazily; once the store confirms there is no target the
    /// answer is remembered and no further query is issued.
    pub async fn target(&self) -> Result<Option<&str>> {
        let resolution = self
            .inner
            .target
            .get_or_try_init(|| async {
                let (ident, target) = self.fetch_attrs().await?;
                let _ = self.inner.ident.set(ident);
                Ok::<_, Error>(target)
            })
            .await?;
        Ok(resolution.value().map(String::as_str))
    }

    /// The knowledge-base node behind this member's link target, if the
    /// target exists and resolves. NIL targets never reach the wire.
    pub async fn kb_node(&self) -> Result<Option<&KbNode>> {
        let resolution = self
            .inner
            .kb
            .get_or_try_init(|| async {
                match self.target().await? {
                    Some(target) => self.inner.ctx.resolver.resolve(target).await,
                    None => Ok(Resolution::Absent),
                }
            })
            .await?;
        Ok(resolution.value())
    }

    /// Every textual label the member's justifications carry, ranked by
    /// frequency and rendered as `label(xN), label(xN), ...`.
    pub async fn all_labels(&self) -> Result<&str> {
        let joined = self
            .inner
            .all_labels
            .get_or_try_init(|| async {
                let query = r#"
SELECT ?label (COUNT(?label) AS ?labelN)
WHERE {
    ?member aida:justifiedBy/skos:prefLabel ?label .
}
GROUP BY ?label
ORDER BY DESC(?labelN)"#;
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(query, &Bindings::new().iri("member", self.inner.uri.as_str()))
                    .await?;
                let mut parts = Vec::with_capacity(rows.len());
                for row in &rows {
                    let label = row.require("label")?.as_str();
                    let n = row.require("labelN")?.as_i64().ok_or_else(|| {
                        Error::MalformedResponse("non-numeric label count".into())
                    })?;
                    parts.push(format!("{label}(x{n})"));
                }
                Ok::<_, Error>(parts.join(", "))
            })
            .await?;
        Ok(joined.as_str())
    }

    /// Source document and mention spans, or `None` for members without
    /// text justifications. The document comes from the first row of the
    /// offset-ordered result; spans accumulate across all rows.
    pub async fn source(&self) -> Result<Option<&SourceInfo>> {
        let source = self
            .inner
            .source
            .get_or_try_init(|| async {
                let query = r#"
SELECT DISTINCT ?source ?start ?end
WHERE {
    ?member aida:justifiedBy ?justification .
    ?justification aida:source ?source ;
                   aida:startOffset ?start ;
                   aida:endOffsetInclusive ?end .
}
ORDER BY ?start"#;
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(query, &Bindings::new().iri("member", self.inner.uri.as_str()))
                    .await?;
                let Some(first) = rows.first() else {
                    return Ok::<_, Error>(None);
                };
                let document = first.require("source")?.as_str().to_string();
                let mut spans = Vec::with_capacity(rows.len());
                for row in &rows {
                    let start = row.require("start")?.as_i64().ok_or_else(|| {
                        Error::MalformedResponse("non-numeric span offset".into())
                    })?;
                    let end = row.require("end")?.as_i64().ok_or_else(|| {
                        Error::MalformedResponse("non-numeric span offset".into())
                    })?;
                    spans.push((start, end));
                }
                Ok(Some(SourceInfo { document, spans }))
            })
            .await?;
        Ok(source.as_ref())
    }

    /// Role fillers of this member when it denotes an event or relation:
    /// pairs of role name and the member filling it. Not memoized.
    pub async fn roles(&self) -> Result<Vec<(String, ClusterMember)>> {
        let query = r#"
SELECT ?pred ?obj ?objtype (MIN(?objlabel) AS ?mlabel)
WHERE {
    ?statement rdf:subject ?event ;
               rdf:predicate ?pred ;
               rdf:object ?obj .
    ?objstate rdf:subject ?obj ;
              rdf:predicate rdf:type ;
              rdf:object ?objtype .
    OPTIONAL { ?obj aida:hasName ?objlabel }
}
GROUP BY ?pred ?obj ?objtype"#;
        let rows = self
            .inner
            .ctx
            .store
            .select(query, &Bindings::new().iri("event", self.inner.uri.as_str()))
            .await?;
        let mut roles = Vec::with_capacity(rows.len());
        for row in &rows {
            let predicate = row.require("pred")?.as_str().to_string();
            let obj = Uri::from(row.require("obj")?.as_str());
            let obj_type = Uri::from(row.require("objtype")?.as_str());
            let label = match row.text("mlabel").filter(|l| !l.is_empty()) {
                Some(l) => l.to_string(),
                None => obj_type.local_name().to_string(),
            };
            let filler =
                ClusterMember::with_attrs(obj, self.inner.ctx.clone(), label, Some(obj_type), None);
            roles.push((vocab::role_name(&predicate).to_string(), filler));
        }
        Ok(roles)
    }

    /// Events in which this member fills a role: pairs of role name and
    /// the event member. The inverse of [`roles`](Self::roles); not
    /// memoized either.
    pub async fn events_by_role(&self) -> Result<Vec<(String, ClusterMember)>> {
        let query = r#"
SELECT ?pred ?event ?eventtype (MIN(?eventlabel) AS ?mlabel)
WHERE {
    ?event a aida:Event .
    ?statement rdf:subject ?event ;
               rdf:predicate ?pred ;
               rdf:object ?obj .
    ?eventstate rdf:subject ?event ;
                rdf:predicate rdf:type ;
                rdf:object ?eventtype .
    OPTIONAL { ?event aida:justifiedBy/skos:prefLabel ?eventlabel }
}
GROUP BY ?pred ?event ?eventtype"#;
        let rows = self
            .inner
            .ctx
            .store
            .select(query, &Bindings::new().iri("obj", self.inner.uri.as_str()))
            .await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let predicate = row.require("pred")?.as_str().to_string();
            let event = Uri::from(row.require("event")?.as_str());
            let event_type = Uri::from(row.require("eventtype")?.as_str());
            let label = match row.text("mlabel").filter(|l| !l.is_empty()) {
                Some(l) => l.to_string(),
                None => event_type.local_name().to_string(),
            };
            let member = ClusterMember::with_attrs(
                event,
                self.inner.ctx.clone(),
                label,
                Some(event_type),
                None,
            );
            events.push((vocab::role_name(&predicate).to_string(), member));
        }
        Ok(events)
    }

    /// The cluster this member belongs to, if its membership node points
    /// at a URI the store confirms to be a coreference cluster.
    pub async fn cluster(&self) -> Result<Option<&Cluster>> {
        let cluster = self
            .inner
            .cluster
            .get_or_try_init(|| async {
                let query = r#"
SELECT ?cluster
WHERE {
    ?membership aida:cluster ?cluster ;
                aida:clusterMember ?member .
}"#;
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(query, &Bindings::new().iri("member", self.inner.uri.as_str()))
                    .await?;
                let Some(row) = rows.first() else {
                    return Ok::<_, Error>(None);
                };
                let cluster_uri = Uri::from(row.require("cluster")?.as_str());
                let known = self
                    .inner
                    .ctx
                    .store
                    .ask(
                        SAME_AS_CLUSTER_ASK,
                        &Bindings::new().iri("cluster", cluster_uri.as_str()),
                    )
                    .await?;
                Ok(known.then(|| Cluster::new(cluster_uri, self.inner.ctx.clone())))
            })
            .await?;
        Ok(cluster.as_ref())
    }

    async fn ident(&self) -> Result<&MemberIdent> {
        self.inner
            .ident
            .get_or_try_init(|| async {
                let (ident, target) = self.fetch_attrs().await?;
                let _ = self.inner.target.set(target);
                Ok(ident)
            })
            .await
    }

    /// One fetch covers label, type and target; whichever cell triggered
    /// it, the other is seeded opportunistically.
    async fn fetch_attrs(&self) -> Result<(MemberIdent, Resolution<String>)> {
        let query = r#"
SELECT ?label ?type ?target
WHERE {
    OPTIONAL { ?member aida:hasName ?label }
    OPTIONAL { ?member aida:justifiedBy/skos:prefLabel ?label }
    OPTIONAL { ?member aida:link/aida:linkTarget ?target }
    ?statement a rdf:Statement ;
               rdf:subject ?member ;
               rdf:predicate rdf:type ;
               rdf:object ?type .
}
LIMIT 1"#;
        let rows = self
            .inner
            .ctx
            .store
            .select(query, &Bindings::new().iri("member", self.inner.uri.as_str()))
            .await?;
        let Some(row) = rows.first() else {
            debug!(member = %self.inner.uri, "Member has no attribute row, using URI fallbacks");
            return Ok((
                MemberIdent {
                    label: self.inner.uri.local_name().to_string(),
                    member_type: None,
                },
                Resolution::Absent,
            ));
        };
        let member_type = Uri::from(row.require("type")?.as_str());
        let label = match row.text("label").filter(|l| !l.is_empty()) {
            Some(l) => l.to_string(),
            None => member_type.local_name().to_string(),
        };
        let target = Resolution::from_option(row.get("target").map(Term::as_str).map(str::to_string));
        Ok((
            MemberIdent {
                label,
                member_type: Some(member_type),
            },
            target,
        ))
    }
}

impl PartialEq for ClusterMember {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uri == other.inner.uri
    }
}

impl Eq for ClusterMember {}

impl Hash for ClusterMember {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uri.hash(state);
    }
}

impl std::fmt::Debug for ClusterMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterMember")
            .field("uri", &self.inner.uri)
            .finish()
    }
}

// ========== Tests ==========
