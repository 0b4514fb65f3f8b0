//! Coreference clusters and their lazily materialized attributes.
//!
//! A `Cluster` is a cheap handle over a `SameAsCluster` node. Attribute
//! groups fetched together live in one memoization cell each:
//!
//! - prototype member and ontology category (one query)
//! - member list plus link-target tally (one query)
//! - knowledge-base node tally, derived from the targets
//! - forward and backward relation edges (one query each)
//!
//! Size is special: the persisted overlay answers first, then an already
//! materialized member list, and only then a `COUNT` query, which is
//! deliberately not memoized. Failed fetches leave their cell unset so a
//! later access retries.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gateway::{Bindings, Term};
use crate::graph::GraphContext;
use crate::listing;
use crate::vocab;

use super::Uri;
use super::edge::{MIN_EDGE_CONFIDENCE, SuperEdge, confidence_weight};
use super::member::ClusterMember;
use super::resolution::Resolution;

/// Prototype member and reified ontology category, fetched as one unit.
struct PrototypeInfo {
    member: ClusterMember,
    category: Uri,
}

/// Member list and the tally of their external link targets.
struct MembersInfo {
    members: Vec<ClusterMember>,
    targets: HashMap<String, usize>,
}

/// Knowledge-base nodes the cluster's targets resolve to.
struct QnodeInfo {
    counts: HashMap<String, usize>,
    urls: HashMap<String, String>,
}

struct ClusterInner {
    uri: Uri,
    ctx: Arc<GraphContext>,
    prototype: OnceCell<PrototypeInfo>,
    members: OnceCell<MembersInfo>,
    qnodes: OnceCell<QnodeInfo>,
    forward: OnceCell<HashSet<SuperEdge>>,
    backward: OnceCell<HashSet<SuperEdge>>,
}

/// Handle to one coreference cluster.
///
/// Clones are cheap and share the same memoization cells, so two copies
/// of a cluster never fetch the same attribute twice. Identity is the
/// cluster URI.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    pub(crate) fn new(uri: Uri, ctx: Arc<GraphContext>) -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                uri,
                ctx,
                prototype: OnceCell::new(),
                members: OnceCell::new(),
                qnodes: OnceCell::new(),
                forward: OnceCell::new(),
                backward: OnceCell::new(),
            }),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Display path for the cluster, mapped through the configured
    /// URI-prefix table.
    pub fn href(&self) -> String {
        listing::display_path(self.inner.uri.as_str(), &self.inner.ctx.path_prefixes)
    }

    /// Display label: the overlay's if cached, otherwise the prototype's.
    pub async fn label(&self) -> Result<&str> {
        if let Some(label) = self.inner.ctx.overlay.label(&self.inner.uri) {
            return Ok(label);
        }
        self.prototype().await?.label().await
    }

    /// Ontology category: the overlay's if cached, otherwise the one
    /// reified onto the prototype.
    pub async fn category(&self) -> Result<Uri> {
        if let Some(category) = self.inner.ctx.overlay.category(&self.inner.uri) {
            return Ok(Uri::from(category));
        }
        Ok(self.proto_info().await?.category.clone())
    }

    /// The prototype member standing for the whole cluster.
    pub async fn prototype(&self) -> Result<&ClusterMember> {
        Ok(&self.proto_info().await?.member)
    }

    /// Whether the prototype is typed as a relation. Relation clusters
    /// get flattened into their endpoints during neighborhood expansion.
    pub async fn is_relation(&self) -> Result<bool> {
        let proto = self.prototype().await?;
        Ok(proto
            .member_type()
            .await?
            .is_some_and(|t| t.as_str() == vocab::class::RELATION))
    }

    /// All members, in query result order. Members arrive pre-seeded
    /// with label, type and (when recorded) link target.
    pub async fn members(&self) -> Result<&[ClusterMember]> {
        Ok(self.members_info().await?.members.as_slice())
    }

    /// External link targets tallied over the members, most frequent
    /// first; ties break on the target string.
    pub async fn targets(&self) -> Result<Vec<(String, usize)>> {
        Ok(ranked(&self.members_info().await?.targets))
    }

    /// Knowledge-base node identifiers the targets resolve to, with the
    /// target counts summed per node, most frequent first.
    pub async fn qnodes(&self) -> Result<Vec<(String, usize)>> {
        Ok(ranked(&self.qnode_info().await?.counts))
    }

    /// Entity URL for each resolved knowledge-base node identifier.
    pub async fn qnode_urls(&self) -> Result<&HashMap<String, String>> {
        Ok(&self.qnode_info().await?.urls)
    }

    /// Member count. The overlay answers first, then an already
    /// materialized member list; the fallback `COUNT` query is issued
    /// anew on every call.
    pub async fn size(&self) -> Result<usize> {
        if let Some(size) = self.inner.ctx.overlay.size(&self.inner.uri) {
            return Ok(size);
        }
        if let Some(info) = self.inner.members.get() {
            return Ok(info.members.len());
        }
        let query = r#"
SELECT (COUNT(?member) AS ?size)
WHERE {
    ?membership aida:cluster ?cluster ;
                aida:clusterMember ?member .
}"#;
        let rows = self
            .inner
            .ctx
            .store
            .select(query, &Bindings::new().iri("cluster", self.inner.uri.as_str()))
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get("size"))
            .and_then(Term::as_i64)
            .unwrap_or(0);
        Ok(count.max(0) as usize)
    }

    /// Edges whose subject is this cluster.
    pub async fn forward(&self) -> Result<&HashSet<SuperEdge>> {
        self.inner
            .forward
            .get_or_try_init(|| async {
                let query = format!(
                    r#"
SELECT ?p ?o ?conf
WHERE {{
    ?s aida:prototype ?proto1 .
    ?o aida:prototype ?proto2 .
    ?se rdf:subject ?proto1 ;
        rdf:predicate ?p ;
        rdf:object ?proto2 ;
        aida:confidence/aida:confidenceValue ?conf .
    FILTER(?conf > {MIN_EDGE_CONFIDENCE})
}}"#
                );
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(&query, &Bindings::new().iri("s", self.inner.uri.as_str()))
                    .await?;
                debug!(cluster = %self.inner.uri, rows = rows.len(), "Materialized forward edges");
                let mut edges = HashSet::with_capacity(rows.len());
                for row in &rows {
                    let Some(conf) = row.require("conf")?.as_f64().filter(|c| c.is_finite())
                    else {
                        warn!(cluster = %self.inner.uri, "Skipping edge row with unusable confidence");
                        continue;
                    };
                    let predicate = Uri::from(row.require("p")?.as_str());
                    let object =
                        Cluster::new(Uri::from(row.require("o")?.as_str()), self.inner.ctx.clone());
                    edges.insert(SuperEdge::new(
                        self.clone(),
                        predicate,
                        object,
                        confidence_weight(conf),
                    ));
                }
                Ok::<_, Error>(edges)
            })
            .await
    }

    /// Edges whose object is this cluster.
    pub async fn backward(&self) -> Result<&HashSet<SuperEdge>> {
        self.inner
            .backward
            .get_or_try_init(|| async {
                let query = format!(
                    r#"
SELECT ?s ?p ?conf
WHERE {{
    ?s aida:prototype ?proto1 .
    ?o aida:prototype ?proto2 .
    ?se rdf:subject ?proto1 ;
        rdf:predicate ?p ;
        rdf:object ?proto2 ;
        aida:confidence/aida:confidenceValue ?conf .
    FILTER(?conf > {MIN_EDGE_CONFIDENCE})
}}"#
                );
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(&query, &Bindings::new().iri("o", self.inner.uri.as_str()))
                    .await?;
                debug!(cluster = %self.inner.uri, rows = rows.len(), "Materialized backward edges");
                let mut edges = HashSet::with_capacity(rows.len());
                for row in &rows {
                    let Some(conf) = row.require("conf")?.as_f64().filter(|c| c.is_finite())
                    else {
                        warn!(cluster = %self.inner.uri, "Skipping edge row with unusable confidence");
                        continue;
                    };
                    let subject =
                        Cluster::new(Uri::from(row.require("s")?.as_str()), self.inner.ctx.clone());
                    let predicate = Uri::from(row.require("p")?.as_str());
                    edges.insert(SuperEdge::new(
                        subject,
                        predicate,
                        self.clone(),
                        confidence_weight(conf),
                    ));
                }
                Ok::<_, Error>(edges)
            })
            .await
    }

    /// All edges touching the cluster, in either direction.
    pub async fn neighbors(&self) -> Result<HashSet<SuperEdge>> {
        let mut all = self.forward().await?.clone();
        all.extend(self.backward().await?.iter().cloned());
        Ok(all)
    }

    /// Bounded-hop neighborhood.
    ///
    /// At one hop from a non-relation cluster, edges arriving from a
    /// relation-typed cluster pull in that relation's own edges, so the
    /// relation's other endpoints appear without an extra hop. Deeper
    /// hops recurse through both endpoints of every direct edge.
    pub fn neighborhood(&self, hop: u32) -> BoxFuture<'_, Result<HashSet<SuperEdge>>> {
        Box::pin(async move {
            let neighbors = self.neighbors().await?;
            if hop == 1 && !self.is_relation().await? {
                let mut hood = neighbors.clone();
                for edge in &neighbors {
                    if edge.subject().is_relation().await? {
                        hood.extend(edge.subject().neighbors().await?);
                    }
                }
                Ok(hood)
            } else if hop <= 1 {
                Ok(neighbors)
            } else {
                let mut hood = HashSet::new();
                for edge in &neighbors {
                    hood.extend(edge.subject().neighborhood(hop - 1).await?);
                    hood.extend(edge.object().neighborhood(hop - 1).await?);
                }
                Ok(hood)
            }
        })
    }

    async fn proto_info(&self) -> Result<&PrototypeInfo> {
        self.inner
            .prototype
            .get_or_try_init(|| async {
                let query = r#"
SELECT ?prototype (MIN(?label) AS ?mlabel) ?type ?category
WHERE {
    ?cluster aida:prototype ?prototype .
    ?prototype a ?type .
    OPTIONAL { ?prototype aida:hasName ?label }
    ?statement a rdf:Statement ;
               rdf:subject ?prototype ;
               rdf:predicate rdf:type ;
               rdf:object ?category .
}
GROUP BY ?prototype ?type ?category"#;
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(query, &Bindings::new().iri("cluster", self.inner.uri.as_str()))
                    .await?;
                let Some(row) = rows.first() else {
                    return Err(Error::MalformedResponse(format!(
                        "no prototype for cluster {}",
                        self.inner.uri
                    )));
                };
                let proto_uri = Uri::from(row.require("prototype")?.as_str());
                let member_type = Uri::from(row.require("type")?.as_str());
                let category = Uri::from(row.require("category")?.as_str());
                let label = match row.text("mlabel").filter(|l| !l.is_empty()) {
                    Some(l) => l.to_string(),
                    None => category.local_name().to_string(),
                };
                debug!(cluster = %self.inner.uri, prototype = %proto_uri, "Materialized prototype");
                let member = ClusterMember::with_attrs(
                    proto_uri,
                    self.inner.ctx.clone(),
                    label,
                    Some(member_type),
                    None,
                );
                Ok(PrototypeInfo { member, category })
            })
            .await
    }

    async fn members_info(&self) -> Result<&MembersInfo> {
        self.inner
            .members
            .get_or_try_init(|| async {
                let query = r#"
SELECT ?member (MIN(?label) AS ?mlabel) ?type ?target
WHERE {
    ?membership aida:cluster ?cluster ;
                aida:clusterMember ?member .
    OPTIONAL { ?member aida:hasName ?label }
    OPTIONAL { ?member aida:link/aida:linkTarget ?target }
    ?statement a rdf:Statement ;
               rdf:subject ?member ;
               rdf:predicate rdf:type ;
               rdf:object ?type .
}
GROUP BY ?member ?type ?target"#;
                let rows = self
                    .inner
                    .ctx
                    .store
                    .select(query, &Bindings::new().iri("cluster", self.inner.uri.as_str()))
                    .await?;
                debug!(cluster = %self.inner.uri, rows = rows.len(), "Materialized members");
                let mut members = Vec::with_capacity(rows.len());
                let mut targets: HashMap<String, usize> = HashMap::new();
                for row in &rows {
                    let member_uri = Uri::from(row.require("member")?.as_str());
                    let member_type = Uri::from(row.require("type")?.as_str());
                    let target = row.get("target").map(Term::as_str).map(str::to_string);
                    if let Some(target) = &target {
                        *targets.entry(target.clone()).or_insert(0) += 1;
                    }
                    let label = match row.text("mlabel").filter(|l| !l.is_empty()) {
                        Some(l) => l.to_string(),
                        None => member_type.local_name().to_string(),
                    };
                    members.push(ClusterMember::with_attrs(
                        member_uri,
                        self.inner.ctx.clone(),
                        label,
                        Some(member_type),
                        target,
                    ));
                }
                Ok::<_, Error>(MembersInfo { members, targets })
            })
            .await
    }

    async fn qnode_info(&self) -> Result<&QnodeInfo> {
        self.inner
            .qnodes
            .get_or_try_init(|| async {
                let targets = self.targets().await?;
                let mut counts: HashMap<String, usize> = HashMap::new();
                let mut urls: HashMap<String, String> = HashMap::new();
                for (target, n) in targets {
                    if let Resolution::Present(node) =
                        self.inner.ctx.resolver.resolve(&target).await?
                    {
                        *counts.entry(node.id.clone()).or_insert(0) += n;
                        urls.entry(node.id).or_insert(node.uri);
                    }
                }
                Ok::<_, Error>(QnodeInfo { counts, urls })
            })
            .await
    }
}

/// Descending by count, ties ascending by key, so output is stable.
fn ranked(counts: &HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut pairs: Vec<(String, usize)> =
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uri == other.inner.uri
    }
}

impl Eq for Cluster {}

impl Hash for Cluster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uri.hash(state);
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("uri", &self.inner.uri)
            .finish()
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOverlay, CacheRecord};
    use crate::gateway::{Row, StubGateway};
    use crate::graph::testing::{stub_context, stub_context_kb, stub_context_overlay};

    const C1: &str = "http://x/clusters/c1";
    const PERSON: &str = "http://x/ont#Person";
    const SPONSOR: &str = "http://x/ont#GeneralAffiliation.APORA_Sponsor";

    fn proto_row(proto: &str, label: Option<&str>, mtype: &str, category: &str) -> Row {
        let mut pairs = vec![
            ("prototype", Term::iri(proto)),
            ("type", Term::iri(mtype)),
            ("category", Term::iri(category)),
        ];
        if let Some(l) = label {
            pairs.push(("mlabel", Term::literal(l)));
        }
        Row::from_pairs(pairs)
    }

    fn member_row(member: &str, label: Option<&str>, target: Option<&str>) -> Row {
        let mut pairs = vec![("member", Term::iri(member)), ("type", Term::iri(PERSON))];
        if let Some(l) = label {
            pairs.push(("mlabel", Term::literal(l)));
        }
        if let Some(t) = target {
            pairs.push(("target", Term::literal(t)));
        }
        Row::from_pairs(pairs)
    }

    fn fwd_row(p: &str, o: &str, conf: &str) -> Row {
        Row::from_pairs(vec![
            ("p", Term::iri(p)),
            ("o", Term::iri(o)),
            ("conf", Term::literal(conf)),
        ])
    }

    fn bwd_row(s: &str, p: &str, conf: &str) -> Row {
        Row::from_pairs(vec![
            ("s", Term::iri(s)),
            ("p", Term::iri(p)),
            ("conf", Term::literal(conf)),
        ])
    }

    fn proto_marker(uri: &str) -> String {
        format!("<{uri}> aida:prototype ?prototype")
    }

    fn fwd_markers(uri: &str) -> [String; 2] {
        ["SELECT ?p ?o ?conf".to_string(), format!("<{uri}>")]
    }

    fn bwd_markers(uri: &str) -> [String; 2] {
        ["SELECT ?s ?p ?conf".to_string(), format!("<{uri}>")]
    }

    fn as_refs(markers: &[String]) -> Vec<&str> {
        markers.iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_prototype_fetch_covers_label_category_and_kind() {
        let stub = Arc::new(StubGateway::new().route(
            &[proto_marker(C1).as_str()],
            vec![proto_row(
                "http://x/proto/p1",
                Some("Vladimir Putin"),
                PERSON,
                PERSON,
            )],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub.clone()));

        assert_eq!(cluster.label().await.unwrap(), "Vladimir Putin");
        assert_eq!(cluster.category().await.unwrap().as_str(), PERSON);
        assert_eq!(cluster.prototype().await.unwrap().uri().as_str(), "http://x/proto/p1");
        assert!(!cluster.is_relation().await.unwrap());
        assert_eq!(stub.selects_served(), 1);
    }

    #[tokio::test]
    async fn test_prototype_label_falls_back_to_category_local_name() {
        let stub = Arc::new(StubGateway::new().route(
            &[proto_marker(C1).as_str()],
            vec![proto_row("http://x/proto/p1", None, PERSON, PERSON)],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        assert_eq!(cluster.label().await.unwrap(), "Person");
    }

    #[tokio::test]
    async fn test_missing_prototype_errors_without_memoizing() {
        let stub = Arc::new(StubGateway::new());
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub.clone()));

        assert!(cluster.prototype().await.is_err());
        assert!(cluster.prototype().await.is_err());
        // The cell stays unset after a failure, so each attempt re-queries.
        assert_eq!(stub.selects_served(), 2);
    }

    #[tokio::test]
    async fn test_members_preseed_attributes_and_tally_targets() {
        let stub = Arc::new(StubGateway::new().route(
            &[format!("aida:cluster <{C1}>").as_str()],
            vec![
                member_row("http://x/members/m1", Some("Putin"), Some("LDC:T1")),
                member_row("http://x/members/m2", None, Some("LDC:T1")),
                member_row("http://x/members/m3", Some("VP"), None),
            ],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub.clone()));

        let members = cluster.members().await.unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[1].label().await.unwrap(), "Person");
        assert_eq!(members[0].target().await.unwrap(), Some("LDC:T1"));
        assert_eq!(cluster.targets().await.unwrap(), vec![("LDC:T1".to_string(), 2)]);
        assert_eq!(stub.selects_served(), 1);
    }

    #[tokio::test]
    async fn test_member_rows_with_distinct_targets_stay_distinct() {
        let stub = Arc::new(StubGateway::new().route(
            &[format!("aida:cluster <{C1}>").as_str()],
            vec![
                member_row("http://x/members/m1", Some("Putin"), Some("LDC:T1")),
                member_row("http://x/members/m1", Some("Putin"), Some("LDC:T2")),
            ],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        assert_eq!(cluster.members().await.unwrap().len(), 2);
        let targets = cluster.targets().await.unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|(_, n)| *n == 1));
    }

    #[tokio::test]
    async fn test_size_prefers_overlay_then_members_then_count() {
        // Overlay hit: no query at all.
        let stub = Arc::new(StubGateway::new());
        let mut entries = HashMap::new();
        entries.insert(
            Uri::from(C1),
            CacheRecord {
                label: Some("Putin".to_string()),
                category: Some(PERSON.to_string()),
                size: Some(42),
            },
        );
        let cluster = Cluster::new(
            Uri::from(C1),
            stub_context_overlay(stub.clone(), CacheOverlay::from_entries(entries)),
        );
        assert_eq!(cluster.size().await.unwrap(), 42);
        assert_eq!(cluster.label().await.unwrap(), "Putin");
        assert_eq!(cluster.category().await.unwrap().as_str(), PERSON);
        assert_eq!(stub.selects_served(), 0);

        // Materialized members answer without a COUNT query.
        let stub = Arc::new(StubGateway::new().route(
            &[format!("aida:cluster <{C1}>").as_str()],
            vec![member_row("http://x/members/m1", Some("Putin"), None)],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub.clone()));
        cluster.members().await.unwrap();
        assert_eq!(cluster.size().await.unwrap(), 1);
        assert_eq!(stub.selects_served(), 1);

        // Otherwise COUNT, re-issued per call.
        let stub = Arc::new(StubGateway::new().route(
            &["COUNT(?member)", format!("<{C1}>").as_str()],
            vec![Row::from_pairs(vec![("size", Term::literal("7"))])],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub.clone()));
        assert_eq!(cluster.size().await.unwrap(), 7);
        assert_eq!(cluster.size().await.unwrap(), 7);
        assert_eq!(stub.selects_served(), 2);
    }

    #[tokio::test]
    async fn test_forward_edges_weighted_and_first_weight_kept() {
        let stub = Arc::new(
            StubGateway::new().route(
                &as_refs(&fwd_markers(C1)),
                vec![
                    fwd_row(SPONSOR, "http://x/clusters/c2", "0.75"),
                    fwd_row(SPONSOR, "http://x/clusters/c2", "0.9"),
                    fwd_row("http://x/ont#Part.Whole_Part", "http://x/clusters/c3", "0.9"),
                ],
            ),
        );
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        let forward = cluster.forward().await.unwrap();
        assert_eq!(forward.len(), 2);
        let sponsor = forward
            .iter()
            .find(|e| e.predicate().as_str() == SPONSOR)
            .expect("sponsor edge");
        assert_eq!(sponsor.count(), 2);
        assert_eq!(sponsor.subject().uri().as_str(), C1);
        assert_eq!(sponsor.object().uri().as_str(), "http://x/clusters/c2");

        // Unrouted backward query yields no rows; union is just forward.
        assert_eq!(cluster.neighbors().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_backward_edges_point_into_cluster() {
        let stub = Arc::new(StubGateway::new().route(
            &as_refs(&bwd_markers(C1)),
            vec![bwd_row("http://x/clusters/c9", SPONSOR, "0.9")],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        let backward = cluster.backward().await.unwrap();
        assert_eq!(backward.len(), 1);
        let edge = backward.iter().next().unwrap();
        assert_eq!(edge.subject().uri().as_str(), "http://x/clusters/c9");
        assert_eq!(edge.object().uri().as_str(), C1);
        assert_eq!(edge.count(), 5);
    }

    #[tokio::test]
    async fn test_edge_rows_with_unusable_confidence_are_skipped() {
        let stub = Arc::new(StubGateway::new().route(
            &as_refs(&fwd_markers(C1)),
            vec![
                fwd_row(SPONSOR, "http://x/clusters/c2", "high"),
                fwd_row(SPONSOR, "http://x/clusters/c3", "0.75"),
            ],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        let forward = cluster.forward().await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(
            forward.iter().next().unwrap().object().uri().as_str(),
            "http://x/clusters/c3"
        );
    }

    #[tokio::test]
    async fn test_one_hop_expands_relation_subjects() {
        let r1 = "http://x/clusters/r1";
        let r2 = "http://x/clusters/r2";
        let c5 = "http://x/clusters/c5";
        let c6 = "http://x/clusters/c6";
        let affiliate = "http://x/ont#GeneralAffiliation.APORA_Affiliate";
        let relation_proto = |proto: &str| {
            proto_row(
                proto,
                None,
                vocab::class::RELATION,
                "http://x/ont#GeneralAffiliation.APORA",
            )
        };
        let stub = Arc::new(
            StubGateway::new()
                .route(
                    &[proto_marker(C1).as_str()],
                    vec![proto_row("http://x/proto/p1", Some("Putin"), PERSON, PERSON)],
                )
                .route(
                    &[proto_marker(r1).as_str()],
                    vec![relation_proto("http://x/proto/pr1")],
                )
                .route(
                    &[proto_marker(r2).as_str()],
                    vec![relation_proto("http://x/proto/pr2")],
                )
                .route(
                    &as_refs(&bwd_markers(C1)),
                    vec![bwd_row(r1, SPONSOR, "0.75"), bwd_row(r2, SPONSOR, "0.9")],
                )
                .route(
                    &as_refs(&fwd_markers(r1)),
                    vec![fwd_row(SPONSOR, C1, "0.75"), fwd_row(affiliate, c5, "0.75")],
                )
                .route(
                    &as_refs(&fwd_markers(r2)),
                    vec![fwd_row(SPONSOR, C1, "0.9"), fwd_row(affiliate, c6, "0.9")],
                ),
        );
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        // Direct neighbors stop at the two relation clusters.
        assert_eq!(cluster.neighborhood(0).await.unwrap().len(), 2);

        // One hop keeps both relations and pulls in their other endpoints.
        let hood = cluster.neighborhood(1).await.unwrap();
        assert_eq!(hood.len(), 4);
        let weight_of = |subject: &str, object: &str| {
            hood.iter()
                .find(|e| {
                    e.subject().uri().as_str() == subject && e.object().uri().as_str() == object
                })
                .map(|e| e.count())
        };
        assert_eq!(weight_of(r1, C1), Some(2));
        assert_eq!(weight_of(r2, C1), Some(5));
        assert_eq!(weight_of(r1, c5), Some(2));
        assert_eq!(weight_of(r2, c6), Some(5));
    }

    #[tokio::test]
    async fn test_relation_cluster_neighborhood_stays_flat() {
        let r1 = "http://x/clusters/r1";
        let stub = Arc::new(
            StubGateway::new()
                .route(
                    &[proto_marker(r1).as_str()],
                    vec![proto_row(
                        "http://x/proto/pr1",
                        None,
                        vocab::class::RELATION,
                        "http://x/ont#GeneralAffiliation.APORA",
                    )],
                )
                .route(
                    &as_refs(&fwd_markers(r1)),
                    vec![fwd_row(SPONSOR, C1, "0.9")],
                ),
        );
        let relation = Cluster::new(Uri::from(r1), stub_context(stub));

        let hood = relation.neighborhood(1).await.unwrap();
        assert_eq!(hood.len(), 1);
        assert_eq!(hood, relation.neighbors().await.unwrap());
        assert_eq!(relation.neighborhood(0).await.unwrap(), hood);
    }

    #[tokio::test]
    async fn test_multi_hop_unions_endpoint_neighborhoods() {
        let c2 = "http://x/clusters/c2";
        let c3 = "http://x/clusters/c3";
        let part = "http://x/ont#Part.Whole_Part";
        let stub = Arc::new(
            StubGateway::new()
                .route(
                    &[proto_marker(C1).as_str()],
                    vec![proto_row("http://x/proto/p1", Some("A"), PERSON, PERSON)],
                )
                .route(
                    &[proto_marker(c2).as_str()],
                    vec![proto_row("http://x/proto/p2", Some("B"), PERSON, PERSON)],
                )
                .route(
                    &as_refs(&fwd_markers(C1)),
                    vec![fwd_row(SPONSOR, c2, "0.9")],
                )
                .route(
                    &as_refs(&fwd_markers(c2)),
                    vec![fwd_row(part, c3, "0.75")],
                )
                .route(
                    &as_refs(&bwd_markers(c2)),
                    vec![bwd_row(C1, SPONSOR, "0.9")],
                ),
        );
        let cluster = Cluster::new(Uri::from(C1), stub_context(stub));

        let hood = cluster.neighborhood(2).await.unwrap();
        assert_eq!(hood.len(), 2);
        assert!(hood.iter().any(|e| e.object().uri().as_str() == c2));
        assert!(hood.iter().any(|e| e.object().uri().as_str() == c3));
    }

    #[tokio::test]
    async fn test_qnodes_sum_counts_of_targets_sharing_a_node() {
        let store = Arc::new(StubGateway::new().route(
            &[format!("aida:cluster <{C1}>").as_str()],
            vec![
                member_row("http://x/members/m1", Some("Putin"), Some("LDC:T1")),
                member_row("http://x/members/m2", None, Some("LDC:T1")),
                member_row("http://x/members/m3", None, Some("LDC:T2")),
            ],
        ));
        let kb = Arc::new(StubGateway::new().route(
            &["wdt:P646", "rdfs:label"],
            vec![Row::from_pairs(vec![
                ("qid", Term::iri("http://www.wikidata.org/entity/Q7747")),
                ("label", Term::literal("Vladimir Putin")),
            ])],
        ));
        let cluster = Cluster::new(Uri::from(C1), stub_context_kb(store, kb));

        let qnodes = cluster.qnodes().await.unwrap();
        assert_eq!(qnodes, vec![("Q7747".to_string(), 3)]);
        let urls = cluster.qnode_urls().await.unwrap();
        assert_eq!(
            urls.get("Q7747").map(String::as_str),
            Some("http://www.wikidata.org/entity/Q7747")
        );
    }

    #[tokio::test]
    async fn test_ranked_orders_by_count_then_key() {
        let mut counts = HashMap::new();
        counts.insert("b".to_string(), 2);
        counts.insert("a".to_string(), 2);
        counts.insert("c".to_string(), 5);
        assert_eq!(
            ranked(&counts),
            vec![
                ("c".to_string(), 5),
                ("a".to_string(), 2),
                ("b".to_string(), 2),
            ]
        );
    }
}
