//! Ontology vocabulary shared by the two query gateways
//!
//! The primary store speaks the AIDA interchange ontology; the secondary
//! knowledge base speaks Wikidata's direct-property vocabulary. Queries in
//! the model layer reference these namespaces through the prefix preamble
//! rendered by [`prefix_block`].

/// AIDA interchange ontology namespace
pub const AIDA: &str = "https://tac.nist.gov/tracks/SM-KBP/2018/ontologies/InterchangeOntology#";

/// RDF core namespace
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// RDF Schema namespace
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// SKOS namespace
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";

/// Wikidata direct-property namespace
pub const WDT: &str = "http://www.wikidata.org/prop/direct/";

/// Ontology classes the model dispatches on
pub mod class {
    /// Marker class distinguishing coreference clusters from arbitrary URIs
    pub const SAME_AS_CLUSTER: &str =
        "https://tac.nist.gov/tracks/SM-KBP/2018/ontologies/InterchangeOntology#SameAsCluster";

    /// Entity prototype class
    pub const ENTITY: &str =
        "https://tac.nist.gov/tracks/SM-KBP/2018/ontologies/InterchangeOntology#Entity";

    /// Event prototype class
    pub const EVENT: &str =
        "https://tac.nist.gov/tracks/SM-KBP/2018/ontologies/InterchangeOntology#Event";

    /// Relation prototype class
    pub const RELATION: &str =
        "https://tac.nist.gov/tracks/SM-KBP/2018/ontologies/InterchangeOntology#Relation";
}

/// Prefix set understood by both gateways
///
/// The secondary knowledge base only needs `wdt`, `rdfs` and `skos`, but
/// unused prefixes are harmless, so one shared set keeps the clients
/// uniform.
pub fn standard_prefixes() -> Vec<(&'static str, &'static str)> {
    vec![
        ("aida", AIDA),
        ("rdf", RDF),
        ("rdfs", RDFS),
        ("skos", SKOS),
        ("wdt", WDT),
    ]
}

/// Render a prefix list as a SPARQL `PREFIX` preamble
pub fn prefix_block(prefixes: &[(&str, &str)]) -> String {
    let mut block = String::new();
    for (name, iri) in prefixes {
        block.push_str("PREFIX ");
        block.push_str(name);
        block.push_str(": <");
        block.push_str(iri);
        block.push_str(">\n");
    }
    block
}

/// Human-readable local name: the fragment after the last `#` or `/`
///
/// Identifiers without either separator come back unchanged.
pub fn local_name(iri: &str) -> &str {
    let cut = match (iri.rfind('#'), iri.rfind('/')) {
        (Some(h), Some(s)) => h.max(s) + 1,
        (Some(h), None) => h + 1,
        (None, Some(s)) => s + 1,
        (None, None) => 0,
    };
    &iri[cut..]
}

/// Role name encoded in an argument predicate
///
/// The ontology names argument predicates `<EventType>_<Role>`, so the role
/// is everything after the first underscore. Predicates without an
/// underscore come back unchanged.
pub fn role_name(predicate: &str) -> &str {
    match predicate.find('_') {
        Some(i) => &predicate[i + 1..],
        None => predicate,
    }
}
