//! Typed terms, rows and bindings for the SPARQL result wire format

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};

/// One RDF term in a result row or a binding value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// An IRI reference
    Iri(String),
    /// A literal with optional language tag and datatype
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
    /// A blank node label
    Bnode(String),
}

impl Term {
    /// IRI term
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Plain literal term without language tag or datatype
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    /// Lexical value regardless of term kind
    pub fn as_str(&self) -> &str {
        match self {
            Term::Iri(v) => v,
            Term::Literal { value, .. } => value,
            Term::Bnode(v) => v,
        }
    }

    /// IRI value, if this term is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(v) => Some(v),
            _ => None,
        }
    }

    /// Lexical value parsed as an integer
    pub fn as_i64(&self) -> Option<i64> {
        self.as_str().parse().ok()
    }

    /// Lexical value parsed as a float
    pub fn as_f64(&self) -> Option<f64> {
        self.as_str().parse().ok()
    }

    /// Render the term as SPARQL surface syntax for substitution
    pub fn to_sparql(&self) -> String {
        match self {
            Term::Iri(v) => format!("<{}>", v),
            Term::Literal {
                value,
                lang,
                datatype,
            } => {
                let quoted = format!("\"{}\"", escape_literal(value));
                if let Some(lang) = lang {
                    format!("{}@{}", quoted, lang)
                } else if let Some(dt) = datatype {
                    format!("{}^^<{}>", quoted, dt)
                } else {
                    quoted
                }
            }
            Term::Bnode(v) => format!("_:{}", v),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// One solution row, keyed by variable name
///
/// Unbound variables (OPTIONAL patterns that did not match) are simply
/// absent from the row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: HashMap<String, Term>,
}

impl Row {
    /// Build a row from (variable, term) pairs
    pub fn from_pairs(pairs: Vec<(&str, Term)>) -> Self {
        Row {
            columns: pairs
                .into_iter()
                .map(|(var, term)| (var.to_string(), term))
                .collect(),
        }
    }

    /// Term bound to a variable, if any
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.columns.get(var)
    }

    /// Term bound to a variable, or a malformed-response error
    pub fn require(&self, var: &str) -> Result<&Term> {
        self.columns.get(var).ok_or_else(|| {
            Error::MalformedResponse(format!("expected variable '{}' in result row", var))
        })
    }

    /// Lexical value bound to a variable, if any
    pub fn text(&self, var: &str) -> Option<&str> {
        self.columns.get(var).map(Term::as_str)
    }
}

/// Named values substituted into a query before execution
///
/// Substitution is textual and token-aware: `?name` is replaced only where
/// the next character cannot extend the variable name, so binding `s` never
/// touches an occurrence of `?se` or `?source`.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, Term)>,
}

impl Bindings {
    /// Empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable to an IRI
    pub fn iri(mut self, var: &str, value: impl Into<String>) -> Self {
        self.entries.push((var.to_string(), Term::iri(value)));
        self
    }

    /// Bind a variable to a plain literal
    pub fn literal(mut self, var: &str, value: impl Into<String>) -> Self {
        self.entries.push((var.to_string(), Term::literal(value)));
        self
    }

    /// True when no variables are bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitute every bound variable into the query text
    pub fn apply(&self, query: &str) -> String {
        let mut text = query.to_string();
        for (var, term) in &self.entries {
            text = substitute(&text, var, &term.to_sparql());
        }
        text
    }
}

fn substitute(query: &str, var: &str, replacement: &str) -> String {
    let needle = format!("?{}", var);
    let mut out = String::with_capacity(query.len() + replacement.len());
    let mut rest = query;
    while let Some(pos) = rest.find(&needle) {
        let tail = &rest[pos + needle.len()..];
        let at_boundary = tail
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true);
        out.push_str(&rest[..pos]);
        if at_boundary {
            out.push_str(replacement);
            rest = tail;
        } else {
            // Prefix of a longer variable name, keep it and skip past `?`
            out.push('?');
            rest = &rest[pos + 1..];
        }
    }
    out.push_str(rest);
    out
}

// ========== SPARQL JSON results parsing ==========

#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: ResultsBlock,
}

#[derive(Debug, Deserialize)]
struct ResultsBlock {
    bindings: Vec<HashMap<String, RawTerm>>,
}

#[derive(Debug, Deserialize)]
struct RawTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
    datatype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    boolean: bool,
}

impl RawTerm {
    fn into_term(self) -> Result<Term> {
        match self.kind.as_str() {
            "uri" => Ok(Term::Iri(self.value)),
            // Some endpoints emit the legacy "typed-literal"
            "literal" | "typed-literal" => Ok(Term::Literal {
                value: self.value,
                lang: self.lang,
                datatype: self.datatype,
            }),
            "bnode" => Ok(Term::Bnode(self.value)),
            other => Err(Error::MalformedResponse(format!(
                "unknown term type '{}'",
                other
            ))),
        }
    }
}

/// Parse a SELECT response body into rows, preserving order
pub(crate) fn parse_select(body: &str) -> Result<Vec<Row>> {
    let response: SelectResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid SELECT response: {}", e)))?;

    let mut rows = Vec::with_capacity(response.results.bindings.len());
    for binding in response.results.bindings {
        let mut columns = HashMap::with_capacity(binding.len());
        for (var, raw) in binding {
            columns.insert(var, raw.into_term()?);
        }
        rows.push(Row { columns });
    }
    Ok(rows)
}

/// Parse an ASK response body into its boolean verdict
pub(crate) fn parse_ask(body: &str) -> Result<bool> {
    let response: AskResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid ASK response: {}", e)))?;
    Ok(response.boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_replaces_at_token_boundary() {
        let query = "SELECT ?p WHERE { ?s ?p ?o . ?se rdf:subject ?s }";
        let bound = Bindings::new().iri("s", "http://x/c1").apply(query);
        assert_eq!(
            bound,
            "SELECT ?p WHERE { <http://x/c1> ?p ?o . ?se rdf:subject <http://x/c1> }"
        );
    }

    #[test]
    fn test_substitute_keeps_longer_variable_names() {
        let query = "{ ?membership aida:cluster ?cluster ; aida:clusterMember ?member . }";
        let bound = Bindings::new().iri("member", "http://x/m1").apply(query);
        assert!(bound.contains("?membership aida:cluster"));
        assert!(bound.contains("aida:clusterMember <http://x/m1>"));
    }

    #[test]
    fn test_substitute_at_end_of_query() {
        let bound = Bindings::new().iri("c", "http://x/c").apply("ASK { ?a ?b ?c");
        assert!(bound.ends_with("<http://x/c>"));
    }

    #[test]
    fn test_literal_binding_is_quoted_and_escaped() {
        let bound = Bindings::new()
            .literal("source", "doc \"A\"\nline")
            .apply("{ ?j aida:source ?source }");
        assert_eq!(bound, "{ ?j aida:source \"doc \\\"A\\\"\\nline\" }");
    }

    #[test]
    fn test_term_rendering() {
        assert_eq!(Term::iri("http://x/a").to_sparql(), "<http://x/a>");
        assert_eq!(Term::literal("hi").to_sparql(), "\"hi\"");
        let tagged = Term::Literal {
            value: "hello".to_string(),
            lang: Some("en".to_string()),
            datatype: None,
        };
        assert_eq!(tagged.to_sparql(), "\"hello\"@en");
        let typed = Term::Literal {
            value: "3".to_string(),
            lang: None,
            datatype: Some("http://www.w3.org/2001/XMLSchema#integer".to_string()),
        };
        assert_eq!(
            typed.to_sparql(),
            "\"3\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(Term::Bnode("b0".to_string()).to_sparql(), "_:b0");
    }

    #[test]
    fn test_parse_select_rows_in_order() {
        let body = r#"{
            "head": { "vars": ["member", "mlabel"] },
            "results": { "bindings": [
                { "member": { "type": "uri", "value": "http://x/m1" },
                  "mlabel": { "type": "literal", "value": "Putin" } },
                { "member": { "type": "uri", "value": "http://x/m2" } }
            ] }
        }"#;
        let rows = parse_select(body).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("mlabel"), Some("Putin"));
        assert_eq!(
            rows[0].get("member").and_then(Term::as_iri),
            Some("http://x/m1")
        );
        // Unbound OPTIONAL variable is absent
        assert_eq!(rows[1].get("mlabel"), None);
        assert!(rows[1].require("mlabel").is_err());
    }

    #[test]
    fn test_parse_select_typed_literal() {
        let body = r#"{
            "results": { "bindings": [
                { "size": { "type": "typed-literal",
                            "datatype": "http://www.w3.org/2001/XMLSchema#integer",
                            "value": "42" } }
            ] }
        }"#;
        let rows = parse_select(body).expect("parse");
        assert_eq!(rows[0].get("size").and_then(Term::as_i64), Some(42));
    }

    #[test]
    fn test_parse_select_rejects_unknown_term_type() {
        let body = r#"{
            "results": { "bindings": [
                { "x": { "type": "triple", "value": "?" } }
            ] }
        }"#;
        assert!(parse_select(body).is_err());
    }

    #[test]
    fn test_parse_ask() {
        assert!(parse_ask(r#"{"head": {}, "boolean": true}"#).expect("parse"));
        assert!(!parse_ask(r#"{"boolean": false}"#).expect("parse"));
        assert!(parse_ask(r#"{"results": {"bindings": []}}"#).is_err());
    }

    #[test]
    fn test_language_tag_survives_parsing() {
        let body = r#"{
            "results": { "bindings": [
                { "label": { "type": "literal", "xml:lang": "en", "value": "Russia" } }
            ] }
        }"#;
        let rows = parse_select(body).expect("parse");
        match rows[0].get("label") {
            Some(Term::Literal { value, lang, .. }) => {
                assert_eq!(value, "Russia");
                assert_eq!(lang.as_deref(), Some("en"));
            }
            other => panic!("unexpected term: {:?}", other),
        }
    }
}
