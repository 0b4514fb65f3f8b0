//! SPARQL protocol client
//!
//! Async HTTP client for one SPARQL endpoint with:
//! - Form-encoded query submission per the SPARQL 1.1 protocol
//! - JSON results parsing into typed rows
//! - Bounded timeout and a single retry on transient failures

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::vocab;

use super::types::{self, Bindings, Row};
use super::QueryGateway;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Total attempts per query (one retry on transient failures)
const MAX_ATTEMPTS: u32 = 2;

/// Base delay before the retry (in milliseconds)
const BACKOFF_BASE_MS: u64 = 250;

/// Result media type requested from the endpoint
const RESULTS_MEDIA_TYPE: &str = "application/sparql-results+json";

/// SPARQL endpoint client
///
/// Thread-safe; one instance exists per endpoint and is shared by every
/// concurrent traversal. Connection pooling is reqwest's concern.
#[derive(Clone)]
pub struct SparqlClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// Endpoint URL queries are POSTed to
    endpoint: String,
    /// Rendered PREFIX preamble prepended to every query
    preamble: String,
}

impl std::fmt::Debug for SparqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Builder for creating a SparqlClient
pub struct SparqlClientBuilder {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    prefixes: Vec<(&'static str, &'static str)>,
}

impl Default for SparqlClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SparqlClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout_secs: None,
            prefixes: vocab::standard_prefixes(),
        }
    }

    /// Set the endpoint URL
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Replace the default prefix set
    pub fn prefixes(mut self, prefixes: Vec<(&'static str, &'static str)>) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// Build the SparqlClient
    pub fn build(self) -> Result<SparqlClient> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::ConfigError("endpoint URL is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(SparqlClient {
            http_client,
            endpoint,
            preamble: vocab::prefix_block(&self.prefixes),
        })
    }
}

impl SparqlClient {
    /// Create a client for an endpoint with default timeout and prefixes
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        SparqlClientBuilder::new().endpoint(endpoint).build()
    }

    /// Create a new builder for SparqlClient
    pub fn builder() -> SparqlClientBuilder {
        SparqlClientBuilder::new()
    }

    /// Endpoint URL this client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Substitute bindings and prepend the prefix preamble
    fn prepare(&self, query: &str, bindings: &Bindings) -> String {
        format!("{}{}", self.preamble, bindings.apply(query))
    }

    /// Execute a prepared query with retry on transient failures
    async fn execute(&self, query: &str) -> Result<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send(query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempts < MAX_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts);
                    warn!(
                        endpoint = %self.endpoint,
                        attempt = attempts,
                        wait_ms = backoff,
                        "Transient gateway failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single query to the endpoint
    async fn send(&self, query: &str) -> Result<String> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, RESULTS_MEDIA_TYPE)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EndpointError {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        response.text().await.map_err(Error::NetworkError)
    }
}

#[async_trait]
impl QueryGateway for SparqlClient {
    async fn select(&self, query: &str, bindings: &Bindings) -> Result<Vec<Row>> {
        let text = self.prepare(query, bindings);
        let body = self.execute(&text).await?;
        let rows = types::parse_select(&body)?;
        debug!(endpoint = %self.endpoint, rows = rows.len(), "SELECT query returned");
        Ok(rows)
    }

    async fn ask(&self, query: &str, bindings: &Bindings) -> Result<bool> {
        let text = self.prepare(query, bindings);
        let body = self.execute(&text).await?;
        let verdict = types::parse_ask(&body)?;
        debug!(endpoint = %self.endpoint, verdict, "ASK query returned");
        Ok(verdict)
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);

    // Add some jitter (up to 10% variation)
    let jitter = base / 10;
    base + (clock_jitter() % jitter.max(1))
}

/// Generate a pseudo-random jitter value
fn clock_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 % 1000)
        .unwrap_or(0)
}

/// Keep endpoint error bodies readable in logs and messages
fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = SparqlClient::builder()
            .endpoint("http://localhost:3030/ds/query")
            .timeout_secs(5)
            .build()
            .expect("build");

        assert_eq!(client.endpoint(), "http://localhost:3030/ds/query");
    }

    #[test]
    fn test_client_builder_requires_endpoint() {
        let result = SparqlClient::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_prepare_prepends_prefixes_and_substitutes() {
        let client = SparqlClient::new("http://localhost:3030/ds/query").expect("build");
        let bindings = Bindings::new().iri("cluster", "http://x/c1");
        let text = client.prepare("ASK { ?cluster a aida:SameAsCluster }", &bindings);

        assert!(text.starts_with("PREFIX aida: <"));
        assert!(text.contains("ASK { <http://x/c1> a aida:SameAsCluster }"));
    }

    #[test]
    fn test_client_debug_omits_preamble() {
        let client = SparqlClient::new("http://example.org/sparql").expect("build");
        let debug = format!("{:?}", client);
        assert!(debug.contains("SparqlClient"));
        assert!(debug.contains("http://example.org/sparql"));
        assert!(!debug.contains("PREFIX"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SparqlClient>();
    }

    #[test]
    fn test_calculate_backoff_grows() {
        let first = calculate_backoff(1);
        assert!(first >= BACKOFF_BASE_MS);
        assert!(first < BACKOFF_BASE_MS * 2);

        let second = calculate_backoff(2);
        assert!(second >= BACKOFF_BASE_MS * 2);
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
    }

    // Integration tests that require live endpoints are marked with feature flag
    #[cfg(feature = "integration-tests")]
    mod integration {
        use super::*;
        use crate::config::Config;

        #[tokio::test]
        async fn test_live_kb_select() {
            let config = Config::default();
            let client = SparqlClient::builder()
                .endpoint(&config.endpoints.kb_url)
                .timeout_secs(config.endpoints.timeout_secs)
                .build()
                .unwrap();

            let rows = client
                .select(
                    "SELECT ?label WHERE { \
                     <http://www.wikidata.org/entity/Q42> rdfs:label ?label . \
                     FILTER(LANG(?label) = \"en\") } LIMIT 1",
                    &Bindings::new(),
                )
                .await
                .unwrap();

            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].text("label"), Some("Douglas Adams"));
        }

        #[tokio::test]
        async fn test_live_kb_ask() {
            let config = Config::default();
            let client = SparqlClient::builder()
                .endpoint(&config.endpoints.kb_url)
                .timeout_secs(config.endpoints.timeout_secs)
                .build()
                .unwrap();

            let known = client
                .ask(
                    "ASK { <http://www.wikidata.org/entity/Q42> rdfs:label ?label }",
                    &Bindings::new(),
                )
                .await
                .unwrap();
            assert!(known);
        }
    }
}
