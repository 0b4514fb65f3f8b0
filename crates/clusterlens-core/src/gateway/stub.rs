//! Scripted in-memory gateway for tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::Result;

use super::types::{Bindings, Row};
use super::QueryGateway;

/// In-memory gateway answering from canned rows
///
/// A route matches when every one of its markers occurs in the substituted
/// query text; routes are tried in insertion order and the first match
/// wins. Unmatched SELECTs return no rows and unmatched ASKs answer false,
/// which mirrors an empty store.
#[derive(Debug, Default)]
pub struct StubGateway {
    routes: Vec<SelectRoute>,
    asks: Vec<AskRoute>,
    selects_served: AtomicUsize,
}

#[derive(Debug)]
struct SelectRoute {
    markers: Vec<String>,
    rows: Vec<Row>,
    hits: AtomicUsize,
}

#[derive(Debug)]
struct AskRoute {
    markers: Vec<String>,
    answer: bool,
}

impl StubGateway {
    /// Gateway with no routes (every query resolves to nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` for any SELECT whose substituted text contains every marker
    pub fn route(mut self, markers: &[&str], rows: Vec<Row>) -> Self {
        self.routes.push(SelectRoute {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            rows,
            hits: AtomicUsize::new(0),
        });
        self
    }

    /// Answer an ASK whose substituted text contains every marker
    pub fn route_ask(mut self, markers: &[&str], answer: bool) -> Self {
        self.asks.push(AskRoute {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            answer,
        });
        self
    }

    /// Times the route registered with exactly these markers was served
    pub fn hits(&self, markers: &[&str]) -> usize {
        self.routes
            .iter()
            .find(|r| {
                r.markers.len() == markers.len()
                    && r.markers.iter().zip(markers.iter()).all(|(a, b)| a == b)
            })
            .map(|r| r.hits.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total SELECT queries served, matched or not
    pub fn selects_served(&self) -> usize {
        self.selects_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryGateway for StubGateway {
    async fn select(&self, query: &str, bindings: &Bindings) -> Result<Vec<Row>> {
        self.selects_served.fetch_add(1, Ordering::SeqCst);
        let text = bindings.apply(query);
        for route in &self.routes {
            if route.markers.iter().all(|m| text.contains(m.as_str())) {
                route.hits.fetch_add(1, Ordering::SeqCst);
                return Ok(route.rows.clone());
            }
        }
        Ok(Vec::new())
    }

    async fn ask(&self, query: &str, bindings: &Bindings) -> Result<bool> {
        let text = bindings.apply(query);
        for route in &self.asks {
            if route.markers.iter().all(|m| text.contains(m.as_str())) {
                return Ok(route.answer);
            }
        }
        Ok(false)
    }
}
