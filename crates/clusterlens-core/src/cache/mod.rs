//! Persisted cache overlay for cluster display attributes.
//!
//! The overlay is a JSON map from cluster URI to label, ontology
//! category and member count, built offline by [`build_cache`] and
//! loaded read-only at startup. Lookups consult it before going to the
//! store; a missing file just means every lookup goes live.

mod builder;

pub use builder::build_cache;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::model::Uri;

/// Cached display attributes of one cluster. All fields optional: each
/// sweep of the builder fills a different subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// In-memory view of the persisted overlay.
#[derive(Debug, Clone, Default)]
pub struct CacheOverlay {
    entries: HashMap<Uri, CacheRecord>,
}

impl CacheOverlay {
    /// An overlay with no entries; every lookup falls through.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<Uri, CacheRecord>) -> Self {
        Self { entries }
    }

    /// Load the overlay from disk. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No cache overlay file, lookups go live");
            return Ok(Self::empty());
        }
        let text = std::fs::read_to_string(path)?;
        let entries: HashMap<Uri, CacheRecord> = serde_json::from_str(&text)?;
        info!(path = %path.display(), entries = entries.len(), "Loaded cache overlay");
        Ok(Self { entries })
    }

    pub fn get(&self, uri: &Uri) -> Option<&CacheRecord> {
        self.entries.get(uri)
    }

    pub fn label(&self, uri: &Uri) -> Option<&str> {
        self.entries.get(uri).and_then(|r| r.label.as_deref())
    }

    pub fn category(&self, uri: &Uri) -> Option<&str> {
        self.entries.get(uri).and_then(|r| r.category.as_deref())
    }

    pub fn size(&self, uri: &Uri) -> Option<usize> {
        self.entries.get(uri).and_then(|r| r.size).map(|s| s as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ========== Tests ==========
