//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Clusterlens configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    pub cache: CacheConfig,
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Primary triple store query endpoint
    pub store_url: String,
    /// Secondary knowledge base query endpoint
    pub kb_url: String,
    /// Per-request timeout for both endpoints
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persisted cache overlay file
    pub overlay_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Default page size for cluster listings
    pub page_size: usize,
    /// Store URI prefixes rewritten into browsable paths, first match wins
    pub path_prefixes: Vec<PathPrefix>,
}

/// One URI-prefix to display-path rewrite rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPrefix {
    pub uri_prefix: String,
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointsConfig {
                store_url: "http://localhost:3030/aida/query".to_string(),
                kb_url: "https://query.wikidata.org/sparql".to_string(),
                timeout_secs: 30,
            },
            cache: CacheConfig {
                overlay_path: PathBuf::from("cluster_cache.json"),
            },
            listing: ListingConfig {
                page_size: 10,
                path_prefixes: vec![
                    PathPrefix {
                        uri_prefix: "http://www.isi.edu/gaia".to_string(),
                        path: "/cluster".to_string(),
                    },
                    PathPrefix {
                        uri_prefix: "http://www.columbia.edu".to_string(),
                        path: "/cluster".to_string(),
                    },
                ],
            },
        }
    }
}

impl EndpointsConfig {
    /// Store endpoint, letting the environment override the file value
    pub fn resolved_store_url(&self) -> String {
        env::var("CLUSTERLENS_STORE_URL").unwrap_or_else(|_| self.store_url.clone())
    }

    /// Knowledge base endpoint, letting the environment override the file value
    pub fn resolved_kb_url(&self) -> String {
        env::var("CLUSTERLENS_KB_URL").unwrap_or_else(|_| self.kb_url.clone())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CLUSTERLENS_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("clusterlens")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoints.store_url.trim().is_empty() {
            return Err(anyhow!("endpoints.store_url must not be empty"));
        }
        if self.endpoints.kb_url.trim().is_empty() {
            return Err(anyhow!("endpoints.kb_url must not be empty"));
        }
        if self.endpoints.timeout_secs == 0 {
            return Err(anyhow!("endpoints.timeout_secs must be positive"));
        }
        if self.listing.page_size == 0 {
            return Err(anyhow!("listing.page_size must be positive"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "endpoints.store_url" => Ok(self.endpoints.store_url.clone()),
            "endpoints.kb_url" => Ok(self.endpoints.kb_url.clone()),
            "endpoints.timeout_secs" => Ok(self.endpoints.timeout_secs.to_string()),

            "cache.overlay_path" => Ok(self.cache.overlay_path.display().to_string()),

            "listing.page_size" => Ok(self.listing.page_size.to_string()),
            "listing.path_prefixes" => Ok(self
                .listing
                .path_prefixes
                .iter()
                .map(|p| format!("{}={}", p.uri_prefix, p.path))
                .collect::<Vec<_>>()
                .join(", ")),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `clusterlens config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "endpoints.store_url" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("endpoints.store_url must not be empty"));
                }
                self.endpoints.store_url = value.to_string();
            }
            "endpoints.kb_url" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("endpoints.kb_url must not be empty"));
                }
                self.endpoints.kb_url = value.to_string();
            }
            "endpoints.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("endpoints.timeout_secs must be positive"));
                }
                self.endpoints.timeout_secs = secs;
            }

            "cache.overlay_path" => {
                self.cache.overlay_path = PathBuf::from(value);
            }

            "listing.page_size" => {
                let size: usize = value
                    .parse()
                    .with_context(|| format!("Invalid page_size value: {}", value))?;
                if size == 0 {
                    return Err(anyhow!("listing.page_size must be positive"));
                }
                self.listing.page_size = size;
            }
            "listing.path_prefixes" => {
                let mut prefixes = Vec::new();
                for pair in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let (uri_prefix, path) = pair.split_once('=').ok_or_else(|| {
                        anyhow!("Invalid path prefix '{}', expected 'uri_prefix=path'", pair)
                    })?;
                    prefixes.push(PathPrefix {
                        uri_prefix: uri_prefix.trim().to_string(),
                        path: path.trim().to_string(),
                    });
                }
                self.listing.path_prefixes = prefixes;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `clusterlens config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "endpoints.store_url",
            "endpoints.kb_url",
            "endpoints.timeout_secs",
            "cache.overlay_path",
            "listing.page_size",
            "listing.path_prefixes",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.endpoints.store_url, "http://localhost:3030/aida/query");
        assert_eq!(config.endpoints.kb_url, "https://query.wikidata.org/sparql");
        assert_eq!(config.endpoints.timeout_secs, 30);
        assert_eq!(config.cache.overlay_path, PathBuf::from("cluster_cache.json"));
        assert_eq!(config.listing.page_size, 10);
        assert_eq!(config.listing.path_prefixes.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_get_and_set_roundtrip() {
        let mut config = Config::default();

        config
            .set("endpoints.store_url", "http://triples:3030/ds/query")
            .expect("set");
        assert_eq!(
            config.get("endpoints.store_url").expect("get"),
            "http://triples:3030/ds/query"
        );

        config.set("endpoints.timeout_secs", "60").expect("set");
        assert_eq!(config.get("endpoints.timeout_secs").expect("get"), "60");

        config
            .set("listing.path_prefixes", "http://a=/cluster, http://b=/c")
            .expect("set");
        assert_eq!(config.listing.path_prefixes.len(), 2);
        assert_eq!(config.listing.path_prefixes[1].path, "/c");
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();

        assert!(config.set("endpoints.timeout_secs", "0").is_err());
        assert!(config.set("endpoints.timeout_secs", "soon").is_err());
        assert!(config.set("endpoints.store_url", "  ").is_err());
        assert!(config.set("listing.page_size", "0").is_err());
        assert!(config.set("listing.path_prefixes", "no-separator").is_err());
        assert!(config.set("nope.unknown", "x").is_err());
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        let listed = config.list().expect("list");

        assert_eq!(listed.len(), 6);
        assert!(listed.iter().any(|(k, _)| k == "cache.overlay_path"));
        assert!(
            listed
                .iter()
                .any(|(k, v)| k == "listing.path_prefixes" && v.contains("http://www.isi.edu/gaia=/cluster"))
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.endpoints.store_url = "http://store:3030/q".to_string();
        config.listing.page_size = 25;
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.endpoints.store_url, "http://store:3030/q");
        assert_eq!(loaded.listing.page_size, 25);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = Config::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.endpoints.timeout_secs, 30);
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.endpoints.store_url = String::new();
        // Bypass save_to's validation by writing the TOML directly
        std::fs::write(&path, toml::to_string_pretty(&config).expect("toml")).expect("write");

        assert!(Config::load_from(&path).is_err());
    }
}
