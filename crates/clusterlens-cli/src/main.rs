//! Clusterlens CLI - terminal browser for coreference clusters

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clusterlens_core::cache::CacheOverlay;
use clusterlens_core::config::Config;
use clusterlens_core::gateway::{Bindings, QueryGateway, SparqlClient};
use clusterlens_core::graph::ClusterGraph;
use clusterlens_core::listing::{ClusterKind, SortMode};
use clusterlens_core::model::{Cluster, Resolution, SuperEdge};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "clusterlens")]
#[command(author, version, about = "Browse coreference clusters in a semantic triple store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a cluster: label, type, size, targets and members
    Show {
        /// Cluster URI
        uri: String,
    },

    /// List relation edges touching a cluster
    Edges {
        /// Cluster URI
        uri: String,
    },

    /// Expand a cluster's bounded-hop neighborhood
    Neighborhood {
        /// Cluster URI
        uri: String,
        /// Number of hops to expand
        #[arg(long, default_value_t = 1)]
        hop: u32,
    },

    /// List clusters of a kind
    List {
        /// Cluster kind (entity, event or relation)
        #[arg(value_parser = parse_kind)]
        kind: ClusterKind,
        /// Sort order (size or type)
        #[arg(short, long, default_value = "size", value_parser = parse_sort)]
        sort: SortMode,
        /// Maximum number of rows (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Number of rows to skip
        #[arg(short, long)]
        offset: Option<usize>,
    },

    /// Resolve a link target against the knowledge base
    Resolve {
        /// Raw link target, e.g. LDC2015E42:703448
        target: String,
    },

    /// Sweep the store and write the cache overlay
    BuildCache {
        /// Output path (defaults to the configured overlay path)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn parse_kind(s: &str) -> Result<ClusterKind, String> {
    ClusterKind::parse(s)
        .ok_or_else(|| format!("unknown cluster kind '{}', expected entity, event or relation", s))
}

fn parse_sort(s: &str) -> Result<SortMode, String> {
    SortMode::parse(s).ok_or_else(|| format!("unknown sort mode '{}', expected size or type", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clusterlens=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { uri } => cmd_show(&uri, cli.format).await,

        Commands::Edges { uri } => cmd_edges(&uri, cli.format).await,

        Commands::Neighborhood { uri, hop } => cmd_neighborhood(&uri, hop, cli.format).await,

        Commands::List {
            kind,
            sort,
            limit,
            offset,
        } => cmd_list(kind, sort, limit, offset, cli.format).await,

        Commands::Resolve { target } => cmd_resolve(&target, cli.format).await,

        Commands::BuildCache { out } => cmd_build_cache(out, cli.quiet).await,

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor => cmd_doctor(cli.quiet).await,
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn store_client(config: &Config) -> anyhow::Result<SparqlClient> {
    SparqlClient::builder()
        .endpoint(config.endpoints.resolved_store_url())
        .timeout_secs(config.endpoints.timeout_secs)
        .build()
        .context("Failed to build store client")
}

fn kb_client(config: &Config) -> anyhow::Result<SparqlClient> {
    SparqlClient::builder()
        .endpoint(config.endpoints.resolved_kb_url())
        .timeout_secs(config.endpoints.timeout_secs)
        .build()
        .context("Failed to build knowledge base client")
}

fn build_graph(config: &Config) -> anyhow::Result<ClusterGraph> {
    let store = store_client(config)?;
    let kb = kb_client(config)?;
    let overlay =
        CacheOverlay::load(&config.cache.overlay_path).context("Failed to load cache overlay")?;
    ClusterGraph::builder()
        .store(Arc::new(store))
        .kb(Arc::new(kb))
        .overlay(overlay)
        .path_prefixes(config.listing.path_prefixes.clone())
        .build()
        .context("Failed to wire cluster graph")
}

async fn require_cluster(graph: &ClusterGraph, uri: &str) -> anyhow::Result<Cluster> {
    graph.get(uri).await?.ok_or_else(|| {
        anyhow::anyhow!(
            "'{}' is not a known cluster. Check the URI or try `clusterlens list entity`.",
            uri
        )
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_show(uri: &str, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;
    let cluster = require_cluster(&graph, uri).await?;

    let label = cluster.label().await?;
    let category = cluster.category().await?;
    let size = cluster.size().await?;
    let targets = cluster.targets().await?;
    let qnodes = cluster.qnodes().await?;
    let qnode_urls = cluster.qnode_urls().await?;
    let members = cluster.members().await?;

    match format {
        OutputFormat::Json => {
            let mut member_values = Vec::with_capacity(members.len());
            for member in members {
                member_values.push(serde_json::json!({
                    "uri": member.uri().as_str(),
                    "label": member.label().await?,
                    "type": member.member_type().await?.map(|t| t.as_str()),
                }));
            }
            let value = serde_json::json!({
                "uri": cluster.uri().as_str(),
                "path": cluster.href(),
                "label": label,
                "type": category.as_str(),
                "size": size,
                "targets": targets,
                "qnodes": qnodes,
                "qnode_urls": qnode_urls,
                "members": member_values,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Cluster: {}", label);
            println!("  URI:  {}", cluster.uri());
            println!("  Path: {}", cluster.href());
            println!("  Type: {}", category);
            println!("  Size: {}", size);
            if !targets.is_empty() {
                println!();
                println!("Link targets:");
                for (target, n) in &targets {
                    println!("  {} (x{})", target, n);
                }
            }
            if !qnodes.is_empty() {
                println!();
                println!("Knowledge base nodes:");
                for (qid, n) in &qnodes {
                    match qnode_urls.get(qid) {
                        Some(url) => println!("  {} (x{})  {}", qid, n, url),
                        None => println!("  {} (x{})", qid, n),
                    }
                }
            }
            println!();
            println!("Members ({}):", members.len());
            for member in members {
                let type_name = member
                    .member_type()
                    .await?
                    .map(|t| t.local_name().to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!("  {} [{}]", member.label().await?, type_name);
                println!("    {}", member.uri());
            }
        }
    }
    Ok(())
}

async fn cmd_edges(uri: &str, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;
    let cluster = require_cluster(&graph, uri).await?;

    let forward = sorted_edges(cluster.forward().await?);
    let backward = sorted_edges(cluster.backward().await?);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "uri": cluster.uri().as_str(),
                "forward": edges_json(&forward),
                "backward": edges_json(&backward),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Forward edges ({}):", forward.len());
            for edge in &forward {
                println!("  {}", edge_line(edge));
            }
            println!();
            println!("Backward edges ({}):", backward.len());
            for edge in &backward {
                println!("  {}", edge_line(edge));
            }
        }
    }
    Ok(())
}

async fn cmd_neighborhood(uri: &str, hop: u32, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;
    let cluster = require_cluster(&graph, uri).await?;

    let hood = cluster.neighborhood(hop).await?;
    let edges = sorted_edges(&hood);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "uri": cluster.uri().as_str(),
                "hop": hop,
                "edges": edges_json(&edges),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Neighborhood of {} (hop {}):", cluster.uri(), hop);
            if edges.is_empty() {
                println!("  No edges.");
            }
            for edge in &edges {
                println!("  {}", edge_line(edge));
            }
        }
    }
    Ok(())
}

async fn cmd_list(
    kind: ClusterKind,
    sort: SortMode,
    limit: Option<usize>,
    offset: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;
    let limit = limit.or(Some(config.listing.page_size));

    let summaries = graph.list(kind, sort, limit, offset).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No {} clusters found.", kind);
                return Ok(());
            }
            println!("{} {} clusters:", summaries.len(), kind);
            for summary in &summaries {
                println!("  {:>6}  {}  {}", summary.count, summary.label, summary.path);
            }
        }
    }
    Ok(())
}

async fn cmd_resolve(target: &str, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;

    match graph.resolve_target(target).await? {
        Resolution::Present(node) => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&node)?),
            OutputFormat::Text => {
                println!("{}  {}", node.id, node.label);
                println!("  URL: {}", node.uri);
                if !node.aliases.is_empty() {
                    println!("  Aliases: {}", node.aliases.join(", "));
                }
            }
        },
        Resolution::Absent | Resolution::Unresolved => match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "target": target,
                        "node": null,
                    }))?
                );
            }
            OutputFormat::Text => println!("No knowledge base node for '{}'.", target),
        },
    }
    Ok(())
}

async fn cmd_build_cache(out: Option<PathBuf>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let graph = build_graph(&config)?;
    let out = out.unwrap_or_else(|| config.cache.overlay_path.clone());

    info!("Starting cache sweep...");
    if !quiet {
        println!("Sweeping cluster store...");
    }
    let cached = graph.build_cache(&out).await?;
    if !quiet {
        println!("Cache overlay written: {} ({} clusters)", out.display(), cached);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Clusterlens Health Check");
        println!("========================");
        println!();
    }

    let mut all_ok = true;

    match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }

            match Config::config_path() {
                Ok(path) if path.exists() => {
                    if !quiet {
                        println!("[OK] Config file: {}", path.display());
                    }
                }
                Ok(path) => {
                    if !quiet {
                        println!("[--] Config file: {} (using defaults)", path.display());
                    }
                }
                Err(e) => {
                    if !quiet {
                        println!("[!!] Config file: Error - {}", e);
                    }
                }
            }

            match CacheOverlay::load(&config.cache.overlay_path) {
                Ok(overlay) if overlay.is_empty() => {
                    if !quiet {
                        println!(
                            "[--] Cache overlay: not built ({})",
                            config.cache.overlay_path.display()
                        );
                    }
                }
                Ok(overlay) => {
                    if !quiet {
                        println!(
                            "[OK] Cache overlay: {} clusters ({})",
                            overlay.len(),
                            config.cache.overlay_path.display()
                        );
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Cache overlay: Error - {}", e);
                    }
                }
            }

            let store_url = config.endpoints.resolved_store_url();
            match probe_store(&config).await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Store endpoint: {}", store_url);
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        warn!("Store endpoint not reachable");
                        println!("[!!] Store endpoint: {} - {}", store_url, e);
                    }
                }
            }

            let kb_url = config.endpoints.resolved_kb_url();
            match probe_kb(&config).await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Knowledge base endpoint: {}", kb_url);
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Knowledge base endpoint: {} - {}", kb_url, e);
                    }
                }
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

async fn probe_store(config: &Config) -> anyhow::Result<()> {
    let client = store_client(config)?;
    client.ask("ASK { ?s ?p ?o }", &Bindings::new()).await?;
    Ok(())
}

async fn probe_kb(config: &Config) -> anyhow::Result<()> {
    let client = kb_client(config)?;
    client
        .select(
            "SELECT ?label WHERE { ?s rdfs:label ?label } LIMIT 1",
            &Bindings::new(),
        )
        .await?;
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

/// Sets iterate in arbitrary order; sort edges so output is stable.
fn sorted_edges(edges: &HashSet<SuperEdge>) -> Vec<SuperEdge> {
    let mut list: Vec<SuperEdge> = edges.iter().cloned().collect();
    list.sort_by(|a, b| {
        a.subject()
            .uri()
            .cmp(b.subject().uri())
            .then_with(|| a.predicate().cmp(b.predicate()))
            .then_with(|| a.object().uri().cmp(b.object().uri()))
    });
    list
}

fn edge_line(edge: &SuperEdge) -> String {
    format!(
        "{} -[{}]-> {} (weight {})",
        edge.subject().uri(),
        edge.predicate().local_name(),
        edge.object().uri(),
        edge.count()
    )
}

fn edges_json(edges: &[SuperEdge]) -> Vec<serde_json::Value> {
    edges
        .iter()
        .map(|edge| {
            serde_json::json!({
                "subject": edge.subject().uri().as_str(),
                "predicate": edge.predicate().as_str(),
                "object": edge.object().uri().as_str(),
                "weight": edge.count(),
            })
        })
        .collect()
}

// ========== Tests ==========
