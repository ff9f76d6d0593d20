use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plexus_core::{uid_string, TopologySnapshot, WatchEvent};
use plexus_graph::derive::derive_all;
use plexus_graph::{LinkSet, ResourceStore};
use plexus_sync::{BulkLoader, BulkSnapshot, CancelHandle, EventStream, SyncError, SyncResult, WatchSource};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "plexctl", version, about = "Plexus graph engine CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded bulk snapshot plus event stream and print the graph
    Replay {
        /// Bulk snapshot file ({"resources": [...], "links": [...]})
        #[arg(long = "bulk")]
        bulk: PathBuf,
        /// Event stream file (array of {"type": ..., "resource": ...})
        #[arg(long = "events")]
        events: PathBuf,
    },
    /// Run a full link derivation over a bulk snapshot's resources
    Derive {
        /// Bulk snapshot file; its own links are ignored
        #[arg(long = "bulk")]
        bulk: PathBuf,
    },
}

fn init_tracing() {
    let env = std::env::var("PLEXUS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("PLEXUS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid PLEXUS_METRICS_ADDR; expected host:port");
        }
    }
}

/// Bulk loader backed by a JSON file.
struct FileLoader {
    path: PathBuf,
}

#[async_trait::async_trait]
impl BulkLoader for FileLoader {
    async fn load(&self) -> SyncResult<BulkSnapshot> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| SyncError::BulkLoad(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::BulkLoad(format!("{}: {}", self.path.display(), e)))
    }
}

/// Watch source replaying a recorded JSON event array. Entries that fail to
/// decode (unknown type, missing id) are dropped with a warning, matching
/// live-stream behavior.
struct FileWatchSource {
    path: PathBuf,
}

#[async_trait::async_trait]
impl WatchSource for FileWatchSource {
    async fn subscribe(&self) -> SyncResult<EventStream> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| SyncError::Subscribe(format!("{}: {}", self.path.display(), e)))?;
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Subscribe(format!("{}: {}", self.path.display(), e)))?;
        let (tx, rx) = plexus_sync::event_channel();
        let task = tokio::spawn(async move {
            let mut sent = 0usize;
            let mut dropped = 0usize;
            for entry in entries {
                match serde_json::from_value::<WatchEvent>(entry) {
                    Ok(ev) => {
                        if tx.send(ev).await.is_err() {
                            break;
                        }
                        sent += 1;
                    }
                    Err(e) => {
                        dropped += 1;
                        warn!(error = %e, "skipping malformed event");
                    }
                }
            }
            info!(sent, dropped, "replay stream done");
        });
        Ok(EventStream { rx, cancel: CancelHandle::new(Some(task)) })
    }
}

fn print_snapshot(snap: &TopologySnapshot, output: Output) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(snap)?),
        Output::Human => {
            println!("resources ({}):", snap.resources.len());
            for r in &snap.resources {
                let scope = match r.namespace.as_deref() {
                    Some(ns) => format!("{}/{}", ns, r.name),
                    None => r.name.clone(),
                };
                println!("  {} • {} • {:?} • {}", r.kind, scope, r.health, uid_string(&r.uid));
            }
            println!("links ({}):", snap.links.len());
            for l in &snap.links {
                println!(
                    "  {} -> {} • {:?}",
                    uid_string(&l.source),
                    uid_string(&l.target),
                    l.link_type
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { bulk, events } => {
            let loader = FileLoader { path: bulk };
            let source = FileWatchSource { path: events };
            let mut session = plexus_sync::connect(&loader, &source)
                .await
                .context("connecting replay session")?;
            session.closed().await;
            let snap = session.snapshot();
            print_snapshot(&snap, cli.output)?;
            session.disconnect();
        }
        Commands::Derive { bulk } => {
            let loader = FileLoader { path: bulk };
            let snapshot = loader.load().await.context("loading bulk snapshot")?;
            let mut store = ResourceStore::new();
            store.load(snapshot.resources);
            let links = derive_all(&store);
            info!(resources = store.len(), links = links.len(), "full derivation done");
            let mut set = LinkSet::new();
            set.load(links);
            let snap = TopologySnapshot {
                epoch: 0,
                resources: store.all().cloned().collect(),
                links: set.sorted(),
            };
            print_snapshot(&snap, cli.output)?;
        }
    }
    Ok(())
}
