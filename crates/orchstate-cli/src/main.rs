//! Orchstate operator tool.
//!
//! This is the entry point for the `orchstate` binary. It opens the `RocksDB`
//! data directory and prints query results as JSON on stdout; logs go to
//! stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use orchstate_core::Value;
use orchstate_data::entity::{self, ConfigurationModel, Resource, ResourceAction};
use orchstate_data::{DataConfig, Document, Entity, ResourceActionKind, StoredEnum};
use orchstate_store::RocksDriver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Inspect and prune orchestration state.
#[derive(Parser, Debug)]
#[command(name = "orchstate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory of the store.
    #[arg(long, env = "ORCHSTATE_DATA_DIR", default_value = "./orchstate-data")]
    data_dir: PathBuf,

    /// Number of newest versions `prune` keeps.
    #[arg(long, env = "ORCHSTATE_VERSIONS_TO_KEEP")]
    versions_to_keep: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the indexes of every entity.
    CreateIndexes,

    /// List configuration model versions, newest first.
    Versions {
        /// Environment id.
        #[arg(long)]
        env: Uuid,
        /// Number of versions to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Maximum number of versions to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List the agents referenced by one version.
    Agents {
        /// Environment id.
        #[arg(long)]
        env: Uuid,
        /// Configuration model version.
        #[arg(long)]
        version: i64,
    },

    /// List the resources that deploying a version would purge.
    PurgeCandidates {
        /// Environment id.
        #[arg(long)]
        env: Uuid,
        /// Configuration model version about to be deployed.
        #[arg(long)]
        version: i64,
    },

    /// Delete old versions and their resources.
    Prune {
        /// Environment id.
        #[arg(long)]
        env: Uuid,
    },

    /// Show the actions recorded against a resource version.
    Log {
        /// Environment id.
        #[arg(long)]
        env: Uuid,
        /// Resource version id, e.g. `std::File[agent1,path=/etc/motd],v=3`.
        #[arg(long)]
        resource: String,
        /// Only actions of this kind.
        #[arg(long, value_parser = parse_action)]
        action: Option<ResourceActionKind>,
        /// Maximum number of actions to print.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn parse_action(name: &str) -> Result<ResourceActionKind, String> {
    ResourceActionKind::from_variant(name).ok_or_else(|| {
        format!(
            "unknown action {name:?}, expected one of {}",
            ResourceActionKind::TABLE.variants.join(", ")
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orchstate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = DataConfig::default();
    if let Some(keep) = args.versions_to_keep {
        config.versions_to_keep = keep;
    }

    tracing::info!(path = %args.data_dir.display(), "Opening RocksDB store");
    let driver = RocksDriver::open(&args.data_dir)
        .with_context(|| format!("failed to open store at {}", args.data_dir.display()))?;

    match args.command {
        Command::CreateIndexes => {
            entity::create_indexes(&driver).await?;
            tracing::info!("Indexes registered");
        }
        Command::Versions { env, offset, limit } => {
            let versions =
                Document::<ConfigurationModel>::get_versions(&driver, env, offset, limit).await?;
            print_documents(&versions)?;
        }
        Command::Agents { env, version } => {
            let agents = Document::<ConfigurationModel>::get_agents(&driver, env, version).await?;
            println!("{}", serde_json::to_string_pretty(&agents)?);
        }
        Command::PurgeCandidates { env, version } => {
            let resources = Document::<Resource>::get_deleted_resources(&driver, env, version).await?;
            print_documents(&resources)?;
        }
        Command::Prune { env } => {
            let deleted =
                Document::<ConfigurationModel>::purge_versions(&driver, env, config.versions_to_keep)
                    .await?;
            println!("{}", serde_json::json!({ "deleted": deleted }));
        }
        Command::Log {
            env,
            resource,
            action,
            limit,
        } => {
            let limit = limit.unwrap_or(config.log_limit);
            let actions =
                Document::<ResourceAction>::get_log(&driver, env, &resource, action, limit).await?;
            print_documents(&actions)?;
        }
    }

    Ok(())
}

fn print_documents<E: Entity>(documents: &[Document<E>]) -> anyhow::Result<()> {
    let rendered: Vec<serde_json::Value> = documents
        .iter()
        .map(|document| Value::Map(document.to_map()).to_json())
        .collect();
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
