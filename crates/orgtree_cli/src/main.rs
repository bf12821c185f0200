//! CLI entry point for the orgtree registry.
//!
//! # Responsibility
//! - Drive `orgtree_core` services against one SQLite file.
//! - Drain published batches after each command so the file reflects them.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use orgtree_core::db::open_db;
use orgtree_core::{
    channel_queue, init_from_config, BatchPersister, CreateEntityRequest, EntityId, EntityPatch,
    EntitySearchCriteria, EntityService, EntityServiceError, RegistryConfig,
    SqliteEntityRepository, UpdateEntityRequest,
};
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "orgtree.db";

#[derive(Parser, Debug)]
#[command(author, version, about = "orgtree: department entity registry", long_about = None)]
struct Cli {
    /// TOML config file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "orgtree.toml")]
    config: PathBuf,

    /// SQLite database file. Overrides `database_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User uuid recorded in audit fields.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a department entity.
    Create(CreateArgs),
    /// Update fields and the declared child list of an entity.
    Update(UpdateArgs),
    /// Print the ancestor chain of an entity.
    ShowAncestry {
        id: EntityId,
    },
    /// Search entities within a tenant.
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    tenant: String,
    #[arg(long)]
    department: String,
    #[arg(long)]
    code: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 0)]
    level: i32,
    /// Child entity id. Repeat for several children.
    #[arg(long = "child")]
    children: Vec<EntityId>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: EntityId,
    #[arg(long)]
    tenant: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    code: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    level: Option<i32>,
    /// Full declared child list. Omit to leave relationships untouched.
    #[arg(long = "child")]
    children: Vec<EntityId>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    tenant: String,
    #[arg(long = "id")]
    ids: Vec<EntityId>,
    #[arg(long)]
    code: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    level: Option<i32>,
    /// Expand every hit into its ancestor chain.
    #[arg(long)]
    ancestry: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RegistryConfig::load(&cli.config)?;
    init_from_config(&config.logging).context("failed to start logging")?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let (queue, receiver) = channel_queue();
    let service = EntityService::new(
        SqliteEntityRepository::try_new(&conn)?,
        queue,
        config.max_hierarchy_depth,
    );

    let user = cli.user;
    let output = match cli.command {
        Commands::Create(args) => to_json(service.create_entity(CreateEntityRequest {
            tenant_id: args.tenant,
            department_id: args.department,
            code: args.code,
            name: args.name,
            hierarchy_level: args.level,
            children: args.children,
            requested_by: user,
        })),
        Commands::Update(args) => to_json(service.update_entity(UpdateEntityRequest {
            id: args.id,
            patch: EntityPatch {
                tenant_id: args.tenant,
                department_id: args.department,
                code: args.code,
                name: args.name,
                hierarchy_level: args.level,
            },
            children: Some(args.children),
            requested_by: user,
        })),
        Commands::ShowAncestry { id } => to_json(service.ancestry_for(id)),
        Commands::Search(args) => to_json(service.search(&EntitySearchCriteria {
            tenant_id: args.tenant,
            ids: args.ids,
            code: args.code,
            name: args.name,
            department_id: args.department,
            hierarchy_level: args.level,
            get_ancestry: args.ancestry,
        })),
    }?;

    let report = BatchPersister::new(service.repository()).drain(&receiver);
    if report.failed > 0 {
        eprintln!("warning: {} published batch(es) failed to persist", report.failed);
    }

    println!("{output}");
    Ok(())
}

fn to_json<T: Serialize>(result: Result<T, EntityServiceError>) -> Result<String> {
    let value = result.map_err(|err| anyhow!("{}: {err}", err.code()))?;
    Ok(serde_json::to_string_pretty(&value)?)
}
