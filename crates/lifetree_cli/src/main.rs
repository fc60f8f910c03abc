//! LifeTree command-line entry point.
//!
//! # Responsibility
//! - Wire config, logging, database and gateway for one invocation.
//! - Print every gateway envelope as JSON on stdout.
//!
//! # Invariants
//! - Exit status is non-zero whenever the envelope reports `ok = false`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lifetree_core::db::open_db;
use lifetree_core::{
    init_from_config, CoreConfig, Gateway, GatewayResponse, SqliteTreeStore, PERSONAL_TREE_ID,
};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "lifetree", version, about = "Edit hierarchical life category trees")]
struct Cli {
    /// Tree to operate on.
    #[arg(long, global = true, default_value = PERSONAL_TREE_ID)]
    tree: String,

    /// SQLite database file; overrides LIFETREE_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owner whose trees are used; overrides LIFETREE_OWNER.
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the whole tree document.
    Show,
    /// Print every category in pre-order.
    List,
    /// Apply one JSON edit request, e.g. '{"operation":"ADD","id":"x","title":"Games"}'.
    Edit { request: String },
    /// Move a category one level up.
    Outdent { id: String },
    /// Move a category under another category.
    Indent { id: String, parent: String },
    /// Delete the stored tree; the personal tree is recreated on next access.
    Reset,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::List => "list",
            Self::Edit { .. } => "edit",
            Self::Outdent { .. } => "outdent",
            Self::Indent { .. } => "indent",
            Self::Reset => "reset",
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = CoreConfig::from_env().context("invalid LIFETREE_* environment")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(owner) = cli.owner {
        config.owner = owner;
    }
    if let Err(err) = init_from_config(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let store = SqliteTreeStore::try_new(&conn).context("tree store is not ready")?;
    let gateway = Gateway::new(store, config.owner.as_str());
    info!(
        "event=cli_command module=cli status=start tree_id={} command={}",
        cli.tree,
        cli.command.name()
    );

    match cli.command {
        Command::Show => emit(&gateway.get_tree(&cli.tree)),
        Command::List => emit(&gateway.list(&cli.tree)),
        Command::Edit { request } => emit(&gateway.patch(&cli.tree, request.as_bytes())),
        Command::Outdent { id } => emit(&gateway.outdent(&cli.tree, &id)),
        Command::Indent { id, parent } => emit(&gateway.indent(&cli.tree, &id, &parent)),
        Command::Reset => {
            let response = gateway.reset(&cli.tree);
            if response.ok {
                warn!("event=cli_reset module=cli status=ok tree_id={}", cli.tree);
            }
            emit(&response)
        }
    }
}

fn emit<T: Serialize>(response: &GatewayResponse<T>) -> Result<bool> {
    let rendered = serde_json::to_string_pretty(response).context("failed to render response")?;
    println!("{rendered}");
    Ok(response.ok)
}
