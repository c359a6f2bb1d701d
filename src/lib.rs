//! Kips: personal data storage for models and agents
//!
//! **Kips keeps notes, tasks, conversations and credentials in one local SQLite file,
//! tags them, and lets an agent read and write them over a narrow command protocol.**
//!
//! # Architecture
//!
//! ## One Store, One Connection
//!
//! - The database lives at `~/.config/kips/kips.db` (overridable, see [`core::config`])
//! - A process opens exactly one [`core::store::Store`], passes it explicitly to every
//!   component, and closes it before exiting
//! - WAL journaling and foreign keys are switched on at every open
//!
//! ## Subsystems (Plugins)
//!
//! - `entities`: typed records and CRUD for auth, tasks, notes, conversations and tags
//! - `tags`: get-or-create resolution of tag names
//! - `tabular`: CSV decoding for credential and task imports
//! - `import`: file import, one transaction per call
//! - `gateway`: resources and verb-gated SQL tools for agents
//!
//! # Examples
//!
//! ```bash
//! # Import a note with two tags
//! kips import idea.md --type note --tags "work ideas"
//!
//! # Import tasks from CSV (objective,progressAssessment,completed)
//! kips import tasks.csv --type task --tags work
//!
//! # Serve agents on stdio
//! kips serve
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: storage, schema, configuration, errors and the RPC server
//! - [`plugins`]: the tagged-entity subsystems built on top of the store

mod cli;
pub mod core;
pub mod plugins;

use anyhow::Context;
use clap::Parser;
use crate::cli::{Cli, Command};
use crate::core::{config::KipsConfig, rpc, store::Store, time};
use crate::plugins::{import, tags};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `kips=trace`).
pub const LOG_ENV_VAR: &str = "KIPS_LOG";

/// Install the stderr log subscriber. Stdout is reserved for command output and the
/// agent protocol.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(config: &KipsConfig) -> anyhow::Result<Store> {
    Store::open(&config.db_path, config.busy_timeout_ms)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = KipsConfig::load(cli.db).context("failed to resolve configuration")?;

    match cli.command {
        Command::Config => print_json(&time::command_envelope("config", "ok", &config)),
        Command::Import(args) => {
            let mut store = open_store(&config)?;
            let tag_names = tags::parse_tag_list(&args.tags);
            let imported = import::import_file(store.conn_mut(), args.kind, &args.file, &tag_names);
            let closed = store.close();

            let report =
                imported.with_context(|| format!("failed to import {}", args.file.display()))?;
            closed.context("failed to close store")?;
            print_json(&time::command_envelope("import", "ok", &report))
        }
        Command::Serve => {
            let server = rpc::RpcServer::new(open_store(&config)?);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start runtime");
            let served = match runtime {
                Ok(rt) => {
                    let served = rt.block_on(rpc::serve_stdio(&server));
                    // A pending stdin read must not hold the process open.
                    rt.shutdown_background();
                    served.context("rpc server failed")
                }
                Err(e) => Err(e),
            };
            let closed = server.into_store().close();

            served?;
            closed.context("failed to close store")
        }
    }
}
