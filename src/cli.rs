//! CLI struct definitions for the kips command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::plugins::entities::EntityKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "kips",
    version = env!("CARGO_PKG_VERSION"),
    about = "Personal data storage for models and agents."
)]
pub(crate) struct Cli {
    /// Database file. Overrides KIPS_DB and the config file.
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Import a file as a note, a conversation, credentials or tasks
    Import(ImportCli),
    /// Serve the agent protocol (JSON-RPC 2.0) on stdin/stdout
    Serve,
    /// Show the resolved configuration
    Config,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ImportCli {
    /// The file to import
    #[clap(value_name = "FILE")]
    pub file: PathBuf,
    /// The type of data to import
    #[clap(short = 't', long = "type", value_enum)]
    pub kind: EntityKind,
    /// Space-separated tag names to attach (ignored for auth)
    #[clap(long, default_value = "")]
    pub tags: String,
}
