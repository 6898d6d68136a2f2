//! CLI definitions for the nexustodo server.

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// NexusTodo to-do list server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config and DATABASE_PATH)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long, global = true)]
    pub host: Option<IpAddr>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Shared bearer secret (overrides config and DEFAULT_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Open the database, apply migrations, and exit
    Migrate,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut crate::config::Config) {
        if let Some(db_path) = &self.database {
            config.server.db_path = db_path.clone();
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(token) = &self.token {
            config.server.auth_token = token.clone();
        }
    }
}
