//! # EDG CLI Module
//!
//! This module implements the CLI interface for the gateway.
//!
//! ## Available Commands
//!
//! - `server` - Start the gateway (HTTP bridge + bus + core)
//! - `status` - Show registry counts
//! - `templates` - Load and list template definitions
//! - `assets` - List registered assets
//! - `relations` - List relations of one asset
//! - `compact` - Compact the metadata database

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use edg_core::EdgError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// EDG - industrial edge gateway core
///
/// Registers assets, validates readings against templates and relays
/// them to downstream consumers.
#[derive(Parser, Debug)]
#[command(name = "edg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./edg.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the metadata database (overrides config and EDG_DATABASE)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Template definition directory
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Do not republish readings on platform.data.validated
        #[arg(long)]
        no_forward: bool,
    },

    /// Show registry counts
    Status,

    /// Load and list template definitions
    Templates {
        /// Template definition directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List registered assets, newest first
    Assets,

    /// List relations of one asset
    Relations {
        /// Asset id
        #[arg(short, long)]
        asset: String,

        /// outgoing, incoming or both
        #[arg(short, long, default_value = "both")]
        direction: String,

        /// Only relations of this type (partOf, connectedTo, locatedIn)
        #[arg(short = 't', long)]
        relation_type: Option<String>,
    },

    /// Compact the metadata database file
    Compact,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EdgError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database = database;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server {
            host,
            port,
            templates,
            no_forward,
        }) => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(templates) = templates {
                config.templates.directory = templates;
            }
            if no_forward {
                config.gateway.forward = false;
            }
            config.validate()?;
            cmd_server(&config).await
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Templates { dir }) => {
            let dir = dir.unwrap_or_else(|| config.templates.directory.clone());
            cmd_templates(&dir, json_mode)
        }
        Some(Commands::Assets) => cmd_assets(&config, json_mode),
        Some(Commands::Relations {
            asset,
            direction,
            relation_type,
        }) => cmd_relations(&config, json_mode, asset, direction, relation_type),
        Some(Commands::Compact) => cmd_compact(&config),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
