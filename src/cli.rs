use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "syncop")]
#[command(about = "Syncop - Cluster operator for a file-sync web application")]
pub struct Cli {
    /// Config file path (defaults to syncop.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the unit's persisted state
    #[arg(long, default_value = "/var/lib/syncop")]
    pub state_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process one lifecycle event delivered by the substrate
    Hook {
        /// Event name, e.g. install, config-changed, database-master-changed
        name: String,

        /// Event payload as JSON, for events that carry one
        #[arg(long)]
        params: Option<String>,
    },
    /// Run an operator action
    #[command(subcommand)]
    Action(ActionCommands),
    /// Show the unit's projected status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration without processing any event
    Validate,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ActionCommands {
    /// Set the operator-chosen trusted domain (index 1) cluster-wide
    SetTrustedDomain {
        /// Domain to trust, e.g. files.example.org
        domain: String,
    },
    /// Add database indices the application reports as missing
    AddMissingIndices,
    /// Convert the filecache table to big-int encoding (enters maintenance)
    ConvertFilecacheEncoding,
    /// Enable or disable maintenance mode
    Maintenance {
        /// Enable instead of disable
        #[arg(long)]
        enable: bool,
    },
}
