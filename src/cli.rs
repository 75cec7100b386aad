use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hmwsm", about = "A supervisor for dedicated game servers", version)]
pub struct Cli {
    #[arg(long, hide = true)]
    pub daemon: bool,

    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a server. Unnamed servers are called "Server N"
    Add {
        name: Option<String>,
        /// Path to the server executable
        #[arg(long)]
        exe: Option<PathBuf>,
        /// Path to the server config file
        #[arg(long)]
        cfg: Option<PathBuf>,
        #[arg(long)]
        port: Option<String>,
        /// Restart the server automatically after a crash
        #[arg(long)]
        auto_restart: bool,
    },
    /// Change the configuration of a server
    Set {
        name: String,
        #[arg(long)]
        exe: Option<PathBuf>,
        #[arg(long)]
        cfg: Option<PathBuf>,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        auto_restart: Option<bool>,
    },
    /// Rename a server
    Rename { name: String, new_name: String },
    /// Stop and remove a server
    #[command(visible_alias = "rm")]
    Remove { name: String },
    /// Start a server
    Start { name: String },
    /// Stop a server and turn off its auto-restart
    Stop { name: String },
    /// Restart every server
    RestartAll,
    /// Write a server's recent log lines to a file
    Export {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Send an RCON command to a server
    Rcon {
        name: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List all servers
    #[command(visible_alias = "ls")]
    List,
    /// Show detailed info about a server
    Info { name: String },
    /// View a server's log
    Log {
        name: String,
        #[arg(long, default_value_t = 15)]
        lines: usize,
        #[arg(short, long)]
        follow: bool,
    },
    /// Save the server list
    Save,
    /// Shut down the daemon. Running servers keep running
    Kill,
}
