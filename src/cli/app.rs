use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wakewatchctl")]
#[command(version, about = "wakewatch daemon control CLI")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Status file written by the daemon
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the wake-lock and GPS panels
    Status,

    /// Ask the daemon to take the wake lock again
    Reacquire,

    /// Open the platform's maps application
    OpenMaps {
        /// Pick the platform from a browser user agent instead of the build target
        #[arg(long)]
        user_agent: Option<String>,
    },
}
