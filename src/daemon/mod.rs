pub mod config;
pub mod run;
mod tick;
pub mod watcher;

pub use config::DaemonConfig;
pub use run::{Control, Daemon, ReloadHandle, run_with_config};
