use super::{app::*, output};
use crate::core::cmd::run_checked;
use crate::core::config;
use crate::core::display::read_status;
use crate::core::launcher::{self, Platform};
use crate::{Context, Result};
use anyhow::bail;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SIGNAL_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status => {
            let path = status_path(cli.file)?;
            handle_status(&path);
        }

        Commands::Reacquire => {
            let path = status_path(cli.file)?;
            let pid = daemon_pid(&read_status(&path)?)?;
            let pid_arg = pid.to_string();
            run_checked("kill", &["-USR1", pid_arg.as_str()], SIGNAL_TIMEOUT)
                .await
                .with_context(|| format!("Failed to signal daemon (pid {})", pid))?;
            output::print_success(&format!("Reacquire requested (pid {})", pid));
        }

        Commands::OpenMaps { user_agent } => {
            let platform = user_agent
                .as_deref()
                .map(Platform::from_user_agent)
                .unwrap_or_else(Platform::current);
            tracing::debug!(target: "wakewatch::ctl", "Opening maps for {:?}", platform);
            launcher::launch_maps(platform).await?;
            output::print_success(&format!("Opened {}", platform.maps_target()));
        }
    }

    Ok(())
}

fn status_path(file: Option<PathBuf>) -> Result<PathBuf> {
    match file {
        Some(p) => Ok(p),
        None => Ok(config::load()?.display.status_file),
    }
}

fn handle_status(path: &Path) {
    match read_status(path) {
        Ok(values) if daemon_pid(&values).is_ok_and(is_alive) => output::print_status(&values),
        Ok(values) => {
            output::print_daemon_stopped();
            output::print_status(&values);
        }
        Err(e) => {
            output::print_daemon_stopped();
            output::print_error(&format!("{e:#}"));
        }
    }
}

fn daemon_pid(values: &BTreeMap<String, String>) -> Result<u32> {
    let Some(raw) = values.get("daemon.pid") else {
        bail!("Daemon is not running (no pid in status file)");
    };
    raw.parse()
        .with_context(|| format!("Invalid daemon.pid {:?}", raw))
}

fn is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
