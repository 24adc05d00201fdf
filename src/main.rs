use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};
use wakewatch::daemon::{self, DaemonConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let base_filter = EnvFilter::new("info");
    let (filter_layer, filter_handle) = reload::Layer::new(base_filter);
    let timer = fmt::time::UtcTime::new(
        time::format_description::parse("[hour]:[minute]:[second]")
            .context("Invalid log time format")?,
    );

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_timer(timer)
                .with_writer(std::io::stderr),
        )
        .init();

    let cfg = DaemonConfig::load()?;
    let level = cfg.settings.daemon.log_level;
    if let Err(e) = filter_handle.reload(EnvFilter::new(level.as_filter())) {
        tracing::warn!(target: "wakewatch::daemon", "Failed to apply log level {}: {}", level, e);
    }

    tracing::info!(
        target: "wakewatch::daemon",
        "wakewatch v{} started (reacquire={}, fix log={}, status={})",
        env!("CARGO_PKG_VERSION"),
        cfg.settings.wake_lock.reacquire,
        cfg.settings.location.fix_log_capacity,
        cfg.settings.display.status_file.display()
    );

    daemon::run_with_config(&cfg, filter_handle).await
}
