use crate::common::{DISPLAY_REFRESH, ReacquirePolicy};
use crate::core::alert::{self, AlertCue};
use crate::core::display::{DisplaySink, LogSink, StatusFile};
use crate::core::location::{DumpsysLocation, LocationPoller, LocationProvider};
use crate::core::wakelock::{PowerServiceLock, WakeLockManager, WakeLockProvider};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

pub use crate::daemon::config::DaemonConfig;

pub type ReloadHandle =
    tracing_subscriber::reload::Handle<tracing_subscriber::EnvFilter, tracing_subscriber::Registry>;

/// Requests delivered to the daemon loop from outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Ask for the wake lock again (SIGUSR1, `wakewatchctl reacquire`).
    Reacquire,
    /// `settings.toml` changed on disk.
    ReloadSettings,
}

pub struct Daemon {
    pub(crate) cfg: DaemonConfig,
    pub(crate) wake: WakeLockManager,
    pub(crate) gps: LocationPoller,
    pub(crate) sink: Box<dyn DisplaySink>,
    pub(crate) reacquire: ReacquirePolicy,
    pub(crate) filter_handle: Option<ReloadHandle>,
    pub(crate) last_error: Option<(String, Instant)>,
}

impl Daemon {
    pub fn new(
        cfg: DaemonConfig,
        wake_provider: Arc<dyn WakeLockProvider>,
        location_provider: Arc<dyn LocationProvider>,
        cue: Box<dyn AlertCue>,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        let reacquire = cfg.settings.wake_lock.reacquire;
        let gps = LocationPoller::new(location_provider, cfg.settings.location.fix_log_capacity);
        debug!(target: "wakewatch::daemon", "Reacquire policy: {}", reacquire);

        Self {
            cfg,
            wake: WakeLockManager::new(wake_provider, cue),
            gps,
            sink,
            reacquire,
            filter_handle: None,
            last_error: None,
        }
    }

    pub fn with_filter_handle(mut self, handle: ReloadHandle) -> Self {
        self.filter_handle = Some(handle);
        self
    }

    pub fn wake(&self) -> &WakeLockManager {
        &self.wake
    }

    pub fn gps(&self) -> &LocationPoller {
        &self.gps
    }

    pub fn reacquire_policy(&self) -> ReacquirePolicy {
        self.reacquire
    }

    /// Kick off both subsystems. They run independently until shutdown.
    pub fn start(&mut self) {
        self.wake.acquire();
        self.gps.start();
        self.sink.set("daemon.pid", std::process::id().to_string());
        self.refresh_wake_display();
        self.refresh_gps_display();
        self.flush_display();
    }

    /// Drive the daemon until `shutdown` completes, then give the wake lock
    /// back and write a final snapshot.
    pub async fn run<F>(&mut self, mut control_rx: mpsc::Receiver<Control>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut wake_refresh = time::interval(DISPLAY_REFRESH);
        let mut gps_refresh = time::interval(DISPLAY_REFRESH);

        debug!(target: "wakewatch::daemon", "Event loop started (display every {}ms)", DISPLAY_REFRESH.as_millis());

        loop {
            tokio::select! {
                resolved = self.gps.step() => {
                    if let Some((token, classification)) = resolved {
                        self.on_classified(token, classification);
                    }
                }
                transition = self.wake.step() => {
                    self.on_wake_transition(transition);
                }
                _ = wake_refresh.tick() => {
                    self.refresh_wake_display();
                    self.flush_display();
                }
                _ = gps_refresh.tick() => {
                    self.refresh_gps_display();
                    self.flush_display();
                }
                Some(control) = control_rx.recv() => {
                    self.on_control(control);
                }
                () = &mut shutdown => {
                    info!(target: "wakewatch::daemon", "Shutdown signal received");
                    break;
                }
            }
        }

        self.wake.release().await;
        self.refresh_wake_display();
        self.refresh_gps_display();
        self.flush_display();
        info!(target: "wakewatch::daemon", "Daemon stopped");
    }
}

pub async fn run_with_config(cfg: &DaemonConfig, filter_handle: ReloadHandle) -> Result<()> {
    let sink = open_sink(&cfg.settings.display.status_file);
    let cue = alert::from_command(&cfg.settings.alert.command);

    let mut daemon = Daemon::new(
        cfg.clone(),
        Arc::new(PowerServiceLock::new()),
        Arc::new(DumpsysLocation::new()),
        cue,
        sink,
    )
    .with_filter_handle(filter_handle);

    let (control_tx, control_rx) = mpsc::channel::<Control>(10);
    forward_reacquire_signal(control_tx.clone())?;
    crate::daemon::watcher::start_settings_watcher(cfg.settings_path.clone(), control_tx);

    daemon.start();
    daemon.run(control_rx, shutdown_signal()).await;
    Ok(())
}

fn open_sink(path: &std::path::Path) -> Box<dyn DisplaySink> {
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(target: "wakewatch::display", "Cannot create {} ({}), logging status instead", parent.display(), e);
        return Box::new(LogSink::default());
    }
    debug!(target: "wakewatch::display", "Status file: {}", path.display());
    Box::new(StatusFile::new(path))
}

#[cfg(unix)]
fn forward_reacquire_signal(tx: mpsc::Sender<Control>) -> Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            debug!(target: "wakewatch::daemon", "SIGUSR1 received");
            if tx.send(Control::Reacquire).await.is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn forward_reacquire_signal(_tx: mpsc::Sender<Control>) -> Result<()> {
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    r = tokio::signal::ctrl_c() => {
                        if let Err(e) = r {
                            error!(target: "wakewatch::daemon", "Failed to listen for ctrl-c: {e}");
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => error!(target: "wakewatch::daemon", "Failed to install SIGTERM handler: {e}"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "wakewatch::daemon", "Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
