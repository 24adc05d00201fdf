use crate::daemon::run::Control;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

fn is_settings_change(event: &Event, settings_path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == settings_path.file_name())
}

/// Watch the directory holding `settings.toml` and ask the daemon to reload
/// whenever the file is written or replaced.
///
/// The directory is watched rather than the file so editors that save by
/// rename are still seen.
pub fn start_settings_watcher(settings_path: PathBuf, tx: mpsc::Sender<Control>) {
    let Some(dir) = settings_path.parent().map(Path::to_path_buf) else {
        warn!(target: "wakewatch::daemon", "No parent directory for {}, not watching", settings_path.display());
        return;
    };

    std::thread::spawn(move || {
        let watched = settings_path.clone();
        let mut watcher = match notify::recommended_watcher(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if is_settings_change(&event, &watched) => {
                    debug!(target: "wakewatch::daemon", "Settings file changed ({:?})", event.kind);
                    let _ = tx.blocking_send(Control::ReloadSettings);
                }
                Ok(_) => {}
                Err(e) => warn!(target: "wakewatch::daemon", "Watch error: {}", e),
            },
        ) {
            Ok(w) => w,
            Err(e) => {
                error!(target: "wakewatch::daemon", "Failed to create settings watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            error!(target: "wakewatch::daemon", "Failed to watch {}: {}", dir.display(), e);
            return;
        }

        info!(target: "wakewatch::daemon", "Settings watcher started on {}", dir.display());
        loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    });
}
