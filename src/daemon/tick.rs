use crate::common::ReacquirePolicy;
use crate::core::config::Settings;
use crate::core::location::{Classification, InterruptCause, TickToken};
use crate::core::wakelock::WakeTransition;
use crate::daemon::run::{Control, Daemon};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

impl Daemon {
    pub(crate) fn on_classified(&mut self, token: TickToken, classification: Classification) {
        let state = self.gps.state();
        match classification {
            Classification::Fix => {
                debug!(target: "wakewatch::gps", "Tick {} fix (fixes={})", token, state.fix_count);
            }
            Classification::Interrupt(InterruptCause::Timeout) => {
                info!(target: "wakewatch::gps", "Tick {} timed out (interrupts={})", token, state.interrupt_count);
            }
            Classification::Interrupt(InterruptCause::Provider) => {
                info!(target: "wakewatch::gps", "Tick {} provider failed (interrupts={})", token, state.interrupt_count);
            }
        }
    }

    pub(crate) fn on_wake_transition(&mut self, transition: WakeTransition) {
        match transition {
            WakeTransition::Released if self.reacquire == ReacquirePolicy::Automatic => {
                debug!(target: "wakewatch::wake", "Reacquiring automatically");
                self.wake.acquire();
            }
            WakeTransition::Released => {
                info!(target: "wakewatch::wake", "Waiting for a manual reacquire");
            }
            WakeTransition::Acquired | WakeTransition::AcquireFailed => {}
        }
    }

    pub(crate) fn on_control(&mut self, control: Control) {
        match control {
            Control::Reacquire => {
                info!(target: "wakewatch::wake", "Reacquire requested");
                self.wake.acquire();
            }
            Control::ReloadSettings => self.reload_settings(),
        }
    }

    pub(crate) fn refresh_wake_display(&mut self) {
        self.wake.refresh_display(self.sink.as_mut());
    }

    pub(crate) fn refresh_gps_display(&mut self) {
        self.gps.refresh_display(self.sink.as_mut());
    }

    pub(crate) fn flush_display(&mut self) {
        let Err(e) = self.sink.flush() else {
            return;
        };
        let err_msg = format!("{e:#}");
        let now = Instant::now();
        let debounce = Duration::from_millis(self.cfg.error_debounce_ms);

        let should_log = match &self.last_error {
            None => true,
            Some((last_msg, last_time)) => {
                err_msg != *last_msg || now.saturating_duration_since(*last_time) >= debounce
            }
        };

        if should_log {
            error!(target: "wakewatch::display", "Display flush failed: {}", err_msg);
            self.last_error = Some((err_msg, now));
        } else {
            debug!(target: "wakewatch::display", "Display flush failed (suppressed): {}", err_msg);
        }
    }

    /// Re-read `settings.toml` and apply what can change at runtime.
    ///
    /// Only `daemon.log_level` and `wake_lock.reacquire` are live; the rest
    /// takes effect on the next start.
    pub(crate) fn reload_settings(&mut self) {
        let new_settings = match Settings::load_or_default(&self.cfg.settings_path) {
            Ok(s) => s,
            Err(e) => {
                error!(target: "wakewatch::daemon", "Failed to reload settings: {:?}", e);
                return;
            }
        };

        if self.cfg.settings.daemon.log_level != new_settings.daemon.log_level {
            let level = new_settings.daemon.log_level;
            if let Some(handle) = &self.filter_handle {
                match handle.reload(EnvFilter::new(level.as_filter())) {
                    Ok(()) => info!(target: "wakewatch::daemon", "Log level changed to {}", level),
                    Err(e) => error!(target: "wakewatch::daemon", "Failed to change log level: {}", e),
                }
            }
        }

        if self.reacquire != new_settings.wake_lock.reacquire {
            info!(
                target: "wakewatch::daemon",
                "Settings reloaded. Reacquire policy: {} -> {}",
                self.reacquire,
                new_settings.wake_lock.reacquire
            );
            self.reacquire = new_settings.wake_lock.reacquire;
        }

        if self.cfg.settings.location != new_settings.location
            || self.cfg.settings.alert != new_settings.alert
            || self.cfg.settings.display != new_settings.display
        {
            warn!(target: "wakewatch::daemon", "Location, alert and display settings apply after restart");
        }
        self.cfg.settings = new_settings;
    }
}
