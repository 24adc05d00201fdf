use super::{WakeLock, WakeLockError, WakeLockKind, WakeLockProvider};
use crate::common::RELEASE_POLL;
use crate::core::cmd::{run_checked, run_cmd_timeout_async};
use futures::future::BoxFuture;
use std::time::Duration;

const DUMPSYS: &str = "/system/bin/dumpsys";
const SVC: &str = "/system/bin/svc";
const CMD_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PowerSnapshot {
    pub screen_awake: bool,
    pub stay_on: bool,
    pub is_plugged_in: bool,
}

impl PowerSnapshot {
    pub async fn fetch() -> anyhow::Result<Self> {
        let out = run_cmd_timeout_async(DUMPSYS, &["power"], CMD_TIMEOUT).await?;
        Ok(Self::parse(&String::from_utf8_lossy(&out.stdout)))
    }

    pub fn parse(s: &str) -> Self {
        let mut ps = Self::default();

        if s.contains("mWakefulness=Awake")
            || s.contains("mInteractive=true")
            || s.contains("mScreenOn=true")
        {
            ps.screen_awake = true;
        }

        if s.contains("mStayOn=true") {
            ps.stay_on = true;
        }

        if s.contains("mIsPowered=true")
            || (s.contains("Plug Type:") && !s.contains("Plug Type: NONE"))
        {
            ps.is_plugged_in = true;
        }

        ps
    }

    /// Whether a `svc power stayon` lock is still keeping the screen up.
    pub fn holds_screen(&self) -> bool {
        self.stay_on && self.screen_awake
    }
}

/// Screen wake lock backed by the power service's stay-on setting.
///
/// The framework clears `mStayOn` whenever the device leaves the plugged
/// state the setting covers, and the screen can still be turned off by the
/// user; both are reported as a release.
#[derive(Debug, Clone)]
pub struct PowerServiceLock {
    poll: Duration,
}

impl PowerServiceLock {
    pub fn new() -> Self {
        Self { poll: RELEASE_POLL }
    }
}

impl Default for PowerServiceLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLockProvider for PowerServiceLock {
    fn request(&self, kind: WakeLockKind) -> BoxFuture<'static, Result<WakeLock, WakeLockError>> {
        let poll = self.poll;
        Box::pin(async move {
            let WakeLockKind::Screen = kind;
            run_checked(SVC, &["power", "stayon", "true"], CMD_TIMEOUT)
                .await
                .map_err(|e| WakeLockError::Request(format!("{e:#}")))?;

            let snapshot = PowerSnapshot::fetch()
                .await
                .map_err(|e| WakeLockError::Request(format!("{e:#}")))?;
            if !snapshot.holds_screen() {
                return Err(WakeLockError::Rejected(format!(
                    "stay_on={} screen_awake={} plugged={}",
                    snapshot.stay_on, snapshot.screen_awake, snapshot.is_plugged_in
                )));
            }

            Ok(WakeLock::new("svc-stayon", Box::pin(watch_release(poll))))
        })
    }

    fn release(&self, lock: WakeLock) -> BoxFuture<'static, Result<(), WakeLockError>> {
        drop(lock);
        Box::pin(async {
            run_checked(SVC, &["power", "stayon", "false"], CMD_TIMEOUT)
                .await
                .map(|_| ())
                .map_err(|e| WakeLockError::Release(format!("{e:#}")))
        })
    }
}

async fn watch_release(poll: Duration) {
    loop {
        tokio::time::sleep(poll).await;
        match PowerSnapshot::fetch().await {
            Ok(s) if !s.holds_screen() => {
                tracing::debug!(target: "wakewatch::wake", "Power state lost lock: {:?}", s);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(target: "wakewatch::wake", "dumpsys power failed: {:?}", e);
            }
        }
    }
}
