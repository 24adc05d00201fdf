use super::{WakeLock, WakeLockError, WakeLockKind, WakeLockProvider};
use crate::common::WakeStatus;
use crate::core::age::Age;
use crate::core::alert::AlertCue;
use crate::core::display::DisplaySink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type Acquisition = Result<WakeLock, WakeLockError>;

/// How long shutdown waits for an outstanding acquisition.
const PENDING_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeLockState {
    pub held: bool,
    pub interrupt_count: u64,
    pub last_interrupt_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeTransition {
    Acquired,
    AcquireFailed,
    Released,
}

/// What the wake-lock panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakePanel {
    pub status: WakeStatus,
    pub interrupt_count: u64,
    pub interrupt_age: Age,
}

impl WakePanel {
    pub fn write_to(&self, sink: &mut dyn DisplaySink) {
        sink.set("wake.status", self.status.to_string());
        sink.set("wake.interrupts", self.interrupt_count.to_string());
        sink.set("wake.interrupt_age", self.interrupt_age.with_unit());
    }
}

/// Holds the screen wake lock and counts every time the platform takes it
/// away.
///
/// Unlocked -> Locked on a granted request; Locked -> Unlocked on release,
/// with the interrupt counted and the alert played. A refused request
/// leaves the manager Unlocked with status `Error`. Nothing here retries on
/// its own; the owner decides when to call [`WakeLockManager::acquire`]
/// again.
pub struct WakeLockManager {
    provider: Arc<dyn WakeLockProvider>,
    cue: Box<dyn AlertCue>,
    state: WakeLockState,
    status: WakeStatus,
    held: Option<WakeLock>,
    requesting: bool,
    tx: mpsc::UnboundedSender<Acquisition>,
    rx: mpsc::UnboundedReceiver<Acquisition>,
}

impl WakeLockManager {
    pub fn new(provider: Arc<dyn WakeLockProvider>, cue: Box<dyn AlertCue>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            cue,
            state: WakeLockState::default(),
            status: WakeStatus::default(),
            held: None,
            requesting: false,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &WakeLockState {
        &self.state
    }

    pub fn status(&self) -> WakeStatus {
        self.status
    }

    /// Ask the platform for a screen wake lock.
    ///
    /// The request runs in the background; its outcome is applied by
    /// [`WakeLockManager::step`]. No-op while a lock is held or a request is
    /// already outstanding.
    pub fn acquire(&mut self) {
        if self.held.is_some() || self.requesting {
            debug!(target: "wakewatch::wake", "Acquire skipped (held={}, requesting={})", self.held.is_some(), self.requesting);
            return;
        }
        self.requesting = true;

        let request = self.provider.request(WakeLockKind::Screen);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
        debug!(target: "wakewatch::wake", "Wake lock requested");
    }

    /// Wait for the next acquisition result or release and apply it.
    ///
    /// Cancel safe: nothing is consumed until one of the branches completes.
    pub async fn step(&mut self) -> WakeTransition {
        tokio::select! {
            Some(result) = self.rx.recv() => self.handle_acquisition(result),
            () = wait_released(&mut self.held) => {
                self.handle_release(Instant::now());
                WakeTransition::Released
            }
        }
    }

    fn handle_acquisition(&mut self, result: Acquisition) -> WakeTransition {
        self.requesting = false;
        match result {
            Ok(lock) => {
                info!(target: "wakewatch::wake", "Wake lock acquired ({})", lock.tag());
                self.held = Some(lock);
                self.state.held = true;
                self.status = WakeStatus::Active;
                WakeTransition::Acquired
            }
            Err(e) => {
                warn!(target: "wakewatch::wake", "Wake lock error: {}", e);
                self.status = WakeStatus::Error;
                WakeTransition::AcquireFailed
            }
        }
    }

    fn handle_release(&mut self, at: Instant) {
        self.held = None;
        self.state.held = false;
        self.state.interrupt_count += 1;
        self.state.last_interrupt_at = Some(at);

        self.cue.rewind();
        if let Err(e) = self.cue.play() {
            debug!(target: "wakewatch::alert", "Alert playback failed: {}", e);
        }

        self.status = WakeStatus::Reacquiring;
        warn!(target: "wakewatch::wake", "Wake lock was released (interrupt #{})", self.state.interrupt_count);
    }

    pub fn snapshot(&self, now: Instant) -> WakePanel {
        WakePanel {
            status: self.status,
            interrupt_count: self.state.interrupt_count,
            interrupt_age: Age::since(self.state.last_interrupt_at, now),
        }
    }

    pub fn refresh_display(&self, sink: &mut dyn DisplaySink) {
        self.snapshot(Instant::now()).write_to(sink);
    }

    /// Give the lock back on shutdown. Not counted as an interrupt.
    ///
    /// A request still in flight is waited on for up to [`PENDING_GRACE`]
    /// so a lock granted during shutdown is handed back too.
    pub async fn release(&mut self) {
        if self.requesting {
            match tokio::time::timeout(PENDING_GRACE, self.rx.recv()).await {
                Ok(Some(result)) => {
                    self.handle_acquisition(result);
                }
                Ok(None) => self.requesting = false,
                Err(_) => warn!(
                    target: "wakewatch::wake",
                    "Wake lock request still pending after {}ms, abandoning it",
                    PENDING_GRACE.as_millis()
                ),
            }
        }
        let Some(lock) = self.held.take() else {
            return;
        };
        self.state.held = false;
        self.status = WakeStatus::Inactive;
        match self.provider.release(lock).await {
            Ok(()) => info!(target: "wakewatch::wake", "Wake lock released on shutdown"),
            Err(e) => warn!(target: "wakewatch::wake", "Failed to release wake lock: {}", e),
        }
    }
}

async fn wait_released(held: &mut Option<WakeLock>) {
    match held {
        Some(lock) => lock.released.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{CountingCue, FakeLocks};

    fn manager(locks: &Arc<FakeLocks>, cue: &CountingCue) -> WakeLockManager {
        WakeLockManager::new(locks.clone(), Box::new(cue.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sets_active() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());
        assert!(!m.state().held);
        assert_eq!(m.status(), WakeStatus::Inactive);

        m.acquire();
        assert_eq!(m.step().await, WakeTransition::Acquired);
        assert!(m.state().held);
        assert_eq!(m.status(), WakeStatus::Active);
        assert_eq!(m.state().interrupt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_records_interrupt() {
        let locks = FakeLocks::new();
        let cue = CountingCue::default();
        let mut m = manager(&locks, &cue);

        m.acquire();
        m.step().await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let t = Instant::now();
        locks.take_away();
        assert_eq!(m.step().await, WakeTransition::Released);

        assert_eq!(m.status(), WakeStatus::Reacquiring);
        assert_eq!(m.status().as_str(), "Lost — Reacquiring…");
        assert_eq!(m.state().interrupt_count, 1);
        assert_eq!(m.state().last_interrupt_at, Some(t));
        assert!(!m.state().held);
        assert_eq!(cue.plays(), 1);
        assert_eq!(locks.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_release_counts_once() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());

        for n in 1..=4u64 {
            m.acquire();
            assert_eq!(m.step().await, WakeTransition::Acquired);
            tokio::time::advance(Duration::from_secs(5)).await;

            let t = Instant::now();
            locks.take_away();
            assert_eq!(m.step().await, WakeTransition::Released);
            assert_eq!(m.state().interrupt_count, n);
            assert_eq!(m.state().last_interrupt_at, Some(t));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_failure_sets_error_without_retry() {
        let locks = FakeLocks::refusing_first();
        let mut m = manager(&locks, &CountingCue::default());

        m.acquire();
        assert_eq!(m.step().await, WakeTransition::AcquireFailed);
        assert_eq!(m.status(), WakeStatus::Error);
        assert!(!m.state().held);

        let idle = tokio::time::timeout(Duration::from_secs(10), m.step()).await;
        assert!(idle.is_err());
        assert_eq!(locks.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_failure_is_swallowed() {
        let locks = FakeLocks::new();
        let cue = CountingCue {
            broken: true,
            ..CountingCue::default()
        };
        let mut m = manager(&locks, &cue);

        m.acquire();
        m.step().await;
        locks.take_away();
        assert_eq!(m.step().await, WakeTransition::Released);
        assert_eq!(cue.plays(), 1);
        assert_eq!(m.status(), WakeStatus::Reacquiring);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_is_single_flight() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());

        m.acquire();
        m.acquire();
        m.step().await;
        m.acquire();
        assert_eq!(locks.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panel_age() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());

        let panel = m.snapshot(Instant::now());
        assert_eq!(panel.interrupt_age, Age::NoData);

        m.acquire();
        m.step().await;
        locks.take_away();
        m.step().await;
        tokio::time::advance(Duration::from_millis(7400)).await;

        let mut sink = std::collections::BTreeMap::new();
        m.refresh_display(&mut sink);
        assert_eq!(sink["wake.interrupts"], "1");
        assert_eq!(sink["wake.interrupt_age"], "7s");
        assert_eq!(sink["wake.status"], "Lost — Reacquiring…");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_requesting_hands_back_grant() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());

        m.acquire();
        m.release().await;

        assert_eq!(locks.requests(), 1);
        assert_eq!(locks.handed_back(), 1);
        assert!(!m.state().held);
        assert_eq!(m.status(), WakeStatus::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_after_refused_request_releases_nothing() {
        let locks = FakeLocks::refusing_first();
        let mut m = manager(&locks, &CountingCue::default());

        m.acquire();
        m.release().await;

        assert_eq!(locks.handed_back(), 0);
        assert_eq!(m.status(), WakeStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_release_is_not_an_interrupt() {
        let locks = FakeLocks::new();
        let mut m = manager(&locks, &CountingCue::default());

        m.acquire();
        m.step().await;
        m.release().await;

        assert!(!m.state().held);
        assert_eq!(m.state().interrupt_count, 0);
        assert_eq!(m.status(), WakeStatus::Inactive);
        assert_eq!(locks.handed_back(), 1);
    }
}
