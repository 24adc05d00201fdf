use super::{FixLog, LocationError, LocationProvider, Position, PositionOptions};
use crate::common::{FIX_DEADLINE, TICK_PERIOD};
use crate::core::age::Age;
use crate::core::display::DisplaySink;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Identifies one poll tick. Issued from a monotonically increasing
/// counter; a tick is unresolved exactly while its token is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickToken(u64);

impl std::fmt::Display for TickToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
    Timeout,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Fix,
    Interrupt(InterruptCause),
}

#[derive(Debug)]
enum Resolution {
    Settled(Result<Position, LocationError>),
    DeadlineElapsed,
}

#[derive(Debug)]
struct TickEvent {
    token: TickToken,
    resolution: Resolution,
}

struct InFlight {
    started_at: Instant,
    request: AbortHandle,
    deadline: AbortHandle,
}

#[derive(Debug, Clone, Default)]
pub struct LocationState {
    pub fix_count: u64,
    pub interrupt_count: u64,
    pub last_fix_at: Option<Instant>,
    pub fix_log: FixLog,
}

impl LocationState {
    fn record_fix(&mut self, position: Position, at: Instant) {
        self.fix_log.push(position);
        self.fix_count += 1;
        self.last_fix_at = Some(at);
    }

    fn record_interrupt(&mut self) {
        self.interrupt_count += 1;
    }

    pub fn fix_age(&self, now: Instant) -> Age {
        Age::since(self.last_fix_at, now)
    }
}

/// What the GPS panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsPanel {
    pub fix_count: u64,
    pub interrupt_count: u64,
    pub fix_age: Age,
}

impl GpsPanel {
    pub fn write_to(&self, sink: &mut dyn DisplaySink) {
        sink.set("gps.fixes", self.fix_count.to_string());
        sink.set("gps.interrupts", self.interrupt_count.to_string());
        sink.set("gps.fix_age", self.fix_age.to_string());
    }
}

/// Polls the location provider every [`TICK_PERIOD`] and classifies each
/// tick as a fix or an interrupt.
///
/// Every tick races its request against a [`FIX_DEADLINE`] timer. Both
/// report back over the same channel, and whichever is settled first
/// removes the token from the in-flight table; the other is cancelled, or
/// ignored if it already fired. Ticks may overlap since the deadline is
/// longer than the period.
pub struct LocationPoller {
    provider: Arc<dyn LocationProvider>,
    state: LocationState,
    schedule: Option<Interval>,
    last_token: u64,
    in_flight: HashMap<TickToken, InFlight>,
    tx: mpsc::UnboundedSender<TickEvent>,
    rx: mpsc::UnboundedReceiver<TickEvent>,
}

impl LocationPoller {
    pub fn new(provider: Arc<dyn LocationProvider>, fix_log_capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            state: LocationState {
                fix_log: FixLog::with_capacity(fix_log_capacity),
                ..LocationState::default()
            },
            schedule: None,
            last_token: 0,
            in_flight: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Begin the repeating schedule; the first tick comes one period from
    /// now. Returns `false` if the schedule was already running.
    pub fn start(&mut self) -> bool {
        if self.schedule.is_some() {
            debug!(target: "wakewatch::gps", "Polling already running");
            return false;
        }
        let mut schedule = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.schedule = Some(schedule);
        info!(
            target: "wakewatch::gps",
            "Polling started (period {}ms, deadline {}ms)",
            TICK_PERIOD.as_millis(),
            FIX_DEADLINE.as_millis()
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn state(&self) -> &LocationState {
        &self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn fix_age(&self) -> Age {
        self.state.fix_age(Instant::now())
    }

    pub fn snapshot(&self, now: Instant) -> GpsPanel {
        GpsPanel {
            fix_count: self.state.fix_count,
            interrupt_count: self.state.interrupt_count,
            fix_age: self.state.fix_age(now),
        }
    }

    pub fn refresh_display(&self, sink: &mut dyn DisplaySink) {
        self.snapshot(Instant::now()).write_to(sink);
    }

    /// Wait for the next schedule tick or tick resolution and apply it.
    ///
    /// Returns the classification when a tick resolved, `None` when a new
    /// tick was started or a stale resolution was dropped. Cancel safe.
    pub async fn step(&mut self) -> Option<(TickToken, Classification)> {
        tokio::select! {
            biased;
            Some(event) = self.rx.recv() => self.settle(event, Instant::now()),
            () = next_tick(&mut self.schedule) => {
                self.begin_tick();
                None
            }
        }
    }

    fn begin_tick(&mut self) -> TickToken {
        self.last_token += 1;
        let token = TickToken(self.last_token);
        let started_at = Instant::now();

        let request = self.provider.current_position(PositionOptions::POLL);
        let tx = self.tx.clone();
        let request = tokio::spawn(async move {
            let result = request.await;
            let _ = tx.send(TickEvent {
                token,
                resolution: Resolution::Settled(result),
            });
        })
        .abort_handle();

        let tx = self.tx.clone();
        let deadline = tokio::spawn(async move {
            tokio::time::sleep_until(started_at + FIX_DEADLINE).await;
            let _ = tx.send(TickEvent {
                token,
                resolution: Resolution::DeadlineElapsed,
            });
        })
        .abort_handle();

        self.in_flight.insert(
            token,
            InFlight {
                started_at,
                request,
                deadline,
            },
        );
        debug!(target: "wakewatch::gps", "Tick {} started ({} in flight)", token, self.in_flight.len());
        token
    }

    fn settle(&mut self, event: TickEvent, now: Instant) -> Option<(TickToken, Classification)> {
        let token = event.token;
        let Some(flight) = self.in_flight.remove(&token) else {
            debug!(target: "wakewatch::gps", "Tick {} already resolved, dropping {:?}", token, event.resolution);
            return None;
        };
        let took = now.saturating_duration_since(flight.started_at).as_millis();

        let classification = match event.resolution {
            Resolution::Settled(Ok(position)) => {
                flight.deadline.abort();
                debug!(
                    target: "wakewatch::gps",
                    "Tick {} fix from {} ({:.6},{:.6}) in {}ms",
                    token, position.provider, position.latitude, position.longitude, took
                );
                self.state.record_fix(position, now);
                Classification::Fix
            }
            Resolution::Settled(Err(e)) => {
                flight.deadline.abort();
                debug!(target: "wakewatch::gps", "Tick {} interrupted after {}ms: {}", token, took, e);
                self.state.record_interrupt();
                Classification::Interrupt(InterruptCause::Provider)
            }
            Resolution::DeadlineElapsed => {
                flight.request.abort();
                debug!(target: "wakewatch::gps", "Tick {} hit the {}ms deadline", token, FIX_DEADLINE.as_millis());
                self.state.record_interrupt();
                Classification::Interrupt(InterruptCause::Timeout)
            }
        };
        Some((token, classification))
    }
}

impl Drop for LocationPoller {
    fn drop(&mut self) {
        for flight in self.in_flight.values() {
            flight.request.abort();
            flight.deadline.abort();
        }
    }
}

async fn next_tick(schedule: &mut Option<Interval>) {
    match schedule {
        Some(schedule) => {
            schedule.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{Reply, Scripted, sample_position as sample};
    use std::collections::BTreeMap;
    use std::time::Duration;

    async fn next_classification(poller: &mut LocationPoller) -> (TickToken, Classification) {
        loop {
            if let Some(resolved) = poller.step().await {
                return resolved;
            }
        }
    }

    async fn run_for(poller: &mut LocationPoller, ms: u64) -> Vec<Classification> {
        let mut seen = Vec::new();
        let _ = tokio::time::timeout(Duration::from_millis(ms), async {
            loop {
                if let Some((_, c)) = poller.step().await {
                    seen.push(c);
                }
            }
        })
        .await;
        seen
    }

    fn assert_elapsed(since: Instant, expected_ms: u64) {
        let elapsed = since.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_before_deadline() {
        let provider = Scripted::new(vec![Reply::FixAfter(1000)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        let t0 = Instant::now();
        poller.start();

        let (token, c) = next_classification(&mut poller).await;
        assert_eq!(token, TickToken(1));
        assert_eq!(c, Classification::Fix);
        assert_elapsed(t0, 3000);

        let st = poller.state();
        assert_eq!((st.fix_count, st.interrupt_count, st.fix_log.len()), (1, 0, 1));
        assert_eq!(st.last_fix_at, Some(Instant::now()));
        assert_eq!(poller.in_flight(), 0);

        // Tick #1's deadline would have fired at t=6000.
        let later = run_for(&mut poller, 3500).await;
        assert!(later.is_empty());
        assert_eq!(poller.state().interrupt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_times_out_once() {
        let provider = Scripted::new(vec![]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        let t0 = Instant::now();
        poller.start();

        let (token, c) = next_classification(&mut poller).await;
        assert_eq!(token, TickToken(1));
        assert_eq!(c, Classification::Interrupt(InterruptCause::Timeout));
        assert_elapsed(t0, 6000);

        let st = poller.state();
        assert_eq!((st.fix_count, st.interrupt_count), (0, 1));
        assert!(st.fix_log.is_empty());
        assert_eq!(poller.fix_age(), Age::NoData);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_resolution_is_ignored() {
        let provider = Scripted::new(vec![Reply::FixAfter(5000)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        poller.start();

        let (token, c) = next_classification(&mut poller).await;
        assert_eq!(c, Classification::Interrupt(InterruptCause::Timeout));

        let late = TickEvent {
            token,
            resolution: Resolution::Settled(Ok(sample())),
        };
        assert_eq!(poller.settle(late, Instant::now()), None);

        let st = poller.state();
        assert_eq!((st.fix_count, st.interrupt_count, st.fix_log.len()), (0, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_fix_is_ignored() {
        let provider = Scripted::new(vec![Reply::FixAfter(10)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        poller.start();

        let (token, c) = next_classification(&mut poller).await;
        assert_eq!(c, Classification::Fix);

        let late = TickEvent {
            token,
            resolution: Resolution::DeadlineElapsed,
        };
        assert_eq!(poller.settle(late, Instant::now()), None);
        assert_eq!(poller.state().interrupt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_is_interrupt() {
        let provider = Scripted::new(vec![Reply::FailAfter(500)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        let t0 = Instant::now();
        poller.start();

        let (_, c) = next_classification(&mut poller).await;
        assert_eq!(c, Classification::Interrupt(InterruptCause::Provider));
        assert_elapsed(t0, 2500);

        let st = poller.state();
        assert_eq!((st.fix_count, st.interrupt_count, st.fix_log.len()), (0, 1, 0));
        assert_eq!(poller.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_one_schedule() {
        let provider = Scripted::new(vec![]);
        let mut poller = LocationPoller::new(provider.clone(), 10);

        assert!(poller.start());
        assert!(!poller.start());
        assert!(poller.is_running());

        run_for(&mut poller, 2500).await;
        assert_eq!(provider.calls(), 1);
        assert_eq!(poller.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_overlap() {
        let provider = Scripted::new(vec![]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        poller.start();

        let seen = run_for(&mut poller, 4500).await;
        assert!(seen.is_empty());
        assert_eq!(provider.calls(), 2);
        assert_eq!(poller.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_tick_counts_once() {
        let provider = Scripted::new(vec![
            Reply::FixAfter(100),
            Reply::FailAfter(100),
            Reply::Hang,
            Reply::FixAfter(3900),
        ]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        poller.start();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(next_classification(&mut poller).await);
        }

        let tokens: Vec<u64> = seen.iter().map(|(t, _)| t.0).collect();
        assert_eq!(tokens, vec![1, 2, 3, 4]);
        assert_eq!(seen[0].1, Classification::Fix);
        assert_eq!(seen[1].1, Classification::Interrupt(InterruptCause::Provider));
        assert_eq!(seen[2].1, Classification::Interrupt(InterruptCause::Timeout));
        assert_eq!(seen[3].1, Classification::Fix);

        let st = poller.state();
        assert_eq!((st.fix_count, st.interrupt_count, st.fix_log.len()), (2, 2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_age_grows_between_fixes() {
        let provider = Scripted::new(vec![Reply::FixAfter(0)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);
        assert_eq!(poller.fix_age(), Age::NoData);
        poller.start();
        next_classification(&mut poller).await;

        let mut last = 0;
        for _ in 0..6 {
            tokio::time::advance(Duration::from_millis(700)).await;
            let age = poller.fix_age().seconds().unwrap();
            assert!(age >= last);
            last = age;
        }
        assert_eq!(last, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_display() {
        let provider = Scripted::new(vec![Reply::FixAfter(0)]);
        let mut poller = LocationPoller::new(provider.clone(), 10);

        let mut sink = BTreeMap::new();
        poller.refresh_display(&mut sink);
        assert_eq!(sink["gps.fix_age"], "--");
        assert_eq!(sink["gps.fixes"], "0");

        poller.start();
        next_classification(&mut poller).await;
        tokio::time::advance(Duration::from_millis(1200)).await;

        poller.refresh_display(&mut sink);
        assert_eq!(sink["gps.fixes"], "1");
        assert_eq!(sink["gps.interrupts"], "0");
        assert_eq!(sink["gps.fix_age"], "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_log_is_bounded() {
        let replies = (0..5).map(|_| Reply::FixAfter(10)).collect();
        let provider = Scripted::new(replies);
        let mut poller = LocationPoller::new(provider.clone(), 3);
        poller.start();

        for _ in 0..5 {
            next_classification(&mut poller).await;
        }
        assert_eq!(poller.state().fix_count, 5);
        assert_eq!(poller.state().fix_log.len(), 3);
        assert_eq!(poller.state().fix_log.evicted(), 2);
    }
}
