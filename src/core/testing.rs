//! Scripted stand-ins for the platform providers.

use crate::core::alert::{AlertCue, AlertError};
use crate::core::location::{LocationError, LocationProvider, Position, PositionOptions};
use crate::core::wakelock::{WakeLock, WakeLockError, WakeLockKind, WakeLockProvider};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct FakeLocks {
    refuse: Mutex<VecDeque<bool>>,
    releases: Mutex<Vec<oneshot::Sender<()>>>,
    requests: AtomicUsize,
    handed_back: AtomicUsize,
}

impl FakeLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing_first() -> Arc<Self> {
        let fake = Self::default();
        fake.refuse.lock().unwrap().push_back(true);
        Arc::new(fake)
    }

    /// Simulate the platform revoking the most recently granted lock.
    pub fn take_away(&self) {
        let tx = self.releases.lock().unwrap().pop().expect("no lock granted");
        let _ = tx.send(());
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn handed_back(&self) -> usize {
        self.handed_back.load(Ordering::SeqCst)
    }
}

impl WakeLockProvider for FakeLocks {
    fn request(&self, _kind: WakeLockKind) -> BoxFuture<'static, Result<WakeLock, WakeLockError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refuse.lock().unwrap().pop_front().unwrap_or(false) {
            return Box::pin(async { Err(WakeLockError::Rejected("not allowed".into())) });
        }
        let (tx, rx) = oneshot::channel();
        self.releases.lock().unwrap().push(tx);
        Box::pin(async move {
            Ok(WakeLock::new(
                "fake",
                Box::pin(async move {
                    let _ = rx.await;
                }),
            ))
        })
    }

    fn release(&self, _lock: WakeLock) -> BoxFuture<'static, Result<(), WakeLockError>> {
        self.handed_back.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

#[derive(Clone, Default)]
pub struct CountingCue {
    pub plays: Arc<AtomicUsize>,
    pub broken: bool,
}

impl CountingCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AlertCue for CountingCue {
    fn rewind(&mut self) {}

    fn play(&mut self) -> Result<(), AlertError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            Err(AlertError::NoCommand)
        } else {
            Ok(())
        }
    }
}

pub enum Reply {
    FixAfter(u64),
    FailAfter(u64),
    Hang,
}

/// Answers each request with the next scripted reply, then hangs forever.
pub struct Scripted {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn sample_position() -> Position {
    Position {
        provider: "gps".into(),
        latitude: 51.5007,
        longitude: -0.1246,
        accuracy_m: Some(4.0),
        elapsed_realtime: None,
    }
}

impl LocationProvider for Scripted {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'static, Result<Position, LocationError>> {
        assert_eq!(options, PositionOptions::POLL);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Hang);
        match reply {
            Reply::FixAfter(ms) => Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(sample_position())
            }),
            Reply::FailAfter(ms) => Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Err(LocationError::NoFix("gps"))
            }),
            Reply::Hang => Box::pin(std::future::pending()),
        }
    }
}
