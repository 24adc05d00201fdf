mod dumpsys;
mod fix_log;
mod poller;

pub use dumpsys::{DumpsysLocation, parse_elapsed_realtime, parse_locations};
pub use fix_log::FixLog;
pub use poller::{Classification, GpsPanel, InterruptCause, LocationPoller, LocationState, TickToken};

use crate::common::PROVIDER_TIMEOUT;
use futures::future::BoxFuture;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f32>,
    /// Time since boot at which the platform produced the fix.
    pub elapsed_realtime: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the caller accepts; zero demands a fresh one.
    pub max_cache_age: Duration,
}

impl PositionOptions {
    /// Options used by every poll tick.
    pub const POLL: Self = Self {
        high_accuracy: true,
        timeout: PROVIDER_TIMEOUT,
        max_cache_age: Duration::ZERO,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("location provider unavailable: {0}")]
    Unavailable(String),

    #[error("no {0} fix reported")]
    NoFix(&'static str),

    #[error("only a cached fix is available")]
    Stale,

    #[error("location provider timed out")]
    Timeout,
}

pub trait LocationProvider: Send + Sync {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'static, Result<Position, LocationError>>;
}
