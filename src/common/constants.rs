use std::time::Duration;

pub const CONFIG_DIR: &str = "/data/adb/.config/wakewatch";
pub const STATUS_FILE: &str = "/data/adb/.config/wakewatch/status";

/// Cadence of the location polling loop.
pub const TICK_PERIOD: Duration = Duration::from_millis(2000);
/// Outer deadline for a single poll tick. Must exceed [`PROVIDER_TIMEOUT`]
/// so a provider that ignores its own timeout still resolves the tick.
pub const FIX_DEADLINE: Duration = Duration::from_millis(4000);
/// Timeout handed to the location provider itself.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_millis(3500);
/// Period of each display refresh.
pub const DISPLAY_REFRESH: Duration = Duration::from_millis(1000);
/// How often the power-service lock re-reads `dumpsys power` for loss.
pub const RELEASE_POLL: Duration = Duration::from_millis(1000);

pub const DEFAULT_FIX_LOG_CAPACITY: usize = 1800;
