use super::{LocationError, LocationProvider, Position, PositionOptions};
use crate::core::cmd::run_checked;
use futures::future::BoxFuture;
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

const DUMPSYS: &str = "/system/bin/dumpsys";
const UPTIME: &str = "/proc/uptime";

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Location\[(\w+) (-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)([^\]]*)\]")
        .expect("location regex")
});
static ACCURACY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:hAcc|acc)=(\d+(?:\.\d+)?)").expect("accuracy regex"));
static ET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bet=\+?([0-9dhms]+)").expect("et regex"));
static ET_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(ms|d|h|m|s)").expect("et part regex"));

/// Reads the freshest `Location[...]` record from `dumpsys location`.
///
/// The location service only exposes its last known fixes, so freshness is
/// enforced here: a record is accepted only if it is newer than the one
/// returned previously and, when boot time can be read, no older than the
/// larger of the cache age and the request timeout.
#[derive(Debug, Clone, Default)]
pub struct DumpsysLocation {
    last_returned: Arc<Mutex<Option<Duration>>>,
}

impl DumpsysLocation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationProvider for DumpsysLocation {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'static, Result<Position, LocationError>> {
        let last_returned = self.last_returned.clone();
        Box::pin(async move {
            let text = tokio::time::timeout(
                options.timeout,
                run_checked(DUMPSYS, &["location"], options.timeout * 2),
            )
            .await
            .map_err(|_| LocationError::Timeout)?
            .map_err(|e| LocationError::Unavailable(format!("{e:#}")))?;

            let wanted = if options.high_accuracy { "gps" } else { "any" };
            let position = parse_locations(&text)
                .into_iter()
                .filter(|p| !options.high_accuracy || p.provider == "gps")
                .max_by_key(|p| p.elapsed_realtime)
                .ok_or(LocationError::NoFix(wanted))?;

            let uptime = tokio::fs::read_to_string(UPTIME)
                .await
                .ok()
                .and_then(|s| parse_uptime(&s));
            let max_age = options.max_cache_age.max(options.timeout);

            let mut last = last_returned
                .lock()
                .map_err(|_| LocationError::Unavailable("provider state poisoned".into()))?;
            if !is_fresh(&position, *last, uptime, max_age) {
                return Err(LocationError::Stale);
            }
            if position.elapsed_realtime.is_some() {
                *last = position.elapsed_realtime;
            }
            Ok(position)
        })
    }
}

fn is_fresh(
    position: &Position,
    last: Option<Duration>,
    uptime: Option<Duration>,
    max_age: Duration,
) -> bool {
    let Some(et) = position.elapsed_realtime else {
        return true;
    };
    if last.is_some_and(|prev| et <= prev) {
        return false;
    }
    match uptime {
        Some(now) => now.saturating_sub(et) <= max_age,
        None => true,
    }
}

/// Every `Location[...]` record in a location service dump.
pub fn parse_locations(text: &str) -> Vec<Position> {
    LOCATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let rest = &caps[4];
            Some(Position {
                provider: caps[1].to_string(),
                latitude: caps[2].parse().ok()?,
                longitude: caps[3].parse().ok()?,
                accuracy_m: ACCURACY_RE
                    .captures(rest)
                    .and_then(|c| c[1].parse().ok()),
                elapsed_realtime: ET_RE
                    .captures(rest)
                    .and_then(|c| parse_elapsed_realtime(&c[1])),
            })
        })
        .collect()
}

/// Parse the framework's compact duration format, e.g. `1d2h3m4s567ms`.
pub fn parse_elapsed_realtime(s: &str) -> Option<Duration> {
    let s = s.trim_start_matches('+');
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut consumed = 0;
    for caps in ET_PART_RE.captures_iter(s) {
        let n: u64 = caps[1].parse().ok()?;
        let part = match &caps[2] {
            "d" => Duration::from_secs(n.checked_mul(86_400)?),
            "h" => Duration::from_secs(n.checked_mul(3_600)?),
            "m" => Duration::from_secs(n.checked_mul(60)?),
            "s" => Duration::from_secs(n),
            _ => Duration::from_millis(n),
        };
        total = total.checked_add(part)?;
        consumed += caps[0].len();
    }

    (consumed > 0 && consumed == s.len()).then_some(total)
}

fn parse_uptime(s: &str) -> Option<Duration> {
    let secs: f64 = s.split_whitespace().next()?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
