use tokio::time::Instant;

/// Seconds elapsed since an event, or nothing if it never happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    NoData,
    Seconds(u64),
}

impl Age {
    pub const SENTINEL: &'static str = "--";

    pub fn since(at: Option<Instant>, now: Instant) -> Self {
        match at {
            Some(at) => Self::Seconds(now.saturating_duration_since(at).as_secs()),
            None => Self::NoData,
        }
    }

    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(s) => Some(*s),
            Self::NoData => None,
        }
    }

    /// `12s`, or the sentinel.
    pub fn with_unit(&self) -> String {
        match self {
            Self::Seconds(s) => format!("{}s", s),
            Self::NoData => Self::SENTINEL.to_string(),
        }
    }
}

/// Bare number, or the sentinel.
impl std::fmt::Display for Age {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{}", s),
            Self::NoData => f.write_str(Self::SENTINEL),
        }
    }
}
