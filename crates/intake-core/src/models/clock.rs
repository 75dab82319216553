//! Logical client clock
//!
//! Each client session stamps its submissions with its own session identifier
//! and a counter that strictly increases between submissions. Writes are
//! ordered by these clocks rather than by arrival time, so a slow retry from
//! an older session cannot overwrite a newer answer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Per-session ordering token attached to every intake write.
///
/// Serialized as its `"<session_id>:<counter>"` string form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalClock {
    /// Client session that produced the write
    pub session_id: String,
    /// Monotonic counter within the session
    pub counter: u64,
}

impl LogicalClock {
    /// Create a clock for the given session and counter
    pub fn new(session_id: impl Into<String>, counter: u64) -> Self {
        Self {
            session_id: session_id.into(),
            counter,
        }
    }

    /// Only a clock without a session stands for "no prior write". A stored
    /// `s:0` is a real write and rejects another `s:0`.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.session_id.is_empty()
    }
}

impl Ord for LogicalClock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.session_id.cmp(&other.session_id))
    }
}

impl PartialOrd for LogicalClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            return Ok(());
        }
        write!(f, "{}:{}", self.session_id, self.counter)
    }
}

impl FromStr for LogicalClock {
    type Err = Error;

    /// Parse `"<session_id>:<counter>"`. The session id may itself contain
    /// colons; the counter is everything after the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        let (session_id, counter) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidClock(format!("missing counter in {s:?}")))?;
        if session_id.is_empty() {
            return Err(Error::InvalidClock(format!("missing session in {s:?}")));
        }
        let counter = counter
            .parse()
            .map_err(|_| Error::InvalidClock(format!("invalid counter in {s:?}")))?;

        Ok(Self::new(session_id, counter))
    }
}

impl TryFrom<String> for LogicalClock {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogicalClock> for String {
    fn from(clock: LogicalClock) -> Self {
        clock.to_string()
    }
}

/// Decide whether an incoming write supersedes what is stored.
///
/// Returns true when nothing is stored, the stored clock is unset, or the
/// stored clock orders strictly before the incoming one.
#[must_use]
pub fn accept(existing: Option<&LogicalClock>, incoming: &LogicalClock) -> bool {
    match existing {
        None => true,
        Some(existing) if existing.is_unset() => true,
        Some(existing) => existing < incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_roundtrip_string() {
        let clock = LogicalClock::new("s1", 12);
        assert_eq!(clock.to_string(), "s1:12");
        assert_eq!("s1:12".parse::<LogicalClock>().unwrap(), clock);
    }

    #[test]
    fn test_clock_session_with_colons() {
        let clock: LogicalClock = "ios:device:abc:7".parse().unwrap();
        assert_eq!(clock.session_id, "ios:device:abc");
        assert_eq!(clock.counter, 7);
    }

    #[test]
    fn test_clock_parse_rejects_malformed() {
        assert!("no-counter".parse::<LogicalClock>().is_err());
        assert!("s1:abc".parse::<LogicalClock>().is_err());
        assert!(":5".parse::<LogicalClock>().is_err());
        assert!("s1:-1".parse::<LogicalClock>().is_err());
    }

    #[test]
    fn test_clock_serializes_as_string() {
        let clock = LogicalClock::new("web", 3);
        assert_eq!(serde_json::to_string(&clock).unwrap(), r#""web:3""#);
        assert_eq!(
            serde_json::from_str::<LogicalClock>(r#""web:3""#).unwrap(),
            clock
        );
        assert!(serde_json::from_str::<LogicalClock>(r#""web""#).is_err());
    }

    #[test]
    fn test_empty_string_is_unset() {
        let clock: LogicalClock = "".parse().unwrap();
        assert!(clock.is_unset());
        assert_eq!(clock.to_string(), "");
    }

    #[test]
    fn test_counter_orders_before_session() {
        assert!(LogicalClock::new("zzz", 1) < LogicalClock::new("aaa", 2));
        assert!(LogicalClock::new("a", 3) < LogicalClock::new("b", 3));
        assert_eq!(
            LogicalClock::new("a", 3).cmp(&LogicalClock::new("a", 3)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_accept_first_write() {
        assert!(accept(None, &LogicalClock::new("s1", 1)));
        assert!(accept(None, &LogicalClock::default()));
    }

    #[test]
    fn test_accept_over_unset_clock() {
        let unset = LogicalClock::default();
        assert!(accept(Some(&unset), &LogicalClock::new("s1", 0)));
    }

    #[test]
    fn test_zero_counter_clock_is_a_real_write() {
        let stored = LogicalClock::new("s", 0);
        assert!(!stored.is_unset());
        assert!(!accept(Some(&stored), &LogicalClock::new("s", 0)));
        assert!(accept(Some(&stored), &LogicalClock::new("s", 1)));
    }

    #[test]
    fn test_accept_newer_rejects_stale_and_duplicate() {
        let stored = LogicalClock::new("s2", 5);
        assert!(accept(Some(&stored), &LogicalClock::new("s1", 6)));
        assert!(!accept(Some(&stored), &LogicalClock::new("s1", 1)));
        assert!(!accept(Some(&stored), &stored.clone()));
    }

    #[test]
    fn test_accept_tie_breaks_on_session() {
        let stored = LogicalClock::new("s1", 4);
        assert!(accept(Some(&stored), &LogicalClock::new("s2", 4)));
        assert!(!accept(Some(&LogicalClock::new("s2", 4)), &stored));
    }
}
