//! Time-ordered task identifiers
//!
//! A [`TaskId`] wraps a `ferroid` ULID: a 48-bit millisecond Unix timestamp
//! followed by 80 bits of entropy, rendered as 26 Crockford base32
//! characters. The textual form sorts in the same order as the numeric value,
//! so identifiers minted later compare greater both as numbers and as strings.
//!
//! [`IdGenerator`] is the only way the service mints identifiers. It shares a
//! lock-guarded monotonic generator, so identifiers minted within one
//! millisecond increment the entropy part instead of drawing a new one.

use ferroid::{
    base32::Base32UlidExt,
    generator::{IdGenStatus, LockMonoUlidGenerator},
    id::ULID,
    rand::ThreadRandom,
    time::MonotonicClock,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// 128-bit time-ordered identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(#[serde(with = "ferroid::serde::as_base32_ulid")] ULID);

impl TaskId {
    pub const fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        TaskId(ULID::from_components(timestamp_ms as u128, random))
    }

    pub const fn from_u128(value: u128) -> Self {
        TaskId(ULID::from_raw(value))
    }

    pub const fn as_u128(&self) -> u128 {
        self.0.to_raw()
    }

    /// Milliseconds since the Unix epoch encoded in the identifier
    pub const fn timestamp_ms(&self) -> u64 {
        self.0.timestamp() as u64
    }

    pub const fn random(&self) -> u128 {
        self.0.random()
    }
}

impl From<ULID> for TaskId {
    fn from(ulid: ULID) -> Self {
        TaskId(ulid)
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.0.encode().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task id: {0}")]
pub struct TaskIdParseError(String);

impl FromStr for TaskId {
    type Err = TaskIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ULID::decode(s)
            .map(TaskId)
            .map_err(|e| TaskIdParseError(e.to_string()))
    }
}

type Generator = LockMonoUlidGenerator<ULID, MonotonicClock, ThreadRandom>;

/// Monotonic identifier generator
///
/// Safe to share between request tasks (`Arc<IdGenerator>`). Clones share
/// the same underlying state.
#[derive(Clone)]
pub struct IdGenerator {
    inner: Arc<Generator>,
}

impl IdGenerator {
    pub fn new() -> Self {
        let clock = MonotonicClock::with_epoch(Duration::ZERO);
        Self {
            inner: Arc::new(Generator::new(clock, ThreadRandom)),
        }
    }

    pub fn next(&self) -> TaskId {
        loop {
            match self.inner.next_id() {
                IdGenStatus::Ready { id } => return TaskId(id),
                IdGenStatus::Pending { yield_for } => {
                    tracing::debug!(
                        yield_for_ms = yield_for as u64,
                        "identifier entropy exhausted, waiting for next tick"
                    );
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const CROCKFORD: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

    #[test]
    fn test_display_is_26_crockford_chars() {
        let id = TaskId::from_parts(1_700_000_000_000, 12345);
        let s = id.to_string();
        assert_eq!(s.len(), 26);
        assert!(s.chars().all(|c| CROCKFORD.contains(c)));
    }

    #[test]
    fn test_parse_display_identity() {
        let id = TaskId::from_parts(1_700_000_000_123, 0xdead_beef_cafe);
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.timestamp_ms(), 1_700_000_000_123);
        assert_eq!(parsed.random(), 0xdead_beef_cafe);
    }

    #[test]
    fn test_parse_accepts_lowercase_and_aliases() {
        let id = TaskId::from_u128(1);
        let lower = id.to_string().to_lowercase();
        assert_eq!(lower.parse::<TaskId>().unwrap(), id);

        let aliased = "OOOOOOOOOOOOOOOOOOOOOOOOOI";
        assert_eq!(aliased.parse::<TaskId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("short".parse::<TaskId>().is_err());
        assert!("not-an-id".parse::<TaskId>().is_err());
        assert!("0000000000000000000000000U".parse::<TaskId>().is_err());
        assert!("".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_string_order_matches_numeric_order() {
        let a = TaskId::from_parts(1000, 5);
        let b = TaskId::from_parts(1000, 6);
        let c = TaskId::from_parts(1001, 0);
        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string());
        assert!(b.to_string() < c.to_string());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = TaskId::from_parts(42, 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_generated_ids_carry_current_time() {
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let id = IdGenerator::new().next();
        assert!(id.timestamp_ms() + 1_000 >= before);
        assert!(id.timestamp_ms() <= before + 60_000);
    }

    #[test]
    fn test_sequential_ids_strictly_increase() {
        let generator = IdGenerator::new();
        let ids: Vec<TaskId> = (0..10_000).map(|_| generator.next()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.windows(2).all(|w| w[0].to_string() < w[1].to_string()));
    }

    #[test]
    fn test_concurrent_generation_is_unique_and_ordered() {
        let generator = Arc::new(IdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(std::thread::spawn(move || {
                (0..1_000).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(all.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(all.len(), 8_000);
    }
}
