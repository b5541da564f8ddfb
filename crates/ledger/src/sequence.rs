//! Sequential document number allocation.
//!
//! Numbers are allocated by looking up the highest number in use for a
//! prefix and probing upward until a free one is confirmed. Concurrent
//! allocators reading a stale "highest" simply probe past each other. If no
//! free number turns up within the probe limit (or the lookup itself fails),
//! the allocator degrades to a timestamp-derived number: the prefix plus the
//! last six digits of the current epoch milliseconds, stepped past any number
//! the store (or the caller's own pending writes) already holds. Fallback
//! numbers are not monotonic and can still collide with a concurrent writer;
//! stores reject duplicate inserts, so that surfaces as a retryable conflict
//! instead of a duplicate record.

use chrono::{DateTime, Utc};

use stockledger_core::{DocumentNumber, IdPrefix};

pub const DEFAULT_PROBE_LIMIT: u32 = 100;

const FALLBACK_MODULUS: i64 = 1_000_000;

/// Storage-side lookups the allocator needs.
pub trait SequenceSource {
    type Error: core::fmt::Display;

    /// Highest sequence number in use (or reserved) for `prefix`.
    fn highest(&mut self, prefix: IdPrefix) -> Result<Option<u64>, Self::Error>;

    /// Whether `number` already belongs to a record.
    fn is_taken(&mut self, number: DocumentNumber) -> Result<bool, Self::Error>;

    /// Reserve `number` so later lookups start above it.
    fn claim(&mut self, _number: DocumentNumber) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Exhausted { attempts: u32 },
    LookupFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub number: DocumentNumber,
    pub fallback: Option<FallbackReason>,
}

impl Allocation {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceAllocator {
    probe_limit: u32,
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_LIMIT)
    }
}

impl SequenceAllocator {
    pub fn new(probe_limit: u32) -> Self {
        Self {
            probe_limit: probe_limit.max(1),
        }
    }

    pub fn probe_limit(&self) -> u32 {
        self.probe_limit
    }

    pub fn allocate<S: SequenceSource>(
        &self,
        source: &mut S,
        prefix: IdPrefix,
        now: DateTime<Utc>,
    ) -> Allocation {
        match self.probe(source, prefix) {
            Ok(Some(number)) => {
                source.claim(number);
                Allocation {
                    number,
                    fallback: None,
                }
            }
            Ok(None) => Allocation {
                number: self.fallback(source, prefix, now),
                fallback: Some(FallbackReason::Exhausted {
                    attempts: self.probe_limit,
                }),
            },
            Err(e) => Allocation {
                number: self.fallback(source, prefix, now),
                fallback: Some(FallbackReason::LookupFailed(e.to_string())),
            },
        }
    }

    /// First free timestamp-derived number, wrapping within six digits.
    ///
    /// A failing `is_taken` ends the walk at the current candidate; the
    /// store's duplicate check still guards the insert.
    fn fallback<S: SequenceSource>(
        &self,
        source: &mut S,
        prefix: IdPrefix,
        now: DateTime<Utc>,
    ) -> DocumentNumber {
        let start = Self::timestamp_number(prefix, now);
        let modulus = FALLBACK_MODULUS as u64;
        for step in 0..u64::from(self.probe_limit) {
            let number = DocumentNumber::new(prefix, (start.seq() + step) % modulus);
            match source.is_taken(number) {
                Ok(true) => continue,
                Ok(false) | Err(_) => return number,
            }
        }
        start
    }

    fn probe<S: SequenceSource>(
        &self,
        source: &mut S,
        prefix: IdPrefix,
    ) -> Result<Option<DocumentNumber>, S::Error> {
        let mut candidate = source.highest(prefix)?.map_or(1, |h| h + 1);
        for _ in 0..self.probe_limit {
            let number = DocumentNumber::new(prefix, candidate);
            if !source.is_taken(number)? {
                return Ok(Some(number));
            }
            candidate += 1;
        }
        Ok(None)
    }

    pub fn timestamp_number(prefix: IdPrefix, now: DateTime<Utc>) -> DocumentNumber {
        let suffix = now.timestamp_millis().rem_euclid(FALLBACK_MODULUS);
        DocumentNumber::new(prefix, suffix as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeSource {
        highest: Option<u64>,
        taken: HashSet<u64>,
        claimed: Vec<u64>,
        broken: bool,
    }

    impl SequenceSource for FakeSource {
        type Error = String;

        fn highest(&mut self, _prefix: IdPrefix) -> Result<Option<u64>, String> {
            if self.broken {
                return Err("store offline".to_string());
            }
            Ok(self.highest)
        }

        fn is_taken(&mut self, number: DocumentNumber) -> Result<bool, String> {
            Ok(self.taken.contains(&number.seq()))
        }

        fn claim(&mut self, number: DocumentNumber) {
            self.claimed.push(number.seq());
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_123_456).unwrap()
    }

    #[test]
    fn first_number_in_an_empty_namespace_is_one() {
        let mut source = FakeSource::default();
        let allocation =
            SequenceAllocator::default().allocate(&mut source, IdPrefix::Transaction, fixed_now());
        assert_eq!(allocation.number.to_string(), "TXN000001");
        assert!(!allocation.is_fallback());
        assert_eq!(source.claimed, vec![1]);
    }

    #[test]
    fn probes_past_numbers_taken_by_concurrent_writers() {
        let mut source = FakeSource {
            highest: Some(41),
            taken: [42, 43, 44].into_iter().collect(),
            ..FakeSource::default()
        };
        let allocation =
            SequenceAllocator::default().allocate(&mut source, IdPrefix::Assembly, fixed_now());
        assert_eq!(allocation.number.to_string(), "ASM000045");
    }

    #[test]
    fn exhausted_probes_fall_back_to_timestamp_digits() {
        let mut source = FakeSource {
            highest: Some(0),
            taken: (1..=3).collect(),
            ..FakeSource::default()
        };
        let allocation =
            SequenceAllocator::new(3).allocate(&mut source, IdPrefix::Transaction, fixed_now());
        assert_eq!(allocation.number.to_string(), "TXN123456");
        assert_eq!(
            allocation.fallback,
            Some(FallbackReason::Exhausted { attempts: 3 })
        );
        assert!(source.claimed.is_empty());
    }

    #[test]
    fn lookup_failure_falls_back() {
        let mut source = FakeSource {
            broken: true,
            ..FakeSource::default()
        };
        let allocation =
            SequenceAllocator::default().allocate(&mut source, IdPrefix::Receipt, fixed_now());
        assert_eq!(allocation.number.to_string(), "RCP123456");
        assert!(matches!(
            allocation.fallback,
            Some(FallbackReason::LookupFailed(_))
        ));
    }

    #[test]
    fn fallback_steps_past_numbers_already_written() {
        let mut source = FakeSource {
            broken: true,
            taken: [123_456, 123_457].into_iter().collect(),
            ..FakeSource::default()
        };
        let allocator = SequenceAllocator::default();
        let allocation = allocator.allocate(&mut source, IdPrefix::Transaction, fixed_now());
        assert_eq!(allocation.number.to_string(), "TXN123458");
        assert!(allocation.is_fallback());
        assert!(source.claimed.is_empty());
    }

    #[test]
    fn fallback_wraps_at_six_digits() {
        let mut source = FakeSource {
            broken: true,
            taken: [999_999].into_iter().collect(),
            ..FakeSource::default()
        };
        let now = Utc.timestamp_millis_opt(1_700_000_999_999).unwrap();
        let allocation = SequenceAllocator::default().allocate(&mut source, IdPrefix::Part, now);
        assert_eq!(allocation.number.seq(), 0);
    }
}
