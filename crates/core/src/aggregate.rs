//! Aggregate root traits for the stock-keeping domain models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Stock items, assemblies, purchase orders and pending parts are all
/// aggregates: each one is loaded, decided on and saved as a unit inside a
/// single store transaction.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing revision of the aggregate's state.
    ///
    /// Incremented once per applied event.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a stored record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The record must not exist yet.
    Absent,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// `actual` is `None` when the record does not exist.
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Absent, Some(_)) => false,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            (ExpectedVersion::Exact(_), None) => false,
        }
    }

    pub fn check(self, actual: Option<u64>) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates must not perform IO. Workflow services in the infra layer load
/// them, ask them to decide, apply the resulting events and persist the new
/// state together with the matching ledger entries.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    ///
    /// This must not mutate state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Decide and immediately apply, returning the applied events.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_matching() {
        assert!(ExpectedVersion::Any.matches(None));
        assert!(ExpectedVersion::Any.matches(Some(4)));
        assert!(ExpectedVersion::Absent.matches(None));
        assert!(!ExpectedVersion::Absent.matches(Some(1)));
        assert!(ExpectedVersion::Exact(3).matches(Some(3)));
        assert!(!ExpectedVersion::Exact(3).matches(Some(4)));
        assert!(!ExpectedVersion::Exact(3).matches(None));
    }

    #[test]
    fn failed_check_is_a_conflict() {
        let err = ExpectedVersion::Exact(2).check(Some(5)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
