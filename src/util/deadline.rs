//! Caller-supplied deadlines for long-running build and batch calls.

use std::time::{Duration, Instant};

use crate::error::{Result, VantageError};

/// A point in time after which an operation must abort with a timeout.
///
/// A timeout too large to represent as an [`Instant`] never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline at a fixed instant.
    pub fn at(at: Instant) -> Self {
        Self { at: Some(at) }
    }

    /// A deadline that never expires.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before expiry, zero once expired and `None` if unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`VantageError::Timeout`] if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_expired() {
            return Err(VantageError::timeout(format!(
                "{operation} exceeded its deadline"
            )));
        }
        Ok(())
    }
}

/// Check an optional deadline; `None` never expires.
pub fn check_deadline(deadline: Option<&Deadline>, operation: &str) -> Result<()> {
    match deadline {
        Some(deadline) => deadline.check(operation),
        None => Ok(()),
    }
}
