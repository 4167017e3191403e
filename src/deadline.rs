//! Deadlines for sync attempts.
//!
//! A sync attempt that runs in the background carries a `Deadline`. The git
//! runner kills child processes once it expires, and the version validator
//! checks it between candidates.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A point in time after which an operation must give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self::default()
    }

    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
            budget: Some(budget),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Builds the timeout error reported for `operation`.
    pub fn timeout_error(&self, operation: &str) -> Error {
        Error::Timeout {
            operation: operation.to_string(),
            after: self.budget.unwrap_or_default(),
        }
    }

    /// Fails with `Error::Timeout` if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_expired() {
            Err(self.timeout_error(operation))
        } else {
            Ok(())
        }
    }
}
