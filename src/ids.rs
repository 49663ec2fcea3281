//! Small validated newtypes for the identifiers that flow through the
//! orchestrator, so a batch id can never be passed where an issue id is
//! expected.

use std::fmt;

/// An opaque issue identifier, owned and assigned by the external tracker.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct IssueId(String);

impl IssueId {
    /// Wrap a tracker-provided id. The tracker owns the format; we just
    /// carry it around opaquely.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IssueId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IssueId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A worker slot index, bounded by `MAX_WORKERS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkerId(u8);

/// Fixed upper bound on the number of concurrent worker slots.
pub const MAX_WORKERS: u8 = 8;

impl WorkerId {
    /// Construct a worker id, rejecting values at or beyond `MAX_WORKERS`.
    pub fn new(index: usize) -> Result<Self, String> {
        if index >= MAX_WORKERS as usize {
            return Err(format!(
                "worker id {index} out of range (max {MAX_WORKERS})"
            ));
        }
        Ok(Self(index as u8))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The worker id reserved for planner/quality passes and sequential
    /// (non-batched) iterations: these never run concurrently with the
    /// worker pool's own dispatch of slot 0, so sharing the index is safe.
    #[must_use]
    pub const fn reserved() -> Self {
        Self(0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Monotonically increasing batch identifier, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct BatchId(u64);

impl BatchId {
    #[must_use]
    pub const fn first() -> Self {
        Self(1)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}
