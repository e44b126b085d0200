//! Strongly-typed identifiers for Tally entities.
//!
//! Two kinds of identifiers exist side by side:
//!
//! - **Externally assigned**: [`TaskId`] wraps the numeric identifier the
//!   submitting system attaches to a bulk task. Tally never generates these.
//! - **Internally generated**: [`ErrorTypeId`] is a ULID minted the first time
//!   a distinct diagnostic message is seen for a task. ULIDs sort
//!   lexicographically by creation time and need no coordination.
//!
//! # Example
//!
//! ```rust
//! use tally_core::id::{ErrorTypeId, TaskId};
//!
//! let task = TaskId::new(1024);
//! let error_type = ErrorTypeId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: TaskId = error_type;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// The identifier of a bulk task.
///
/// Assigned by the submitting system before the task reaches Tally; the value
/// is opaque here beyond equality, ordering, and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wraps a raw task identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>().map(Self).map_err(|e| Error::InvalidId {
            message: format!("invalid task ID '{s}': {e}"),
        })
    }
}

/// A unique identifier for a group of identical diagnostic messages.
///
/// Error groups are created lazily: the first error report carrying a given
/// message mints a new ID, and every later occurrence of the same message
/// joins that group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorTypeId(Ulid);

impl ErrorTypeId {
    /// Generates a new unique error type ID.
    ///
    /// Uses ULID generation which is:
    /// - Lexicographically sortable by creation time
    /// - Globally unique without coordination
    /// - URL-safe and case-insensitive
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates an error type ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for ErrorTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ErrorTypeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid error type ID '{s}': {e}"),
            })
    }
}
