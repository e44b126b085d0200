//! # tally-core
//!
//! Core abstractions for the Tally progress-bookkeeping engine.
//!
//! This crate provides the foundational types used across all Tally components:
//!
//! - **Identifiers**: Strongly-typed IDs for tasks and error groups
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span constructors
//!
//! ## Crate Boundary
//!
//! `tally-core` is the **only** crate allowed to define shared primitives.
//! Domain logic lives in `tally-progress`.
//!
//! ## Example
//!
//! ```rust
//! use tally_core::prelude::*;
//!
//! // External systems assign task identifiers
//! let task_id = TaskId::new(42);
//!
//! // Error groups get generated identifiers
//! let error_type = ErrorTypeId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tally_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{ErrorTypeId, TaskId};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{ErrorTypeId, TaskId};
pub use observability::{init_logging, LogFormat};
