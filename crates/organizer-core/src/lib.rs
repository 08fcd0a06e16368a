//! # organizer-core - Core Domain Types
//!
//! Foundation crate for the file organizer host. Provides the error type,
//! worker event definitions, file listing types, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Events (`events`)
//! - [`WorkerLine`] - One classified line of worker stdout
//! - [`WorkerEvent`] - Events published to supervisor subscribers
//!
//! ### Domain Types (`types`)
//! - [`WorkerStatus`] - Running/stopped state of the supervised worker
//! - [`FileEntry`], [`FileKind`], [`FileStats`] - Directory listing types
//! - [`SortKey`], [`SortDirection`] - File list ordering
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! ```rust
//! use organizer_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod prelude;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use events::{WorkerEvent, WorkerLine};
pub use types::{FileEntry, FileKind, FileStats, SortDirection, SortKey, WorkerStatus};
