//! Error taxonomy for the engine.
//!
//! Three failures, all caller-visible: `InvalidOperation` is a caller bug
//! and never worth retrying, `StaleReference` means the caller must re-fetch
//! the current version and retry, `DocumentNotFound` leaves it to the caller
//! whether to create the document. Submitting an operation either fully
//! transforms-and-applies or fails with no mutation at all.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed operation fields, such as a position and length that
    /// together overflow the address space.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The caller named a base version the document has not reached yet.
    #[error("stale reference: base version {base} is ahead of version {current}")]
    StaleReference { base: u64, current: u64 },

    /// No document with this id exists.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}
