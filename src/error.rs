//! Error taxonomy for the store and tile-index engine (spec §7).

use thiserror::Error;

/// The abstract error kinds the engine can surface.
///
/// `NotFound` and `InvariantViolation` are recoverable or fatal depending on
/// the caller (geometry assembly treats a missing way as a skippable
/// warning; a direct `at()` lookup propagates it). `StoreKindMismatch`,
/// `OutOfSpace` past the growth cap, and `InvariantViolation` are always
/// fatal to the run that raised them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("id {0} not found")]
    NotFound(i64),

    #[error("store reopened with a different node store kind than it was created with")]
    StoreKindMismatch,

    #[error("arena ran out of space after {0} growth attempts")]
    OutOfSpace(u32),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input: {0}")]
    BadInput(String),
}
