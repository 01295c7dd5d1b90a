//! Runtime error types
//!
//! Only construction can fail hard: everything else in the runtime degrades
//! to defaults with a logged warning instead of erroring (configuration
//! acceptance is the only failure concept; there are no transient faults).

use thiserror::Error;

/// Errors raised by the scroll stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The configured scroll container does not resolve to a live node in
    /// the host document.
    #[error("no valid scroll container supplied")]
    InvalidContainer,
}

/// Result type for stage operations.
pub type Result<T> = std::result::Result<T, StageError>;
