//! Error handling for comport
//!
//! Every fallible table operation reports its failure as a value; nothing in
//! the crate panics, aborts, or retries on the caller's behalf. Partial byte
//! transfers are ordinary results, not errors.

use thiserror::Error;

use crate::table::PortStatus;

/// Errors returned by device table operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComError {
    /// Operation attempted while the record is in the wrong status
    #[error("port index {index} is {status}, operation requires {required}")]
    InvalidState {
        /// The table index the operation addressed.
        index: usize,
        /// The status the record was found in.
        status: PortStatus,
        /// The status the operation requires.
        required: PortStatus,
    },

    /// The platform denied handle acquisition
    #[error("failed to open {path}: {reason}")]
    OpenFailed {
        /// The platform-addressable device path.
        path: String,
        /// The reason reported by the platform.
        reason: String,
    },

    /// The platform denied line/timeout configuration after the handle was
    /// acquired; the handle has already been released
    #[error("failed to configure {path}: {reason}")]
    ConfigureFailed {
        /// The platform-addressable device path.
        path: String,
        /// The reason reported by the platform.
        reason: String,
    },

    /// The device listing buffer could not grow any further
    #[error("device listing buffer could not grow to {limit} bytes")]
    AllocationFailed {
        /// The buffer size that could not be reached.
        limit: usize,
    },
}

/// Result type using ComError
pub type Result<T> = std::result::Result<T, ComError>;
