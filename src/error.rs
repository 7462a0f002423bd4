//! Error types for patch parsing, application and file handling.

use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for patcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a patch.
///
/// None of these are recoverable: whatever output was produced before the
/// error must be discarded.
#[derive(Error, Debug)]
pub enum Error {
    /// Opening, reading, seeking or writing a file failed.
    #[error("{}: {source}", .path.display())]
    Io {
        /// The file the operation was performed on.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The patch ended before the 24-byte header was complete.
    #[error("corrupt patch: truncated header")]
    Truncated,

    /// The first 16 bytes are not `ENDSLEY/BSDIFF43`.
    #[error("corrupt patch: bad magic")]
    BadMagic,

    /// The declared target size is negative or cannot be addressed.
    #[error("corrupt patch: invalid target size {0}")]
    InvalidSize(i64),

    /// The control source could not deliver the requested bytes.
    #[error("corrupt patch: control stream: {0}")]
    Stream(#[source] io::Error),

    /// A control instruction would write outside the target buffer.
    #[error("corrupt patch: instruction ({add}, {copy}) at {pos} exceeds target size {size}")]
    Bounds {
        /// Diff length of the offending instruction.
        add: i64,
        /// Extra length of the offending instruction.
        copy: i64,
        /// Target cursor when the instruction was read.
        pos: u64,
        /// Declared target size.
        size: u64,
    },

    /// Writing a generated patch failed.
    #[error("cannot write patch: {0}")]
    Write(#[source] io::Error),

    /// A buffer of the requested size could not be reserved.
    #[error("cannot allocate {size} bytes: {source}")]
    Allocation {
        /// Requested size in bytes.
        size: u64,
        #[source]
        source: TryReserveError,
    },

    /// A value is out of the range of the sign-magnitude encoding, or the
    /// instructions handed to the packer do not describe the target.
    #[error("cannot encode patch: {0}")]
    Overflow(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Non-zero status reported through [`crate::file::apply_patch`].
    pub fn status(&self) -> i32 {
        match self {
            Error::Io { .. } | Error::Write(_) => 1,
            Error::Truncated | Error::BadMagic | Error::InvalidSize(_) => 2,
            Error::Stream(_) => 3,
            Error::Bounds { .. } | Error::Overflow(_) => 4,
            Error::Allocation { .. } => 5,
        }
    }

    /// Whether the patch itself is malformed, as opposed to the environment
    /// failing around it.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Error::Truncated
                | Error::BadMagic
                | Error::InvalidSize(_)
                | Error::Stream(_)
                | Error::Bounds { .. }
        )
    }
}
