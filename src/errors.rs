//! Error taxonomy for the two failure domains spec.md §7 distinguishes:
//! connection-fatal framing faults and request-local command faults.
//!
//! Grounded on `src/types/errors.rs`'s style in the teacher crate: a plain
//! enum, a hand-rolled `Display`, and `impl std::error::Error for ... {}`
//! with no derive-macro error crate.

use std::fmt;

/// Connection-fatal faults from request parsing (spec.md §4.5, §7). The
/// connection transitions to `CLOSED`; no reply is emitted.
#[derive(Debug, PartialEq, Eq)]
pub enum FramingError {
    /// Declared `total_len` exceeds the 4096-byte message cap.
    MessageTooLong,
    /// `argc` exceeds the 1024-argument cap.
    TooManyArgs,
    /// An argument's declared size runs past the end of the message.
    Truncated,
    /// Bytes remained after parsing every declared argument.
    TrailingGarbage,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::MessageTooLong => write!(f, "message exceeds the 4096-byte cap"),
            FramingError::TooManyArgs => write!(f, "argc exceeds the 1024-argument cap"),
            FramingError::Truncated => write!(f, "argument runs past the end of the message"),
            FramingError::TrailingGarbage => {
                write!(f, "trailing bytes after the last declared argument")
            }
        }
    }
}

impl std::error::Error for FramingError {}

/// Request-local command faults (spec.md §4.6, §7). The dispatcher turns
/// these into a tagged `Reply::Err`; the connection stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Unknown,
    TooBig,
    Type,
    Arg,
}

impl CommandError {
    /// The wire error code of spec.md §4.6.
    pub fn code(self) -> i32 {
        match self {
            CommandError::Unknown => 1,
            CommandError::TooBig => 2,
            CommandError::Type => 3,
            CommandError::Arg => 4,
        }
    }

    pub fn message(self) -> &'static [u8] {
        match self {
            CommandError::Unknown => b"Unknown cmd",
            CommandError::TooBig => b"response is too big",
            CommandError::Type => b"wrong type for this operation",
            CommandError::Arg => b"bad argument",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", String::from_utf8_lossy(self.message()), self.code())
    }
}

impl std::error::Error for CommandError {}
