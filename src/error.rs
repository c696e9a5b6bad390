use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Structural problems that stop a line from being decoded at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("line does not start with 'S'")]
    MissingPrefix,
    #[error("record is too short")]
    TooShort,
    #[error("unknown record type 'S{0}'")]
    UnknownType(char),
    #[error("line length {found} does not match declared byte count (expected {expected})")]
    LengthMismatch { expected: usize, found: usize },
    #[error("invalid hex digit '{0}'")]
    InvalidHexDigit(char),
}

/// Constraint violations in records that are structurally well formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("checksum mismatch: computed {computed:#04X}, recorded {recorded:#04X}")]
    ChecksumMismatch { computed: u8, recorded: u8 },
    #[error("address {value:#X} exceeds maximum {max:#X}")]
    AddressRange { value: u64, max: u64 },
    #[error("record data of {size} bytes exceeds maximum {max}")]
    DataTooLarge { size: usize, max: usize },
    #[error("record count {count} has reached the limit of {max}")]
    TooManyRecords { count: u32, max: u32 },
    #[error("conversion cancelled by caller")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("line {line}: {kind}")]
    Parse { kind: ParseErrorKind, line: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}: {}", .path.display(), .source)]
    File { path: PathBuf, source: io::Error },
}
