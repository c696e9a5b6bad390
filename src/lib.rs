//! Motorola S-record encoding and decoding.
//!
//! Records are modeled by [`Srec`]; [`SrecWriter`] emits them to a file
//! with address and count bookkeeping, [`parse_stream`]/[`parse_file`]
//! decode them back with per-record callbacks, and [`bin_to_srec`]/
//! [`srec_to_bin`] stream whole binary images in and out of the format.

mod checksum;
mod convert;
mod error;
mod parser;
mod record;
mod writer;

pub use convert::{
    bin_to_srec, bin_to_srec_stream, srec_to_bin, write_checksum_header, ProgressCallback,
};
pub use error::{Error, ParseErrorKind, ValidationError};
pub use parser::{parse_file, parse_line, parse_stream, ParsedRecord};
pub use record::{RecordType, Srec};
pub use writer::{AddressSize, SrecWriter};
