use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, ParseErrorKind, ValidationError};
use crate::record::RecordType;

/// A record decoded from one line of S-record text.
///
/// The address/count field is widened to `u32` regardless of the record's
/// declared width. Produced per line and handed to the caller's callback;
/// the parser keeps no record state between lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub kind: RecordType,
    pub address: u32,
    pub data: Vec<u8>,
    pub checksum: u8,
    pub checksum_valid: bool,
    /// 1-based source line number.
    pub line: usize,
}

pub fn parse_line(
    line: &str,
    line_number: usize,
    validate_checksum: bool,
) -> Result<ParsedRecord, Error> {
    let parse_err = |kind| Error::Parse {
        kind,
        line: line_number,
    };

    let raw = line.as_bytes();

    if raw.is_empty() || raw[0] != b'S' {
        return Err(parse_err(ParseErrorKind::MissingPrefix));
    }

    // 'S' + type + byte count (2) + checksum (2) at minimum
    if raw.len() < 6 {
        return Err(parse_err(ParseErrorKind::TooShort));
    }

    let kind = RecordType::from_digit(raw[1] as char)
        .ok_or_else(|| parse_err(ParseErrorKind::UnknownType(raw[1] as char)))?;

    let mut count = [0u8; 1];
    hex::decode_to_slice(&raw[2..4], &mut count).map_err(|e| parse_err(hex_kind(e)))?;
    let byte_count = count[0] as usize;

    let expected = 4 + byte_count * 2;
    if raw.len() != expected {
        return Err(parse_err(ParseErrorKind::LengthMismatch {
            expected,
            found: raw.len(),
        }));
    }

    let width = kind.address_width();
    if byte_count < width + 1 {
        return Err(parse_err(ParseErrorKind::TooShort));
    }

    let body = hex::decode(&raw[4..]).map_err(|e| parse_err(hex_kind(e)))?;

    let address = body[..width]
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
    let data = body[width..byte_count - 1].to_vec();
    let recorded = body[byte_count - 1];

    if validate_checksum {
        let sum = body[..byte_count - 1]
            .iter()
            .fold(byte_count as u8, |acc, &byte| acc.wrapping_add(byte));
        let computed = !sum;

        if computed != recorded {
            return Err(ValidationError::ChecksumMismatch { computed, recorded }.into());
        }
    }

    Ok(ParsedRecord {
        kind,
        address,
        data,
        checksum: recorded,
        checksum_valid: true,
        line: line_number,
    })
}

/// Parse records line by line, handing each to `callback`.
///
/// Blank and whitespace-only lines are skipped but still advance the line
/// counter; trailing whitespace is trimmed before parsing. Returning `false`
/// from the callback stops parsing without an error.
pub fn parse_stream<R, F>(input: R, mut callback: F, validate_checksums: bool) -> Result<(), Error>
where
    R: BufRead,
    F: FnMut(ParsedRecord) -> bool,
{
    let mut line_number = 0;

    for line in input.lines() {
        line_number += 1;

        let line = line.map_err(|source| Error::File {
            path: PathBuf::new(),
            source,
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let record = parse_line(line.trim_end(), line_number, validate_checksums)?;

        if !callback(record) {
            break;
        }
    }

    Ok(())
}

pub fn parse_file<P, F>(path: P, callback: F, validate_checksums: bool) -> Result<(), Error>
where
    P: AsRef<Path>,
    F: FnMut(ParsedRecord) -> bool,
{
    let path = path.as_ref();

    let file = File::open(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;

    match parse_stream(BufReader::new(file), callback, validate_checksums) {
        // read failures inside the stream loop have no path; add ours
        Err(Error::File { path: p, source }) if p.as_os_str().is_empty() => Err(Error::File {
            path: path.to_path_buf(),
            source,
        }),
        result => result,
    }
}

fn hex_kind(error: hex::FromHexError) -> ParseErrorKind {
    match error {
        hex::FromHexError::InvalidHexCharacter { c, .. } => ParseErrorKind::InvalidHexDigit(c),
        _ => ParseErrorKind::TooShort,
    }
}
