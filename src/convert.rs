use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_32_ISO_HDLC};
use log::debug;

use crate::error::{Error, ValidationError};
use crate::parser::parse_file;
use crate::record::RecordType;
use crate::writer::{AddressSize, SrecWriter};

/// Called after each converted chunk with `(bytes_processed, total_bytes)`;
/// returning `false` cancels the conversion with an error.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u64, u64) -> bool;

/// Convert a seekable binary input into an S-record file.
///
/// The input's total length is probed by seeking so progress can be
/// reported against it; if probing fails the total is reported as 0.
pub fn bin_to_srec<R: Read + Seek>(
    mut input: R,
    output: &Path,
    address_size: AddressSize,
    start_address: u32,
    want_checksum: bool,
    progress: Option<ProgressCallback>,
    chunk_size: usize,
) -> Result<(), Error> {
    let total_bytes = stream_len(&mut input).unwrap_or(0);

    convert_reader(
        input,
        total_bytes,
        output,
        address_size,
        start_address,
        want_checksum,
        progress,
        chunk_size,
    )
}

/// Convert a non-seekable binary input; progress is reported with a total
/// of zero.
pub fn bin_to_srec_stream<R: Read>(
    input: R,
    output: &Path,
    address_size: AddressSize,
    start_address: u32,
    want_checksum: bool,
    progress: Option<ProgressCallback>,
    chunk_size: usize,
) -> Result<(), Error> {
    convert_reader(
        input,
        0,
        output,
        address_size,
        start_address,
        want_checksum,
        progress,
        chunk_size,
    )
}

fn convert_reader<R: Read>(
    mut input: R,
    total_bytes: u64,
    output: &Path,
    address_size: AddressSize,
    start_address: u32,
    want_checksum: bool,
    mut progress: Option<ProgressCallback>,
    chunk_size: usize,
) -> Result<(), Error> {
    let mut writer = SrecWriter::create(output, address_size, start_address)?;

    // never emit a record above the per-record payload ceiling, whatever
    // the caller asked for
    let chunk_size = chunk_size.min(writer.max_payload_bytes_per_record()).max(1);

    let crc = Crc::<u32>::new(&CRC_32_ISO_HDLC);
    let mut digest = crc.digest();
    let mut buffer = vec![0u8; chunk_size];
    let mut bytes_processed: u64 = 0;

    loop {
        let read = fill_chunk(&mut input, &mut buffer).map_err(|source| Error::File {
            path: PathBuf::new(),
            source,
        })?;

        if read == 0 {
            break;
        }

        writer.write_payload(&buffer[..read])?;

        if want_checksum {
            digest.update(&buffer[..read]);
        }

        bytes_processed += read as u64;

        if let Some(callback) = progress.as_mut() {
            if !callback(bytes_processed, total_bytes) {
                return Err(ValidationError::Cancelled.into());
            }
        }
    }

    writer.write_count()?;
    writer.write_termination()?;
    writer.close()?;

    debug!(
        "converted {} bytes into {} data records at {}",
        bytes_processed,
        writer.record_count(),
        output.display()
    );

    if want_checksum {
        write_checksum_header(output, address_size, digest.finalize())?;
    }

    Ok(())
}

/// Prepend an S0 record holding `sum` to the S-record file at `path`.
///
/// The header goes into a fresh `<path>.tmp` file, the existing body is
/// appended after it, and the result is renamed over `path`; the rename is
/// the only externally visible step. The header payload is the four CRC
/// bytes big-endian followed by one zero byte.
pub fn write_checksum_header(
    path: &Path,
    address_size: AddressSize,
    sum: u32,
) -> Result<(), Error> {
    let tmp = tmp_path(path);

    let mut header = sum.to_be_bytes().to_vec();
    header.push(0);

    let mut writer = SrecWriter::create(&tmp, address_size, 0)?;
    writer.write_header(&header)?;
    writer.close()?;

    {
        let mut body = File::open(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;

        let mut out = OpenOptions::new()
            .append(true)
            .open(&tmp)
            .map_err(|source| Error::File {
                path: tmp.clone(),
                source,
            })?;

        io::copy(&mut body, &mut out).map_err(|source| Error::File {
            path: tmp.clone(),
            source,
        })?;
    }

    fs::rename(&tmp, path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })
}

/// Rebuild a binary image from the data records of an S-record file,
/// appending each S1/S2/S3 payload to `output` in file order.
pub fn srec_to_bin(input: &Path, output: &Path) -> Result<(), Error> {
    let mut out = File::create(output).map_err(|source| Error::File {
        path: output.to_path_buf(),
        source,
    })?;

    let mut write_error = None;

    parse_file(
        input,
        |record| {
            match record.kind {
                RecordType::S1 | RecordType::S2 | RecordType::S3 => {
                    if let Err(source) = out.write_all(&record.data) {
                        write_error = Some(source);
                        return false;
                    }
                }
                _ => {}
            }

            true
        },
        false,
    )?;

    if let Some(source) = write_error {
        return Err(Error::File {
            path: output.to_path_buf(),
            source,
        });
    }

    out.flush().map_err(|source| Error::File {
        path: output.to_path_buf(),
        source,
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    tmp.into()
}

fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;
    Ok(len)
}

// `istream::read` semantics: keep reading until the buffer is full or the
// input is exhausted, so every record but the last carries a full chunk.
fn fill_chunk<R: Read>(input: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buffer.len() {
        match input.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}
