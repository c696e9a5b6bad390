use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, ValidationError};
use crate::record::Srec;

/// Address field width used for the data and termination records of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSize {
    Bits16,
    Bits24,
    Bits32,
}

impl AddressSize {
    /// Address field width in bytes.
    pub fn width(self) -> usize {
        match self {
            AddressSize::Bits16 => 2,
            AddressSize::Bits24 => 3,
            AddressSize::Bits32 => 4,
        }
    }
}

const MAX_RECORD_COUNT: u32 = 1_000_000;

/// A write session for one S-record file.
///
/// Tracks the current write address (advanced by each payload) and the
/// number of data records written. The execution address carried by the
/// termination record is fixed at creation. Not safe for concurrent use.
pub struct SrecWriter {
    path: PathBuf,
    file: Option<File>,
    address: u32,
    exec_address: u32,
    address_size: AddressSize,
    record_count: u32,
}

impl SrecWriter {
    /// Create (or truncate) `path` and bind a write session to it.
    pub fn create(
        path: impl Into<PathBuf>,
        address_size: AddressSize,
        start_address: u32,
    ) -> Result<SrecWriter, Error> {
        let path = path.into();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| Error::File {
                path: path.clone(),
                source,
            })?;

        debug!("writing S-records to {}", path.display());

        Ok(SrecWriter {
            path,
            file: Some(file),
            address: start_address,
            exec_address: start_address,
            address_size,
            record_count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn address_size(&self) -> AddressSize {
        self.address_size
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Largest payload that fits in one data record at this address width:
    /// 249, 247, and 245 bytes for 16, 24, and 32 bits.
    pub fn max_payload_bytes_per_record(&self) -> usize {
        // 255 minus the byte count, the address field as hex digits, and
        // the checksum
        255 - 1 - 2 * self.address_size.width() - 1
    }

    /// Append one S0 record holding `header` verbatim.
    pub fn write_header(&mut self, header: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        self.write_record(&Srec::s0(header.to_vec()))
    }

    /// Append one S0 record per string, each hex-encoded first.
    pub fn write_header_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<(), Error> {
        self.ensure_open()?;

        for line in lines {
            let encoded = hex::encode_upper(line.as_ref().as_bytes());
            self.write_record(&Srec::s0(encoded.into_bytes()))?;
        }

        Ok(())
    }

    /// Append a data record carrying `data` at the current write address.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;

        if self.record_count >= MAX_RECORD_COUNT {
            return Err(ValidationError::TooManyRecords {
                count: self.record_count,
                max: MAX_RECORD_COUNT,
            }
            .into());
        }

        if !data.is_empty() && u64::from(self.address) + data.len() as u64 > u64::from(u32::MAX) {
            return Err(ValidationError::AddressRange {
                value: u64::from(self.address) + data.len() as u64,
                max: u64::from(u32::MAX),
            }
            .into());
        }

        let record = match self.address_size {
            AddressSize::Bits16 => Srec::s1(self.address, data.to_vec())?,
            AddressSize::Bits24 => Srec::s2(self.address, data.to_vec())?,
            AddressSize::Bits32 => Srec::s3(self.address, data.to_vec()),
        };

        self.write_record(&record)?;
        self.record_count += 1;
        self.address += data.len() as u32;

        Ok(())
    }

    /// Append the count record: S5 while the count fits 16 bits, S6 beyond.
    pub fn write_count(&mut self) -> Result<(), Error> {
        self.ensure_open()?;

        let record = if self.record_count <= 0xFFFF {
            Srec::s5(self.record_count)?
        } else {
            Srec::s6(self.record_count)?
        };

        self.write_record(&record)
    }

    /// Append the termination record carrying the execution address.
    pub fn write_termination(&mut self) -> Result<(), Error> {
        self.ensure_open()?;

        let record = match self.address_size {
            AddressSize::Bits16 => Srec::s9(self.exec_address)?,
            AddressSize::Bits24 => Srec::s8(self.exec_address)?,
            AddressSize::Bits32 => Srec::s7(self.exec_address),
        };

        self.write_record(&record)
    }

    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(mut file) = self.file.take() {
            debug!(
                "closing {} after {} data records",
                self.path.display(),
                self.record_count
            );

            file.flush().map_err(|source| Error::File {
                path: self.path.clone(),
                source,
            })?;
        }

        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.file.is_some() {
            Ok(())
        } else {
            Err(Error::File {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::Other, "file is not open"),
            })
        }
    }

    fn write_record(&mut self, record: &Srec) -> Result<(), Error> {
        let line = record.render()?;

        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                return Err(Error::File {
                    path: self.path.clone(),
                    source: io::Error::new(io::ErrorKind::Other, "file is not open"),
                })
            }
        };

        let result = writeln!(file, "{}", line).and_then(|_| file.flush());

        result.map_err(|source| Error::File {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for SrecWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn writes_data_records_at_each_width() {
        let dir = tempfile::tempdir().unwrap();
        let data = [0x01, 0x02, 0x03, 0x04];

        let path = dir.path().join("out16.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        writer.write_payload(&data).unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S107000001020304EE"]);

        let path = dir.path().join("out24.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits24, 0).unwrap();
        writer.write_payload(&data).unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S20800000001020304ED"]);

        let path = dir.path().join("out32.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits32, 0).unwrap();
        writer.write_payload(&data).unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S3090000000001020304EC"]);
    }

    #[test]
    fn advances_the_write_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0x1000).unwrap();
        writer.write_payload(&[0x01, 0x02, 0x03]).unwrap();
        writer.write_payload(&[0x04]).unwrap();
        writer.close().unwrap();

        assert_eq!(
            read_lines(&path),
            vec!["S1061000010203E3", "S104100304E4"]
        );
    }

    #[test]
    fn writes_full_record_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0x1000).unwrap();
        writer.write_payload(&[0x01, 0x02, 0x03]).unwrap();
        writer.write_payload(&[0x04, 0x05, 0x06]).unwrap();
        writer.write_count().unwrap();
        writer.write_termination().unwrap();
        writer.close().unwrap();

        assert_eq!(
            read_lines(&path),
            vec![
                "S1061000010203E3",
                "S1061003040506D7",
                "S5030002FA",
                "S9031000EC",
            ]
        );
    }

    #[test]
    fn writes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits32, 0).unwrap();
        writer.write_header(b"TEST").unwrap();
        writer.close().unwrap();

        assert_eq!(read_lines(&path), vec!["S007000054455354B8"]);
    }

    #[test]
    fn writes_one_header_record_per_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits32, 0).unwrap();
        writer.write_header_lines(&["TEST", "v1"]).unwrap();
        writer.close().unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        // the payload is the ASCII of the hex encoding of "TEST"
        assert_eq!(lines[0], "S00B0000353434353533353451");
        assert!(lines[1].starts_with("S0070000"));
    }

    #[test]
    fn selects_count_record_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        writer.write_payload(&[0xAA]).unwrap();
        writer.write_count().unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path)[1], "S5030001FB");

        // force a count past the S5 ceiling
        let path = dir.path().join("big.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        writer.record_count = 0x10000;
        writer.write_count().unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S604010000FA"]);
    }

    #[test]
    fn termination_matches_address_size() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("out32.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits32, 0).unwrap();
        writer.write_termination().unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S70500000000FA"]);

        let path = dir.path().join("out16.srec");
        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0x1234).unwrap();
        writer.write_termination().unwrap();
        writer.close().unwrap();
        assert_eq!(read_lines(&path), vec!["S9031234B6"]);
    }

    #[test]
    fn max_payload_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        assert_eq!(writer.max_payload_bytes_per_record(), 249);

        let writer = SrecWriter::create(&path, AddressSize::Bits24, 0).unwrap();
        assert_eq!(writer.max_payload_bytes_per_record(), 247);

        let writer = SrecWriter::create(&path, AddressSize::Bits32, 0).unwrap();
        assert_eq!(writer.max_payload_bytes_per_record(), 245);
    }

    #[test]
    fn rejects_writes_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        writer.close().unwrap();

        assert!(!writer.is_open());
        assert!(matches!(
            writer.write_payload(&[0x01]),
            Err(Error::File { .. })
        ));
        assert!(matches!(writer.write_count(), Err(Error::File { .. })));
        assert!(matches!(writer.write_termination(), Err(Error::File { .. })));
        assert!(matches!(writer.write_header(b"X"), Err(Error::File { .. })));

        // closing twice is fine
        writer.close().unwrap();
    }

    #[test]
    fn enforces_the_record_count_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0).unwrap();
        writer.record_count = MAX_RECORD_COUNT;

        assert!(matches!(
            writer.write_payload(&[0x01]),
            Err(Error::Validation(ValidationError::TooManyRecords {
                count: MAX_RECORD_COUNT,
                max: MAX_RECORD_COUNT,
            }))
        ));
    }

    #[test]
    fn rejects_address_space_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits32, 0xFFFF_FFFE).unwrap();

        assert!(matches!(
            writer.write_payload(&[1, 2, 3, 4]),
            Err(Error::Validation(ValidationError::AddressRange { .. }))
        ));

        // a write that stays inside the address space is fine
        writer.write_payload(&[0xAA]).unwrap();
    }

    #[test]
    fn data_outgrowing_a_16_bit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srec");

        let mut writer = SrecWriter::create(&path, AddressSize::Bits16, 0xFFFF).unwrap();
        writer.write_payload(&[0x01]).unwrap();

        // the write address is now 0x10000, out of S1 range
        assert!(matches!(
            writer.write_payload(&[0x02]),
            Err(Error::Validation(ValidationError::AddressRange { .. }))
        ));
    }

    #[test]
    fn create_fails_with_the_offending_path() {
        let result = SrecWriter::create(
            "missing_directory/out.srec",
            AddressSize::Bits32,
            0,
        );

        match result {
            Err(Error::File { path, .. }) => {
                assert_eq!(path, Path::new("missing_directory/out.srec"));
            }
            _ => panic!("expected a file error"),
        }
    }
}
