use crate::checksum::checksum;
use crate::error::{Error, ValidationError};

/// Address and payload bytes together may not exceed this, so that the byte
/// count (fields + checksum) still fits in two hex digits.
pub(crate) const MAX_FIELD_BYTES: usize = 254;

/// Record type tag, `S0` through `S9` (`S4` is not defined by the format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    S0,
    S1,
    S2,
    S3,
    S5,
    S6,
    S7,
    S8,
    S9,
}

impl RecordType {
    /// The ASCII digit following the leading `'S'`.
    pub fn type_char(self) -> char {
        match self {
            RecordType::S0 => '0',
            RecordType::S1 => '1',
            RecordType::S2 => '2',
            RecordType::S3 => '3',
            RecordType::S5 => '5',
            RecordType::S6 => '6',
            RecordType::S7 => '7',
            RecordType::S8 => '8',
            RecordType::S9 => '9',
        }
    }

    /// Width of the address or count field in bytes.
    pub fn address_width(self) -> usize {
        match self {
            RecordType::S0 | RecordType::S1 | RecordType::S5 | RecordType::S9 => 2,
            RecordType::S2 | RecordType::S6 | RecordType::S8 => 3,
            RecordType::S3 | RecordType::S7 => 4,
        }
    }

    pub(crate) fn from_digit(digit: char) -> Option<RecordType> {
        match digit {
            '0' => Some(RecordType::S0),
            '1' => Some(RecordType::S1),
            '2' => Some(RecordType::S2),
            '3' => Some(RecordType::S3),
            '5' => Some(RecordType::S5),
            '6' => Some(RecordType::S6),
            '7' => Some(RecordType::S7),
            '8' => Some(RecordType::S8),
            '9' => Some(RecordType::S9),
            _ => None,
        }
    }
}

/// A single S-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Srec {
    /// Header record; the address field is always zero.
    S0 { data: Vec<u8> },
    /// Data record with a 16-bit address.
    S1 { address: u16, data: Vec<u8> },
    /// Data record with a 24-bit address.
    S2 { address: u32, data: Vec<u8> },
    /// Data record with a 32-bit address.
    S3 { address: u32, data: Vec<u8> },
    /// 16-bit count of data records.
    S5 { count: u16 },
    /// 24-bit count of data records.
    S6 { count: u32 },
    /// Termination record with a 32-bit execution address.
    S7 { address: u32 },
    /// Termination record with a 24-bit execution address.
    S8 { address: u32 },
    /// Termination record with a 16-bit execution address.
    S9 { address: u16 },
}

impl Srec {
    pub fn s0(data: Vec<u8>) -> Srec {
        Srec::S0 { data }
    }

    pub fn s1(address: u32, data: Vec<u8>) -> Result<Srec, Error> {
        check_range(address, 0xFFFF)?;
        Ok(Srec::S1 {
            address: address as u16,
            data,
        })
    }

    pub fn s2(address: u32, data: Vec<u8>) -> Result<Srec, Error> {
        check_range(address, 0xFF_FFFF)?;
        Ok(Srec::S2 { address, data })
    }

    pub fn s3(address: u32, data: Vec<u8>) -> Srec {
        Srec::S3 { address, data }
    }

    pub fn s5(count: u32) -> Result<Srec, Error> {
        check_range(count, 0xFFFF)?;
        Ok(Srec::S5 {
            count: count as u16,
        })
    }

    pub fn s6(count: u32) -> Result<Srec, Error> {
        check_range(count, 0xFF_FFFF)?;
        Ok(Srec::S6 { count })
    }

    pub fn s7(address: u32) -> Srec {
        Srec::S7 { address }
    }

    pub fn s8(address: u32) -> Result<Srec, Error> {
        check_range(address, 0xFF_FFFF)?;
        Ok(Srec::S8 { address })
    }

    pub fn s9(address: u32) -> Result<Srec, Error> {
        check_range(address, 0xFFFF)?;
        Ok(Srec::S9 {
            address: address as u16,
        })
    }

    pub fn kind(&self) -> RecordType {
        match self {
            Srec::S0 { .. } => RecordType::S0,
            Srec::S1 { .. } => RecordType::S1,
            Srec::S2 { .. } => RecordType::S2,
            Srec::S3 { .. } => RecordType::S3,
            Srec::S5 { .. } => RecordType::S5,
            Srec::S6 { .. } => RecordType::S6,
            Srec::S7 { .. } => RecordType::S7,
            Srec::S8 { .. } => RecordType::S8,
            Srec::S9 { .. } => RecordType::S9,
        }
    }

    pub fn type_char(&self) -> char {
        self.kind().type_char()
    }

    /// Address and payload bytes in wire order, big-endian.
    fn fields(&self) -> Vec<u8> {
        match self {
            Srec::S0 { data } => join(&[0, 0], data),
            Srec::S1 { address, data } => join(&address.to_be_bytes(), data),
            Srec::S2 { address, data } => join(&address.to_be_bytes()[1..], data),
            Srec::S3 { address, data } => join(&address.to_be_bytes(), data),
            Srec::S5 { count } => count.to_be_bytes().to_vec(),
            Srec::S6 { count } => count.to_be_bytes()[1..].to_vec(),
            Srec::S7 { address } => address.to_be_bytes().to_vec(),
            Srec::S8 { address } => address.to_be_bytes()[1..].to_vec(),
            Srec::S9 { address } => address.to_be_bytes().to_vec(),
        }
    }

    /// Format the record as a canonical S-record line, without a terminator.
    ///
    /// All hex is uppercase, fixed width, zero padded:
    /// `S` + type digit + byte count + address/count + payload + checksum.
    pub fn render(&self) -> Result<String, Error> {
        let fields = self.fields();

        if fields.len() > MAX_FIELD_BYTES {
            return Err(ValidationError::DataTooLarge {
                size: fields.len(),
                max: MAX_FIELD_BYTES,
            }
            .into());
        }

        let mut bytes = Vec::with_capacity(fields.len() + 2);
        bytes.push((fields.len() + 1) as u8);
        bytes.extend_from_slice(&fields);
        bytes.push(checksum(&bytes));

        let mut line = String::with_capacity(2 + bytes.len() * 2);
        line.push('S');
        line.push(self.type_char());
        line.push_str(&hex::encode_upper(&bytes));

        Ok(line)
    }
}

fn check_range(value: u32, max: u32) -> Result<(), Error> {
    if value > max {
        return Err(ValidationError::AddressRange {
            value: u64::from(value),
            max: u64::from(max),
        }
        .into());
    }

    Ok(())
}

fn join(prefix: &[u8], data: &[u8]) -> Vec<u8> {
    let mut fields = Vec::with_capacity(prefix.len() + data.len());
    fields.extend_from_slice(prefix);
    fields.extend_from_slice(data);
    fields
}
