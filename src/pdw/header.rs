// src/pdw/header.rs
use crate::error::{PdwError, Result};
use crate::pdw::layout::{LAYOUT_VERSION, RECORD_WIDTH};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};
use std::io::{Cursor, Read};

/// PDW file header metadata
///
/// Serialized little-endian at the start of the file and zero-padded to
/// exactly [`PdwHeader::SIZE`] bytes:
///
/// | offset | field                        | encoding    |
/// |-------:|------------------------------|-------------|
/// | 0      | magic `PDWF`                 | 4 bytes     |
/// | 4      | format version               | u32         |
/// | 8      | header size                  | u32         |
/// | 12     | record width                 | u32         |
/// | 16     | record count                 | u64         |
/// | 24     | body length                  | u64         |
/// | 32     | waveform count               | u32         |
/// | 36     | reserved                     | u32         |
/// | 40     | association file name length | u32         |
/// | 44     | association file name        | UTF-8       |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdwHeader {
    pub version: u32,
    pub record_count: u64,
    pub body_len: u64,
    /// Number of entries in the waveform index the records were validated against
    pub waveform_count: u32,
    /// Association file the records' waveform indices refer to
    pub index_name: String,
}

impl PdwHeader {
    pub const SIZE: usize = 4096;
    pub const MAGIC: &'static [u8; 4] = b"PDWF";
    pub const VERSION: u32 = LAYOUT_VERSION;
    pub const MAX_NAME_LEN: usize = 256;
    const FIXED_FIELDS_LEN: usize = 44;

    pub fn new(record_count: u64, waveform_count: u32, index_name: impl Into<String>) -> Self {
        PdwHeader {
            version: Self::VERSION,
            record_count,
            body_len: record_count * RECORD_WIDTH as u64,
            waveform_count,
            index_name: index_name.into(),
        }
    }

    /// Append exactly `SIZE` bytes to `buffer`
    pub(crate) fn write_to(&self, buffer: &mut BytesMut) -> Result<()> {
        let name = self.index_name.as_bytes();
        if name.len() > Self::MAX_NAME_LEN {
            return Err(PdwError::InvalidParameter(format!(
                "association file name is {} bytes, at most {} fit the header",
                name.len(),
                Self::MAX_NAME_LEN
            )));
        }

        let start = buffer.len();
        buffer.reserve(Self::SIZE);
        buffer.put_slice(Self::MAGIC);
        buffer.put_u32_le(self.version);
        buffer.put_u32_le(Self::SIZE as u32);
        buffer.put_u32_le(RECORD_WIDTH as u32);
        buffer.put_u64_le(self.record_count);
        buffer.put_u64_le(self.body_len);
        buffer.put_u32_le(self.waveform_count);
        buffer.put_u32_le(0);
        buffer.put_u32_le(name.len() as u32);
        buffer.put_slice(name);

        let written = buffer.len() - start;
        buffer.put_bytes(0, Self::SIZE - written);
        Ok(())
    }

    pub fn read_from(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(PdwError::MalformedFile(format!(
                "header needs {} bytes, found {}",
                Self::SIZE,
                data.len()
            )));
        }

        let mut cursor = Cursor::new(&data[..Self::SIZE]);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(PdwError::MalformedFile(format!(
                "invalid magic {:?}",
                String::from_utf8_lossy(&magic)
            )));
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        if version != Self::VERSION {
            return Err(PdwError::MalformedFile(format!("unsupported format version {}", version)));
        }
        let header_size = cursor.read_u32::<LittleEndian>()?;
        if header_size as usize != Self::SIZE {
            return Err(PdwError::MalformedFile(format!("unexpected header size {}", header_size)));
        }
        let record_width = cursor.read_u32::<LittleEndian>()?;
        if record_width as usize != RECORD_WIDTH {
            return Err(PdwError::MalformedFile(format!("unexpected record width {}", record_width)));
        }

        let record_count = cursor.read_u64::<LittleEndian>()?;
        let body_len = cursor.read_u64::<LittleEndian>()?;
        if record_count.checked_mul(RECORD_WIDTH as u64) != Some(body_len) {
            return Err(PdwError::MalformedFile(format!(
                "{} records can not occupy {} body bytes",
                record_count, body_len
            )));
        }

        let waveform_count = cursor.read_u32::<LittleEndian>()?;
        let _reserved = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u32::<LittleEndian>()? as usize;
        if name_len > Self::MAX_NAME_LEN {
            return Err(PdwError::MalformedFile(format!("association file name length {}", name_len)));
        }
        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name)?;
        let index_name = String::from_utf8(name)
            .map_err(|_| PdwError::MalformedFile("association file name is not UTF-8".into()))?;

        let padding_start = Self::FIXED_FIELDS_LEN + name_len;
        if data[padding_start..Self::SIZE].iter().any(|&b| b != 0) {
            return Err(PdwError::MalformedFile("header padding is not zero".into()));
        }

        Ok(PdwHeader {
            version,
            record_count,
            body_len,
            waveform_count,
            index_name,
        })
    }
}
