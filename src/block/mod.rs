// src/block/mod.rs
//! IEEE-488.2 definite-length binary blocks.
//!
//! ```text
//! #<n><length: n ASCII digits><payload: length bytes>
//! ```
//!
//! `n` is a single digit 1..=9 giving the number of length digits. The
//! indefinite-length form (`#0`) is not supported.

use crate::error::{PdwError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, Read};

/// Parsed block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Bytes occupied by `#`, the digit count and the length digits
    pub header_len: usize,
    pub payload_len: usize,
}

impl BlockHeader {
    pub const MARKER: u8 = b'#';
    pub const MAX_DIGITS: usize = 9;

    pub fn for_payload(payload_len: usize) -> Result<Self> {
        let digits = decimal_digits(payload_len);
        if digits > Self::MAX_DIGITS {
            return Err(PdwError::Framing(format!(
                "payload of {} bytes needs {} length digits, at most {} are allowed",
                payload_len,
                digits,
                Self::MAX_DIGITS
            )));
        }
        Ok(BlockHeader {
            header_len: 2 + digits,
            payload_len,
        })
    }

    /// Parse a header at the start of `data`
    ///
    /// Returns `Ok(None)` if `data` does not yet hold the complete header.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        let Some(&marker) = data.first() else {
            return Ok(None);
        };
        if marker != Self::MARKER {
            return Err(PdwError::Framing(format!("expected '#', found byte 0x{:02X}", marker)));
        }
        let Some(&count) = data.get(1) else {
            return Ok(None);
        };
        let digits = digit_count(count)?;
        let Some(length) = data.get(2..2 + digits) else {
            return Ok(None);
        };
        Ok(Some(BlockHeader {
            header_len: 2 + digits,
            payload_len: parse_length(length)?,
        }))
    }

    pub fn frame_len(&self) -> usize {
        self.header_len + self.payload_len
    }

    fn write_to(&self, buffer: &mut BytesMut) {
        let length = self.payload_len.to_string();
        buffer.put_u8(Self::MARKER);
        buffer.put_u8(b'0' + length.len() as u8);
        buffer.put_slice(length.as_bytes());
    }
}

/// Encoder/decoder for the binary block framing used on the command channel
///
/// # Example
///
/// ```
/// use pdw_rs::block::BlockCodec;
/// use std::io::Cursor;
///
/// let frame = BlockCodec::encode(b"hello").unwrap();
/// assert_eq!(&frame[..], b"#15hello");
///
/// let payload = BlockCodec::decode(&mut Cursor::new(frame)).unwrap();
/// assert_eq!(payload, b"hello");
/// ```
pub struct BlockCodec;

impl BlockCodec {
    const INITIAL_CAPACITY: usize = 64 * 1024;

    pub fn encode(payload: &[u8]) -> Result<Bytes> {
        let header = BlockHeader::for_payload(payload.len())?;
        let mut buffer = BytesMut::with_capacity(header.frame_len());
        header.write_to(&mut buffer);
        buffer.put_slice(payload);
        Ok(buffer.freeze())
    }

    /// Append a complete frame for `payload` to `buffer`
    pub fn encode_into(payload: &[u8], buffer: &mut BytesMut) -> Result<()> {
        let header = BlockHeader::for_payload(payload.len())?;
        buffer.reserve(header.frame_len());
        header.write_to(buffer);
        buffer.put_slice(payload);
        Ok(())
    }

    /// Read one frame from `reader`, however many reads that takes
    pub fn decode<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
        let mut prefix = [0u8; 2];
        let got = read_full(reader, &mut prefix)?;
        if got > 0 && prefix[0] != BlockHeader::MARKER {
            return Err(PdwError::Framing(format!("expected '#', found byte 0x{:02X}", prefix[0])));
        }
        if got < prefix.len() {
            return Err(PdwError::Framing("stream ended inside the block header".into()));
        }

        let digits = digit_count(prefix[1])?;
        let mut length = [0u8; BlockHeader::MAX_DIGITS];
        if read_full(reader, &mut length[..digits])? < digits {
            return Err(PdwError::Framing("stream ended inside the block length".into()));
        }
        let payload_len = parse_length(&length[..digits])?;

        // Grow with the data actually received, not the advertised length
        let mut payload = Vec::with_capacity(payload_len.min(Self::INITIAL_CAPACITY));
        let received = (&mut *reader).take(payload_len as u64).read_to_end(&mut payload)?;
        if received < payload_len {
            return Err(PdwError::TruncatedFrame {
                expected: payload_len,
                received,
            });
        }

        Ok(payload)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
///
/// Returns the number of bytes read; anything short of `buf.len()` means the
/// stream closed.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn digit_count(byte: u8) -> Result<usize> {
    match byte {
        b'1'..=b'9' => Ok((byte - b'0') as usize),
        b'0' => Err(PdwError::Framing("indefinite-length blocks (#0) are not supported".into())),
        other => Err(PdwError::Framing(format!("invalid length digit count 0x{:02X}", other))),
    }
}

fn parse_length(digits: &[u8]) -> Result<usize> {
    digits.iter().try_fold(0usize, |acc, &d| {
        if d.is_ascii_digit() {
            Ok(acc * 10 + (d - b'0') as usize)
        } else {
            Err(PdwError::Framing(format!(
                "invalid block length {:?}",
                String::from_utf8_lossy(digits)
            )))
        }
    })
}

fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
