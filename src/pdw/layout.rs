// src/pdw/layout.rs
//! Fixed-width record layout, version 1.
//!
//! Every record is serialized by walking [`RECORD_LAYOUT`] in order, and
//! parsed by walking the same table, so the two directions can not drift
//! apart. All multi-byte values are little-endian.
//!
//! | offset | field           | encoding                                 |
//! |-------:|-----------------|------------------------------------------|
//! | 0      | operation       | u8                                       |
//! | 1      | control flags   | u8, bit 0 continuous phase, bit 1 RF off |
//! | 2      | marker mask     | u16                                      |
//! | 4      | waveform index  | u32                                      |
//! | 8      | time offset     | u64, picoseconds                         |
//! | 16     | frequency       | f64, Hz                                  |
//! | 24     | phase           | f32, degrees                             |
//! | 28     | power           | f32, dBm                                 |
//! | 32     | wfm marker mask | u8                                       |
//! | 33     | reserved        | 7 zero bytes                             |

use crate::error::{PdwError, Result};
use crate::pdw::record::PdwRecord;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};

/// A record field as it appears in the binary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Operation,
    Controls,
    Markers,
    WaveformIndex,
    TimeOffset,
    Frequency,
    Phase,
    Power,
    WfmMarkers,
    Reserved,
}

/// Binary encoding of one field
///
/// Field values travel between the record and the row as raw `u64` bits;
/// floats use their IEEE-754 bit patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Zero(usize),
}

impl Encoding {
    pub const fn width(&self) -> usize {
        match self {
            Encoding::U8 => 1,
            Encoding::U16 => 2,
            Encoding::U32 | Encoding::F32 => 4,
            Encoding::U64 | Encoding::F64 => 8,
            Encoding::Zero(n) => *n,
        }
    }

    fn put(&self, buffer: &mut BytesMut, raw: u64) {
        match self {
            Encoding::U8 => buffer.put_u8(raw as u8),
            Encoding::U16 => buffer.put_u16_le(raw as u16),
            Encoding::U32 | Encoding::F32 => buffer.put_u32_le(raw as u32),
            Encoding::U64 | Encoding::F64 => buffer.put_u64_le(raw),
            Encoding::Zero(n) => buffer.put_bytes(0, *n),
        }
    }

    fn get(&self, data: &[u8]) -> u64 {
        match self {
            Encoding::U8 => data[0] as u64,
            Encoding::U16 => LittleEndian::read_u16(data) as u64,
            Encoding::U32 | Encoding::F32 => LittleEndian::read_u32(data) as u64,
            Encoding::U64 | Encoding::F64 => LittleEndian::read_u64(data),
            Encoding::Zero(n) => data[..*n].iter().fold(0, |acc, &b| acc | b as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub encoding: Encoding,
}

const fn spec(field: Field, encoding: Encoding) -> FieldSpec {
    FieldSpec { field, encoding }
}

pub const LAYOUT_VERSION: u32 = 1;

pub const RECORD_LAYOUT: [FieldSpec; 10] = [
    spec(Field::Operation, Encoding::U8),
    spec(Field::Controls, Encoding::U8),
    spec(Field::Markers, Encoding::U16),
    spec(Field::WaveformIndex, Encoding::U32),
    spec(Field::TimeOffset, Encoding::U64),
    spec(Field::Frequency, Encoding::F64),
    spec(Field::Phase, Encoding::F32),
    spec(Field::Power, Encoding::F32),
    spec(Field::WfmMarkers, Encoding::U8),
    spec(Field::Reserved, Encoding::Zero(7)),
];

/// Width in bytes of one serialized record
pub const RECORD_WIDTH: usize = layout_width(&RECORD_LAYOUT);

const fn layout_width(layout: &[FieldSpec]) -> usize {
    let mut width = 0;
    let mut i = 0;
    while i < layout.len() {
        width += layout[i].encoding.width();
        i += 1;
    }
    width
}

/// Byte offset of `field` within a row
pub fn field_offset(field: Field) -> Option<usize> {
    let mut offset = 0;
    for spec in RECORD_LAYOUT.iter() {
        if spec.field == field {
            return Some(offset);
        }
        offset += spec.encoding.width();
    }
    None
}

pub(crate) fn encode_record(record: &PdwRecord, buffer: &mut BytesMut) {
    buffer.reserve(RECORD_WIDTH);
    for spec in RECORD_LAYOUT.iter() {
        spec.encoding.put(buffer, record.raw_field(spec.field));
    }
}

pub(crate) fn decode_record(row: &[u8]) -> Result<PdwRecord> {
    if row.len() != RECORD_WIDTH {
        return Err(PdwError::MalformedFile(format!(
            "record row is {} bytes, expected {}",
            row.len(),
            RECORD_WIDTH
        )));
    }

    let mut record = PdwRecord::default();
    let mut offset = 0;
    for spec in RECORD_LAYOUT.iter() {
        let raw = spec.encoding.get(&row[offset..]);
        record.set_raw_field(spec.field, raw)?;
        offset += spec.encoding.width();
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarkerMask, Operation, PhaseMode, RfState, TimeOffset, WfmMarkerMask};

    #[test]
    fn test_record_width() {
        assert_eq!(RECORD_WIDTH, 40);
        assert_eq!(field_offset(Field::Operation), Some(0));
        assert_eq!(field_offset(Field::WaveformIndex), Some(4));
        assert_eq!(field_offset(Field::TimeOffset), Some(8));
        assert_eq!(field_offset(Field::Frequency), Some(16));
        assert_eq!(field_offset(Field::WfmMarkers), Some(32));
        assert_eq!(field_offset(Field::Reserved), Some(33));
    }

    #[test]
    fn test_every_field_appears_once() {
        let fields = [
            Field::Operation,
            Field::Controls,
            Field::Markers,
            Field::WaveformIndex,
            Field::TimeOffset,
            Field::Frequency,
            Field::Phase,
            Field::Power,
            Field::WfmMarkers,
            Field::Reserved,
        ];
        for field in fields {
            let count = RECORD_LAYOUT.iter().filter(|s| s.field == field).count();
            assert_eq!(count, 1, "{:?}", field);
        }
    }

    #[test]
    fn test_row_bytes() {
        let record = PdwRecord::new(Operation::First, TimeOffset::from_micros(20).unwrap(), 3)
            .with_frequency(1e9)
            .with_markers(MarkerMask::marker(1).unwrap())
            .with_phase_mode(PhaseMode::Continuous)
            .with_rf(RfState::Off)
            .with_wfm_markers(WfmMarkerMask::all());

        let mut buffer = BytesMut::new();
        encode_record(&record, &mut buffer);

        assert_eq!(buffer.len(), RECORD_WIDTH);
        assert_eq!(buffer[0], 1);
        assert_eq!(buffer[1], 0b11);
        assert_eq!(&buffer[2..4], &[1, 0]);
        assert_eq!(&buffer[4..8], &[3, 0, 0, 0]);
        assert_eq!(LittleEndian::read_u64(&buffer[8..16]), 20_000_000);
        assert_eq!(LittleEndian::read_f64(&buffer[16..24]), 1e9);
        assert_eq!(buffer[32], 0xF);
        assert!(buffer[33..].iter().all(|&b| b == 0));

        assert_eq!(decode_record(&buffer).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_bad_rows() {
        let record = PdwRecord::new(Operation::Continue, TimeOffset::ZERO, 0);
        let mut buffer = BytesMut::new();
        encode_record(&record, &mut buffer);

        let mut bad_op = buffer.to_vec();
        bad_op[0] = 7;
        assert!(matches!(decode_record(&bad_op), Err(PdwError::MalformedFile(_))));

        let mut bad_reserved = buffer.to_vec();
        bad_reserved[39] = 1;
        assert!(decode_record(&bad_reserved).is_err());

        let mut bad_markers = buffer.to_vec();
        bad_markers[3] = 0x10;
        assert!(decode_record(&bad_markers).is_err());

        assert!(decode_record(&buffer[..39]).is_err());
    }
}
