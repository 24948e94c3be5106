// src/pdw/file.rs
use crate::error::{PdwError, Result};
use crate::pdw::header::PdwHeader;
use crate::pdw::layout::{decode_record, encode_record, RECORD_WIDTH};
use crate::pdw::record::PdwRecord;
use crate::types::TimeOffset;
use crate::waveform::FrozenIndex;
use bytes::{Bytes, BytesMut};
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
#[cfg(feature = "mmap")]
use std::fs::File;

/// Incremental PDW file builder
///
/// Every record is validated as it is pushed; a rejected record leaves the
/// encoder exactly as it was.
///
/// # Example
///
/// ```
/// use pdw_rs::prelude::*;
///
/// let mut index = WaveformIndex::new("chirps").unwrap();
/// index.append("A").unwrap();
/// let index = index.finalize();
///
/// let mut encoder = PdwEncoder::new(&index);
/// encoder.push(PdwRecord::new(Operation::First, TimeOffset::ZERO, 0)).unwrap();
/// encoder.push(PdwRecord::new(Operation::Last, TimeOffset::from_micros(10).unwrap(), 0)).unwrap();
///
/// let file = encoder.finish().unwrap();
/// assert_eq!(file.records().len(), 2);
/// ```
pub struct PdwEncoder {
    index: FrozenIndex,
    records: Vec<PdwRecord>,
    body: BytesMut,
}

impl PdwEncoder {
    pub fn new(index: &FrozenIndex) -> Self {
        Self::with_capacity(index, 0)
    }

    pub fn with_capacity(index: &FrozenIndex, records: usize) -> Self {
        PdwEncoder {
            index: index.clone(),
            records: Vec::with_capacity(records),
            body: BytesMut::with_capacity(records * RECORD_WIDTH),
        }
    }

    pub fn push(&mut self, record: PdwRecord) -> Result<()> {
        let previous = self.records.last().map(|r| r.time_offset);
        check_record(self.records.len(), &record, previous, self.index.len())?;

        encode_record(&record, &mut self.body);
        self.records.push(record);
        Ok(())
    }

    /// Push records in order, stopping at the first rejected one
    pub fn extend(&mut self, records: impl IntoIterator<Item = PdwRecord>) -> Result<()> {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn finish(self) -> Result<PdwFile> {
        let header = PdwHeader::new(self.records.len() as u64, self.index.len() as u32, self.index.file_name());

        let mut bytes = BytesMut::with_capacity(PdwHeader::SIZE + self.body.len());
        header.write_to(&mut bytes)?;
        bytes.extend_from_slice(&self.body);

        Ok(PdwFile {
            header,
            records: self.records,
            bytes: bytes.freeze(),
        })
    }
}

/// A complete PDW file: fixed-size header followed by fixed-width records
#[derive(Debug, Clone, PartialEq)]
pub struct PdwFile {
    header: PdwHeader,
    records: Vec<PdwRecord>,
    bytes: Bytes,
}

impl PdwFile {
    /// Validate the whole sequence against `index`, then encode it
    ///
    /// Nothing is encoded unless every record is valid.
    pub fn build(records: &[PdwRecord], index: &FrozenIndex) -> Result<Self> {
        let mut previous = None;
        for (position, record) in records.iter().enumerate() {
            check_record(position, record, previous, index.len())?;
            previous = Some(record.time_offset);
        }

        let mut encoder = PdwEncoder::with_capacity(index, records.len());
        encoder.extend(records.iter().copied())?;
        encoder.finish()
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse without copying `data`
    pub fn parse_bytes(data: Bytes) -> Result<Self> {
        let header = PdwHeader::read_from(&data)?;

        let body = &data[PdwHeader::SIZE..];
        if body.len() as u64 != header.body_len {
            return Err(PdwError::MalformedFile(format!(
                "header declares {} body bytes, file holds {}",
                header.body_len,
                body.len()
            )));
        }

        let mut records = Vec::with_capacity(header.record_count as usize);
        let mut previous = None;
        for (position, row) in body.chunks_exact(RECORD_WIDTH).enumerate() {
            let record = decode_record(row)?;
            check_record(position, &record, previous, header.waveform_count as usize)?;
            previous = Some(record.time_offset);
            records.push(record);
        }

        Ok(PdwFile {
            header,
            records,
            bytes: data,
        })
    }

    /// Split at the header boundary without copying
    pub fn split(&self) -> (Bytes, Bytes) {
        (self.header_bytes(), self.body_bytes())
    }

    pub fn header(&self) -> &PdwHeader {
        &self.header
    }

    pub fn records(&self) -> &[PdwRecord] {
        &self.records
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn header_bytes(&self) -> Bytes {
        self.bytes.slice(..PdwHeader::SIZE)
    }

    pub fn body_bytes(&self) -> Bytes {
        self.bytes.slice(PdwHeader::SIZE..)
    }

    /// Encoded size, header included
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// True when the file holds no records; the header is always present
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse_bytes(Bytes::from(data))
    }

    /// Parse a file through a memory map (requires "mmap" feature)
    #[cfg(feature = "mmap")]
    pub fn open_mmap(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(&mmap)
    }
}

fn check_record(position: usize, record: &PdwRecord, previous: Option<TimeOffset>, available: usize) -> Result<()> {
    record.check_values(position)?;

    if record.waveform_index as usize >= available {
        return Err(PdwError::InvalidReference {
            record: position,
            index: record.waveform_index,
            available,
        });
    }

    if let Some(previous) = previous {
        if record.time_offset < previous {
            return Err(PdwError::Ordering {
                record: position,
                previous,
                current: record.time_offset,
            });
        }
    }

    Ok(())
}
