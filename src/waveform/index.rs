// src/waveform/index.rs
use crate::error::{PdwError, Result};
use bytes::Bytes;
use indexmap::IndexSet;
use std::fmt::Write as _;
use std::sync::Arc;

const ASSOCIATION_HEADER: &str = "Id,Filename";

/// Append-only mapping from waveform names to the indices PDW records use
///
/// The index of a name is its position at the time it was appended. Once
/// [`finalize`](WaveformIndex::finalize) has been called no further names
/// are accepted.
///
/// # Example
///
/// ```
/// use pdw_rs::waveform::WaveformIndex;
///
/// let mut index = WaveformIndex::new("chirps").unwrap();
/// assert_eq!(index.append("A").unwrap(), 0);
/// assert_eq!(index.append("B").unwrap(), 1);
///
/// let frozen = index.finalize();
/// assert_eq!(frozen.get(1), Some("B"));
/// assert!(index.append("C").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct WaveformIndex {
    file_name: String,
    names: IndexSet<String>,
    frozen: bool,
}

impl WaveformIndex {
    pub const DEFAULT_FILE_NAME: &'static str = "windex";

    /// The file name is spliced into quoted SCPI strings, so it follows the
    /// same character rules as waveform names
    pub fn new(file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        validate_name(&file_name, "association file name")?;
        Ok(Self::unchecked(file_name))
    }

    fn unchecked(file_name: String) -> Self {
        WaveformIndex {
            file_name,
            names: IndexSet::new(),
            frozen: false,
        }
    }

    pub fn append(&mut self, name: impl Into<String>) -> Result<u32> {
        let name = name.into();

        if self.frozen {
            return Err(PdwError::IndexFrozen(name));
        }
        validate_name(&name, "waveform name")?;
        if self.names.contains(&name) {
            return Err(PdwError::DuplicateWaveform(name));
        }
        if self.names.len() >= u32::MAX as usize {
            return Err(PdwError::InvalidParameter("waveform index is full".into()));
        }

        let (position, _) = self.names.insert_full(name);
        Ok(position as u32)
    }

    /// Freeze the mapping and hand out an immutable snapshot of it
    pub fn finalize(&mut self) -> FrozenIndex {
        self.frozen = true;
        FrozenIndex {
            file_name: Arc::from(self.file_name.as_str()),
            names: Arc::new(self.names.clone()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn position(&self, name: &str) -> Option<u32> {
        self.names.get_index_of(name).map(|i| i as u32)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl Default for WaveformIndex {
    fn default() -> Self {
        Self::unchecked(Self::DEFAULT_FILE_NAME.to_string())
    }
}

/// Finalized waveform index; the only index PDW encoding accepts
#[derive(Debug, Clone)]
pub struct FrozenIndex {
    file_name: Arc<str>,
    names: Arc<IndexSet<String>>,
}

impl FrozenIndex {
    pub fn get(&self, index: u32) -> Option<&str> {
        self.names.get_index(index as usize).map(String::as_str)
    }

    pub fn position(&self, name: &str) -> Option<u32> {
        self.names.get_index_of(name).map(|i| i as u32)
    }

    pub fn contains_index(&self, index: u32) -> bool {
        (index as usize) < self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.names.iter().enumerate().map(|(i, name)| (i as u32, name.as_str()))
    }

    /// Association file: CSV header line followed by one `index,name` row per entry
    pub fn serialize(&self) -> Bytes {
        let mut text = String::with_capacity(16 + self.names.len() * 24);
        text.push_str(ASSOCIATION_HEADER);
        text.push('\n');
        for (index, name) in self.iter() {
            // Writing to a String cannot fail
            let _ = writeln!(text, "{},{}", index, name);
        }
        Bytes::from(text)
    }

    /// Parse an association file produced by [`serialize`](FrozenIndex::serialize)
    pub fn parse(file_name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| PdwError::MalformedFile("association file is not UTF-8".into()))?;
        let mut lines = text.lines();

        match lines.next() {
            Some(line) if line.trim() == ASSOCIATION_HEADER => {}
            other => {
                return Err(PdwError::MalformedFile(format!(
                    "expected association header {:?}, found {:?}",
                    ASSOCIATION_HEADER,
                    other.unwrap_or("")
                )))
            }
        }

        let mut index = WaveformIndex::new(file_name)?;
        for (row, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (id, name) = line
                .split_once(',')
                .ok_or_else(|| PdwError::MalformedFile(format!("row {} has no separator: {:?}", row, line)))?;
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| PdwError::MalformedFile(format!("row {} has a non-numeric id: {:?}", row, id)))?;

            let assigned = index.append(name).map_err(|e| match e {
                PdwError::InvalidParameter(reason) => {
                    PdwError::MalformedFile(format!("row {}: {}", row, reason))
                }
                other => other,
            })?;
            if assigned != id {
                return Err(PdwError::MalformedFile(format!(
                    "row {} declares id {} but ids must be consecutive from 0",
                    row, id
                )));
            }
        }

        Ok(index.finalize())
    }
}

impl PartialEq for FrozenIndex {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name && self.names.iter().eq(other.names.iter())
    }
}

impl Eq for FrozenIndex {}

/// Names travel inside the CSV association file and quoted SCPI strings.
/// Surrounding whitespace would not survive a trip through the CSV reader.
pub(crate) fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PdwError::InvalidParameter(format!("{} must not be empty", what)));
    }
    if name.contains([',', '"', '\n', '\r']) {
        return Err(PdwError::InvalidParameter(format!(
            "{} {:?} contains a reserved character",
            what, name
        )));
    }
    if name.trim() != name {
        return Err(PdwError::InvalidParameter(format!(
            "{} {:?} has leading or trailing whitespace",
            what, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_positions() {
        let mut index = WaveformIndex::default();
        assert_eq!(index.append("A").unwrap(), 0);
        assert_eq!(index.append("B").unwrap(), 1);
        assert_eq!(index.append("C").unwrap(), 2);
        assert_eq!(index.position("B"), Some(1));
        assert_eq!(index.len(), 3);
        assert_eq!(index.file_name(), "windex");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut index = WaveformIndex::default();
        index.append("A").unwrap();
        let err = index.append("A").unwrap_err();
        assert!(matches!(err, PdwError::DuplicateWaveform(ref n) if n == "A"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_append_after_finalize() {
        let mut index = WaveformIndex::default();
        index.append("A").unwrap();
        let frozen = index.finalize();

        assert!(index.is_frozen());
        assert!(matches!(index.append("B"), Err(PdwError::IndexFrozen(_))));
        // Duplicate of an existing name is still reported as frozen
        assert!(matches!(index.append("A"), Err(PdwError::IndexFrozen(_))));
        assert_eq!(frozen.len(), 1);
    }

    #[test]
    fn test_reserved_characters() {
        let mut index = WaveformIndex::default();
        assert!(index.append("a,b").is_err());
        assert!(index.append("quote\"d").is_err());
        assert!(index.append("").is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        let mut index = WaveformIndex::default();
        assert!(matches!(index.append(" A"), Err(PdwError::InvalidParameter(_))));
        assert!(matches!(index.append("A\t"), Err(PdwError::InvalidParameter(_))));
        assert_eq!(index.append("pulse A").unwrap(), 0);

        let frozen = index.finalize();
        assert_eq!(FrozenIndex::parse("windex", &frozen.serialize()).unwrap(), frozen);

        let err = FrozenIndex::parse("windex", b"Id,Filename\n0, A\n").unwrap_err();
        assert!(matches!(err, PdwError::MalformedFile(_)));
    }

    #[test]
    fn test_file_name_validated() {
        for bad in ["", "a\"b", "two\nlines", "x,y", " padded"] {
            assert!(
                matches!(WaveformIndex::new(bad), Err(PdwError::InvalidParameter(_))),
                "{:?} accepted",
                bad
            );
            assert!(FrozenIndex::parse(bad, b"Id,Filename\n").is_err());
        }
        assert_eq!(WaveformIndex::new("chirps.v2").unwrap().file_name(), "chirps.v2");
        assert_eq!(WaveformIndex::default().file_name(), WaveformIndex::DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_frozen_lookup() {
        let mut index = WaveformIndex::new("chirps").unwrap();
        index.append("10us").unwrap();
        index.append("50us").unwrap();
        let frozen = index.finalize();

        assert_eq!(frozen.get(0), Some("10us"));
        assert_eq!(frozen.get(2), None);
        assert_eq!(frozen.position("50us"), Some(1));
        assert!(frozen.contains_index(1));
        assert!(!frozen.contains_index(2));
        assert_eq!(frozen.file_name(), "chirps");
    }

    #[test]
    fn test_serialize_association_file() {
        let mut index = WaveformIndex::new("chirps").unwrap();
        index.append("A").unwrap();
        index.append("B").unwrap();
        let frozen = index.finalize();

        assert_eq!(&frozen.serialize()[..], b"Id,Filename\n0,A\n1,B\n");

        let parsed = FrozenIndex::parse("chirps", &frozen.serialize()).unwrap();
        assert_eq!(parsed, frozen);
    }

    #[test]
    fn test_parse_rejects_gaps() {
        let err = FrozenIndex::parse("x", b"Id,Filename\n0,A\n2,B\n").unwrap_err();
        assert!(matches!(err, PdwError::MalformedFile(_)));

        assert!(FrozenIndex::parse("x", b"Name,Id\n0,A\n").is_err());
        assert!(FrozenIndex::parse("x", b"Id,Filename\nzero,A\n").is_err());
    }
}
