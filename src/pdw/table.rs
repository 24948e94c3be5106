// src/pdw/table.rs
use crate::error::{PdwError, Result};
use bytes::Bytes;
use std::fmt::{Display, Write as _};

/// Text PDW table for instruments that import descriptors from CSV
///
/// Columns are named by the caller (`Operation`, `Time`, `Frequency`, ...)
/// and cells are written with their `Display` form, so a row carries
/// waveform names directly instead of index positions. The instrument
/// converts the table into its own binary form on import.
///
/// # Example
///
/// ```
/// use pdw_rs::PdwTable;
///
/// let mut table = PdwTable::new(["Operation", "Time", "Frequency", "Name"]).unwrap();
/// table.push_row(&[&1, &0, &1e9, &"chirp"]).unwrap();
/// assert_eq!(&table.serialize()[..], b"Operation,Time,Frequency,Name\n1,0,1000000000,chirp\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdwTable {
    fields: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl PdwTable {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(PdwError::InvalidParameter("PDW table needs at least one column".into()));
        }
        for field in &fields {
            if field.is_empty() {
                return Err(PdwError::InvalidParameter("PDW table column names must not be empty".into()));
            }
            check_cell(field)?;
        }

        Ok(PdwTable { fields, rows: Vec::new() })
    }

    /// Append one row; it must have a cell for every column
    pub fn push_row(&mut self, values: &[&dyn Display]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(PdwError::InvalidParameter(format!(
                "PDW table row {} has {} cells, expected {}",
                self.rows.len(),
                values.len(),
                self.fields.len()
            )));
        }

        let row = values.iter().map(|value| value.to_string()).collect::<Vec<_>>();
        for cell in &row {
            check_cell(cell)?;
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line of column names, then one comma-separated line per row
    pub fn serialize(&self) -> Bytes {
        let mut text = String::with_capacity(32 * (self.rows.len() + 1) * self.fields.len());
        text.push_str(&self.fields.join(","));
        text.push('\n');
        for row in &self.rows {
            // Writing to a String cannot fail
            let _ = writeln!(text, "{}", row.join(","));
        }
        Bytes::from(text)
    }
}

fn check_cell(cell: &str) -> Result<()> {
    if cell.contains([',', '"', '\n', '\r']) {
        return Err(PdwError::InvalidParameter(format!(
            "PDW table cell {:?} contains a reserved character",
            cell
        )));
    }
    Ok(())
}
