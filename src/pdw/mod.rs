// src/pdw/mod.rs
pub mod layout;
mod file;
mod header;
mod record;
mod table;

pub use file::{PdwEncoder, PdwFile};
pub use header::PdwHeader;
pub use layout::RECORD_WIDTH;
pub use record::PdwRecord;
pub use table::PdwTable;

/// Byte length of every PDW file header, independent of record count
pub const FIXED_HEADER_SIZE: usize = PdwHeader::SIZE;
