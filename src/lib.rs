// src/lib.rs
//! # pdw-rs
//!
//! Encode Pulse Descriptor Word (PDW) files and stream them to a vector
//! signal generator over LAN.
//!
//! ## Features
//!
//! - **Binary PDW codec**: fixed 4096-byte header followed by fixed-width
//!   little-endian records, zero-copy split into header and body
//! - **Waveform association files**: append-only name index, frozen before use
//! - **IEEE 488.2 binary blocks**: definite-length framing for command uploads
//! - **Dual-channel streaming**: command channel plus raw LAN data channel,
//!   ordered by operation-complete barriers
//! - **Async runner**: one blocking worker per instrument behind a tokio queue
//!
//! ## Quick Start
//!
//! ### Building a PDW file
//!
//! ```rust
//! use pdw_rs::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut index = WaveformIndex::new("chirps")?;
//!     index.append("chirp_up")?;
//!     index.append("chirp_down")?;
//!     let index = index.finalize();
//!
//!     let records = vec![
//!         PdwRecord::new(Operation::First, TimeOffset::ZERO, 0).with_frequency(1e9),
//!         PdwRecord::new(Operation::Last, TimeOffset::from_micros(20)?, 1).with_frequency(1e9),
//!     ];
//!     let file = PdwFile::build(&records, &index)?;
//!     assert_eq!(file.byte_len(), FIXED_HEADER_SIZE + 2 * RECORD_WIDTH);
//!     Ok(())
//! }
//! ```
//!
//! ### Streaming to an instrument
//!
//! ```rust,no_run
//! use pdw_rs::prelude::*;
//!
//! fn main() -> Result<()> {
//!     # let index = WaveformIndex::new("chirps")?.finalize();
//!     # let file = PdwFile::build(&[], &index)?;
//!     let config = ChannelConfig::default();
//!     let channel = CommandChannel::connect("192.168.0.10", &config)?;
//!     let connector = TcpConnector::new("192.168.0.10", config);
//!
//!     let report = StreamSession::new(&channel, connector).run(&index, &file)?;
//!     println!("streamed {} records", report.records);
//!     Ok(())
//! }
//! ```

// Modules
pub mod block;
pub mod channel;
pub mod error;
pub mod pdw;
pub mod session;
pub mod types;
pub mod waveform;

mod utils;

// Re-export commonly used types at the crate root for convenience
pub use error::{PdwError, Phase, Result};

pub use types::{MarkerMask, Operation, PhaseMode, RfState, TimeOffset, WfmMarkerMask};

pub use block::{BlockCodec, BlockHeader};

pub use pdw::{PdwEncoder, PdwFile, PdwHeader, PdwRecord, PdwTable, FIXED_HEADER_SIZE, RECORD_WIDTH};

pub use waveform::{FrozenIndex, InstrumentLimits, Waveform, WaveformIndex};

pub use channel::{
    ChannelConfig,
    CommandChannel,
    CommandGuard,
    InstrumentError,
    StreamChannel,
    StreamConnector,
    StreamSink,
    TcpConnector,
};

pub use session::{download_pdw_table, download_waveform, SessionReport, SessionState, StreamCommands, StreamSession};

#[cfg(feature = "async")]
pub use session::AsyncInstrument;

// Prelude module for glob imports
pub mod prelude {
    //! Convenient imports for common use cases.
    //!
    //! ```rust
    //! use pdw_rs::prelude::*;
    //! ```

    pub use crate::channel::{ChannelConfig, CommandChannel, TcpConnector};
    pub use crate::error::{PdwError, Result};
    pub use crate::pdw::{PdwEncoder, PdwFile, PdwRecord, FIXED_HEADER_SIZE, RECORD_WIDTH};
    pub use crate::session::{StreamCommands, StreamSession};
    pub use crate::types::{Operation, TimeOffset};
    pub use crate::waveform::{Waveform, WaveformIndex};

    #[cfg(feature = "async")]
    pub use crate::session::AsyncInstrument;
}

// Version information
/// The PDW record layout version this library writes
pub const PDW_FORMAT_VERSION: u32 = pdw::layout::LAYOUT_VERSION;

/// The library version
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
