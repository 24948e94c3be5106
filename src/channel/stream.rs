// src/channel/stream.rs
use crate::channel::{resolve, ChannelConfig};
use crate::error::{PdwError, Result};
use log::debug;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};

/// Write side of a raw data socket
pub trait StreamSink: Write {
    /// Release the underlying connection
    fn shutdown(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl StreamSink for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        self.flush()?;
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Opens the instrument's data-streaming socket on demand
pub trait StreamConnector {
    type Sink: StreamSink;

    fn connect(&mut self) -> io::Result<Self::Sink>;
}

impl<C: StreamConnector + ?Sized> StreamConnector for &mut C {
    type Sink = C::Sink;

    fn connect(&mut self) -> io::Result<C::Sink> {
        (**self).connect()
    }
}

/// TCP connection to the instrument's streaming port
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    config: ChannelConfig,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, config: ChannelConfig) -> Self {
        TcpConnector {
            host: host.into(),
            config,
        }
    }
}

impl StreamConnector for TcpConnector {
    type Sink = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let addr = resolve(&self.host, self.config.stream_port)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Write-only data channel carrying the raw PDW body
///
/// No framing is added; the instrument has been told over the command
/// channel what to expect.
pub struct StreamChannel<S: StreamSink> {
    sink: S,
    chunk_size: usize,
    bytes_sent: u64,
}

impl<S: StreamSink> StreamChannel<S> {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub fn open<C: StreamConnector<Sink = S>>(connector: &mut C, chunk_size: usize) -> Result<Self> {
        let sink = connector.connect().map_err(PdwError::Transport)?;
        debug!("stream channel opened");
        Ok(Self::from_sink(sink, chunk_size))
    }

    pub fn from_sink(sink: S, chunk_size: usize) -> Self {
        StreamChannel {
            sink,
            chunk_size: chunk_size.max(1),
            bytes_sent: 0,
        }
    }

    /// Write `data` in full; returns once the last chunk has been handed to the socket
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(self.chunk_size) {
            self.sink
                .write_all(chunk)
                .map_err(|e| PdwError::from_transport(e, "stream write"))?;
            self.bytes_sent += chunk.len() as u64;
        }
        self.sink
            .flush()
            .map_err(|e| PdwError::from_transport(e, "stream flush"))?;
        debug!("streamed {} bytes ({} total)", data.len(), self.bytes_sent);
        Ok(())
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn close(mut self) -> Result<()> {
        self.sink.shutdown().map_err(PdwError::Transport)?;
        debug!("stream channel closed after {} bytes", self.bytes_sent);
        Ok(())
    }
}
