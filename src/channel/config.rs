// src/channel/config.rs
use std::time::Duration;

/// Network settings for the command and stream channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub command_port: u16,
    pub stream_port: u16,
    pub connect_timeout: Duration,
    /// Bound on every blocking read on the command channel
    pub response_timeout: Duration,
    /// Bound on a single socket write under backpressure
    pub write_timeout: Duration,
    /// Largest slice handed to one stream-channel write
    pub stream_chunk_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            command_port: 5025,
            stream_port: 5033,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            stream_chunk_size: 64 * 1024,
        }
    }
}

impl ChannelConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_ports(mut self, command_port: u16, stream_port: u16) -> Self {
        self.command_port = command_port;
        self.stream_port = stream_port;
        self
    }

    pub fn with_stream_chunk_size(mut self, bytes: usize) -> Self {
        self.stream_chunk_size = bytes.max(1);
        self
    }
}
