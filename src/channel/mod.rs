// src/channel/mod.rs
mod command;
mod config;
mod stream;

pub use command::{CommandChannel, CommandGuard, InstrumentError};
pub use config::ChannelConfig;
pub use stream::{StreamChannel, StreamConnector, StreamSink, TcpConnector};

use crate::error::{PdwError, Result};
use std::net::{SocketAddr, ToSocketAddrs};

pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(PdwError::Transport)?
        .next()
        .ok_or_else(|| PdwError::InvalidParameter(format!("{}:{} did not resolve to an address", host, port)))
}
