// src/channel/command.rs
use crate::block::BlockCodec;
use crate::channel::{resolve, ChannelConfig};
use crate::error::{PdwError, Result};
use crate::utils::{parse_error_response, trim_response};
use bytes::{BufMut, BytesMut};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// An entry read from the instrument's error queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentError {
    pub code: i32,
    pub message: String,
}

/// Request/response channel to the instrument's command port
///
/// The instrument answers one request at a time, so the transport sits behind
/// a mutex. [`lock`](CommandChannel::lock) holds it across any number of
/// exchanges; the convenience methods on the channel lock once per exchange.
///
/// A response that times out may still arrive later, so after a failed read
/// the channel is poisoned: every exchange that waits for a response fails
/// with [`PdwError::Transport`] without touching the wire. Plain commands
/// still go out so a failed session can disarm streaming. Reconnect to
/// recover.
pub struct CommandChannel<T: Read + Write> {
    inner: Mutex<Link<T>>,
}

struct Link<T> {
    io: BufReader<T>,
    poisoned: Option<String>,
}

impl CommandChannel<TcpStream> {
    /// Connect to `host` on the configured command port
    pub fn connect(host: &str, config: &ChannelConfig) -> Result<Self> {
        let addr = resolve(host, config.command_port)?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(PdwError::Transport)?;
        stream
            .set_read_timeout(Some(config.response_timeout))
            .map_err(PdwError::Transport)?;
        stream
            .set_write_timeout(Some(config.write_timeout))
            .map_err(PdwError::Transport)?;
        stream.set_nodelay(true).map_err(PdwError::Transport)?;

        debug!("command channel connected to {}", addr);
        Ok(Self::new(stream))
    }
}

impl<T: Read + Write> CommandChannel<T> {
    pub const ERROR_QUERY: &'static str = "SYST:ERR?";
    pub const OPC_QUERY: &'static str = "*OPC?";

    pub fn new(transport: T) -> Self {
        CommandChannel {
            inner: Mutex::new(Link {
                io: BufReader::with_capacity(8192, transport),
                poisoned: None,
            }),
        }
    }

    /// Acquire exclusive use of the channel
    pub fn lock(&self) -> CommandGuard<'_, T> {
        CommandGuard { link: self.inner.lock() }
    }

    pub fn try_lock_for(&self, timeout: Duration) -> Option<CommandGuard<'_, T>> {
        self.inner.try_lock_for(timeout).map(|link| CommandGuard { link })
    }

    /// Whether a failed read has left responses unaccounted for
    pub fn is_poisoned(&self) -> bool {
        self.lock().is_poisoned()
    }

    pub fn send_command(&self, command: &str) -> Result<()> {
        self.lock().send_command(command)
    }

    pub fn query(&self, query: &str) -> Result<String> {
        self.lock().query(query)
    }

    pub fn send_block(&self, prefix: &str, payload: &[u8]) -> Result<()> {
        self.lock().send_block(prefix, payload)
    }

    pub fn query_block(&self, prefix: &str, payload: &[u8]) -> Result<String> {
        self.lock().query_block(prefix, payload)
    }

    pub fn query_binary(&self, query: &str) -> Result<Vec<u8>> {
        self.lock().query_binary(query)
    }

    pub fn sync(&self) -> Result<()> {
        self.lock().sync(Self::OPC_QUERY)
    }

    pub fn check_errors(&self) -> Result<()> {
        self.lock().check_errors()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner().io.into_inner()
    }
}

/// Exclusive handle on a [`CommandChannel`]
pub struct CommandGuard<'a, T: Read + Write> {
    link: MutexGuard<'a, Link<T>>,
}

impl<'a, T: Read + Write> CommandGuard<'a, T> {
    const MAX_ERROR_READS: usize = 64;

    pub fn is_poisoned(&self) -> bool {
        self.link.poisoned.is_some()
    }

    pub fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("-> {}", command);
        let mut message = BytesMut::with_capacity(command.len() + 1);
        message.put_slice(command.as_bytes());
        message.put_u8(b'\n');
        self.write_message(&message, command)
    }

    /// Send `query` and block for its single-line response
    pub fn query(&mut self, query: &str) -> Result<String> {
        self.ensure_usable(query)?;
        self.send_command(query)?;
        self.read_response(query)
    }

    /// Send `prefix` immediately followed by `payload` as a binary block
    pub fn send_block(&mut self, prefix: &str, payload: &[u8]) -> Result<()> {
        debug!("-> {}<block of {} bytes>", prefix, payload.len());
        let mut message = BytesMut::with_capacity(prefix.len() + payload.len() + 12);
        message.put_slice(prefix.as_bytes());
        BlockCodec::encode_into(payload, &mut message)?;
        message.put_u8(b'\n');
        self.write_message(&message, prefix)
    }

    /// Send a block-carrying query and read its single-line response
    pub fn query_block(&mut self, prefix: &str, payload: &[u8]) -> Result<String> {
        self.ensure_usable(prefix)?;
        self.send_block(prefix, payload)?;
        self.read_response(prefix)
    }

    /// Send `query` and read a binary block response
    pub fn query_binary(&mut self, query: &str) -> Result<Vec<u8>> {
        self.ensure_usable(query)?;
        self.send_command(query)?;
        let payload = match BlockCodec::decode(&mut self.link.io) {
            Ok(payload) => payload,
            Err(PdwError::Io(err)) => return Err(self.poison(PdwError::from_transport(err, query))),
            Err(other) => return Err(self.poison(other)),
        };

        // Instruments terminate block responses with a newline; drop it if it
        // has already arrived. A late one is skipped by `read_response`.
        if self.link.io.buffer().first() == Some(&b'\n') {
            self.link.io.consume(1);
        }

        debug!("<- <block of {} bytes>", payload.len());
        Ok(payload)
    }

    /// Operation-complete barrier: blocks until the instrument answers `1`
    pub fn sync(&mut self, barrier: &str) -> Result<()> {
        let response = self.query(barrier)?;
        match response.trim().trim_start_matches('+').parse::<i64>() {
            Ok(1) => Ok(()),
            _ => Err(PdwError::SyncRejected {
                query: barrier.to_string(),
                response,
            }),
        }
    }

    /// Drain the instrument's error queue
    pub fn error_queue(&mut self) -> Result<Vec<InstrumentError>> {
        let mut errors = Vec::new();
        for _ in 0..Self::MAX_ERROR_READS {
            let response = self.query(CommandChannel::<T>::ERROR_QUERY)?;
            let (code, message) = parse_error_response(&response)?;
            if code == 0 {
                break;
            }
            errors.push(InstrumentError { code, message });
        }
        Ok(errors)
    }

    /// Fail with the first queued instrument error, if any
    pub fn check_errors(&mut self) -> Result<()> {
        let mut errors = self.error_queue()?.into_iter();
        match errors.next() {
            None => Ok(()),
            Some(first) => {
                for other in errors {
                    warn!("additional instrument error {}: {}", other.code, other.message);
                }
                Err(PdwError::InstrumentReported {
                    code: first.code,
                    message: first.message,
                })
            }
        }
    }

    /// Read one non-empty response line
    pub fn read_response(&mut self, awaiting: &str) -> Result<String> {
        self.ensure_usable(awaiting)?;
        loop {
            let mut line = Vec::new();
            let n = match self.link.io.read_until(b'\n', &mut line) {
                Ok(n) => n,
                Err(e) => return Err(self.poison(PdwError::from_transport(e, awaiting))),
            };

            if n == 0 || line.last() != Some(&b'\n') {
                return Err(self.poison(PdwError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("instrument closed the connection while answering {:?}", awaiting),
                ))));
            }

            let response = trim_response(&line);
            if !response.is_empty() {
                debug!("<- {}", response);
                return Ok(response);
            }
        }
    }

    fn write_message(&mut self, message: &[u8], context: &str) -> Result<()> {
        let stale = self.link.io.buffer().len();
        if stale > 0 {
            warn!("discarding {} unread response bytes before {:?}", stale, context);
            self.link.io.consume(stale);
        }

        let transport = self.link.io.get_mut();
        let written = transport.write_all(message).and_then(|()| transport.flush());
        written.map_err(|e| self.poison(PdwError::from_transport(e, context)))
    }

    /// Record why the channel can no longer pair requests with responses
    fn poison(&mut self, err: PdwError) -> PdwError {
        if self.link.poisoned.is_none() {
            warn!("command channel poisoned: {}", err);
            self.link.poisoned = Some(err.to_string());
        }
        err
    }

    /// Fail with `Transport` if an earlier failure poisoned the channel
    pub(crate) fn ensure_usable(&self, awaiting: &str) -> Result<()> {
        match &self.link.poisoned {
            None => Ok(()),
            Some(reason) => Err(PdwError::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("command channel unusable for {:?} after earlier failure: {}", awaiting, reason),
            ))),
        }
    }
}
