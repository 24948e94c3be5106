// src/session/async_runner.rs
use crate::channel::{ChannelConfig, CommandChannel, StreamConnector, TcpConnector};
use crate::error::{PdwError, Result};
use crate::pdw::{PdwFile, PdwTable};
use crate::session::{download_pdw_table, download_waveform, SessionReport, StreamCommands, StreamSession};
use crate::waveform::{FrozenIndex, Waveform};
use log::{debug, warn};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task;

enum InstrumentCommand {
    Stream {
        index: FrozenIndex,
        file: PdwFile,
        response: oneshot::Sender<Result<SessionReport>>,
    },
    Download {
        waveform: Waveform,
        response: oneshot::Sender<Result<()>>,
    },
    DownloadTable {
        name: String,
        table: PdwTable,
        response: oneshot::Sender<Result<()>>,
    },
    Command {
        command: String,
        response: oneshot::Sender<Result<()>>,
    },
    Query {
        query: String,
        response: oneshot::Sender<Result<String>>,
    },
    CheckErrors {
        response: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Async front-end for one instrument
///
/// The channels live on a single blocking worker; requests from any number of
/// tasks queue up and run one at a time, so sessions never interleave.
#[derive(Clone)]
pub struct AsyncInstrument {
    command_tx: mpsc::UnboundedSender<InstrumentCommand>,
    handle: Arc<Mutex<Option<task::JoinHandle<Result<()>>>>>,
}

impl AsyncInstrument {
    /// Connect the command channel to `host`; stream channels are opened per session
    pub async fn connect(host: impl Into<String>, config: ChannelConfig) -> Result<Self> {
        let host = host.into();
        let (connect_host, connect_config) = (host.clone(), config.clone());
        let channel = task::spawn_blocking(move || CommandChannel::connect(&connect_host, &connect_config))
            .await
            .map_err(|_| PdwError::Closed)??;

        let chunk_size = config.stream_chunk_size;
        let connector = TcpConnector::new(host, config);
        Ok(Self::spawn(channel, connector, StreamCommands::default(), chunk_size))
    }

    /// Move an existing channel onto a worker. Must be called within a tokio runtime.
    pub fn spawn<T, C>(channel: CommandChannel<T>, connector: C, commands: StreamCommands, chunk_size: usize) -> Self
    where
        T: Read + Write + Send + 'static,
        C: StreamConnector + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = task::spawn_blocking(move || Self::worker(channel, connector, commands, chunk_size, command_rx));

        AsyncInstrument {
            command_tx,
            handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    fn worker<T, C>(
        channel: CommandChannel<T>,
        mut connector: C,
        commands: StreamCommands,
        chunk_size: usize,
        mut command_rx: mpsc::UnboundedReceiver<InstrumentCommand>,
    ) -> Result<()>
    where
        T: Read + Write,
        C: StreamConnector,
    {
        while let Some(command) = command_rx.blocking_recv() {
            match command {
                InstrumentCommand::Stream { index, file, response } => {
                    let result = StreamSession::new(&channel, &mut connector)
                        .with_commands(commands.clone())
                        .with_chunk_size(chunk_size)
                        .run(&index, &file);
                    let _ = response.send(result);
                }
                InstrumentCommand::Download { waveform, response } => {
                    let result = download_waveform(&mut channel.lock(), &waveform, &commands);
                    let _ = response.send(result);
                }
                InstrumentCommand::DownloadTable { name, table, response } => {
                    let result = download_pdw_table(&mut channel.lock(), &name, &table, &commands);
                    let _ = response.send(result);
                }
                InstrumentCommand::Command { command, response } => {
                    let _ = response.send(channel.send_command(&command));
                }
                InstrumentCommand::Query { query, response } => {
                    let _ = response.send(channel.query(&query));
                }
                InstrumentCommand::CheckErrors { response } => {
                    let _ = response.send(channel.check_errors());
                }
                InstrumentCommand::Close => {
                    let mut guard = channel.lock();
                    if guard.is_poisoned() {
                        warn!("closing poisoned command channel without reading the error queue");
                    } else {
                        for error in guard.error_queue()? {
                            warn!("unreported instrument error {}: {}", error.code, error.message);
                        }
                    }
                    break;
                }
            }
        }

        debug!("instrument worker stopped");
        Ok(())
    }

    /// Run a full streaming session for `file`
    pub async fn stream(&self, index: FrozenIndex, file: PdwFile) -> Result<SessionReport> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::Stream {
                index,
                file,
                response: response_tx,
            })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    pub async fn download_waveform(&self, waveform: Waveform) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::Download {
                waveform,
                response: response_tx,
            })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    /// Upload and import a CSV PDW table as stream file `name`
    pub async fn download_pdw_table(&self, name: impl Into<String>, table: PdwTable) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::DownloadTable {
                name: name.into(),
                table,
                response: response_tx,
            })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    pub async fn send_command(&self, command: impl Into<String>) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::Command {
                command: command.into(),
                response: response_tx,
            })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    pub async fn query(&self, query: impl Into<String>) -> Result<String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::Query {
                query: query.into(),
                response: response_tx,
            })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    pub async fn check_errors(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(InstrumentCommand::CheckErrors { response: response_tx })
            .map_err(|_| PdwError::Closed)?;
        response_rx.await.map_err(|_| PdwError::Closed)?
    }

    /// Stop the worker once queued requests are done, logging any errors left
    /// in the instrument's queue
    pub async fn close(&self) -> Result<()> {
        self.command_tx
            .send(InstrumentCommand::Close)
            .map_err(|_| PdwError::Closed)?;

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.await.map_err(|_| PdwError::Closed)??;
        }

        Ok(())
    }
}
