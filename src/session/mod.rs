// src/session/mod.rs
//! Dual-channel streaming session
//!
//! A session walks `Idle -> Configured -> HeaderSent -> Streaming -> Complete`.
//! Each state is its own type, so the protocol order is enforced at compile
//! time; a failed transition consumes the session and returns
//! [`PdwError::Session`] after best-effort cleanup.

#[cfg(feature = "async")]
mod async_runner;
mod commands;

#[cfg(feature = "async")]
pub use async_runner::AsyncInstrument;
pub use commands::StreamCommands;

use crate::channel::{CommandChannel, CommandGuard, StreamChannel, StreamConnector, StreamSink};
use crate::error::{PdwError, Phase, Result};
use crate::pdw::{PdwFile, PdwTable};
use crate::waveform::{validate_name, FrozenIndex, Waveform};
use bytes::Bytes;
use commands::render;
use log::{error, info, warn};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Protocol position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Configured,
    HeaderSent,
    Streaming,
    Complete,
    Failed,
}

mod sealed {
    pub trait Sealed {}
}

/// Marker implemented by the session state types
pub trait State: sealed::Sealed {
    const STATE: SessionState;
}

pub struct Idle;

pub struct Configured {
    index_name: String,
    waveform_count: usize,
}

pub struct HeaderSent {
    body: Bytes,
    records: usize,
}

pub struct Streaming<K: StreamSink> {
    stream: StreamChannel<K>,
    records: usize,
}

impl sealed::Sealed for Idle {}
impl sealed::Sealed for Configured {}
impl sealed::Sealed for HeaderSent {}
impl<K: StreamSink> sealed::Sealed for Streaming<K> {}

impl State for Idle {
    const STATE: SessionState = SessionState::Idle;
}

impl State for Configured {
    const STATE: SessionState = SessionState::Configured;
}

impl State for HeaderSent {
    const STATE: SessionState = SessionState::HeaderSent;
}

impl<K: StreamSink> State for Streaming<K> {
    const STATE: SessionState = SessionState::Streaming;
}

/// Summary of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub records: usize,
    pub bytes_streamed: u64,
    pub elapsed: Duration,
}

/// One pass of the streaming protocol against a single instrument
///
/// The session holds the command channel lock for its whole lifetime, so
/// sessions against one instrument never interleave.
pub struct StreamSession<'a, T: Read + Write, C: StreamConnector, S: State> {
    command: CommandGuard<'a, T>,
    connector: C,
    commands: StreamCommands,
    chunk_size: usize,
    started: Instant,
    state: S,
}

impl<'a, T: Read + Write, C: StreamConnector> StreamSession<'a, T, C, Idle> {
    /// Lock `channel` and start a session; blocks while another session holds it
    pub fn new(channel: &'a CommandChannel<T>, connector: C) -> Self {
        Self::with_guard(channel.lock(), connector)
    }

    pub fn with_guard(command: CommandGuard<'a, T>, connector: C) -> Self {
        StreamSession {
            command,
            connector,
            commands: StreamCommands::default(),
            chunk_size: StreamChannel::<C::Sink>::DEFAULT_CHUNK_SIZE,
            started: Instant::now(),
            state: Idle,
        }
    }

    pub fn with_commands(mut self, commands: StreamCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Upload and select the association file, then arm source and triggers
    pub fn configure(mut self, index: &FrozenIndex) -> Result<StreamSession<'a, T, C, Configured>> {
        match self.upload_index(index) {
            Ok(()) => Ok(self.advance(Configured {
                index_name: index.file_name().to_string(),
                waveform_count: index.len(),
            })),
            Err(err) => Err(self.fail(Phase::Configure, err)),
        }
    }

    /// Run the whole protocol for `file`
    pub fn run(self, index: &FrozenIndex, file: &PdwFile) -> Result<SessionReport> {
        self.configure(index)?.send_header(file)?.stream_body()?.play()
    }

    fn upload_index(&mut self, index: &FrozenIndex) -> Result<()> {
        let name = index.file_name();
        self.command.ensure_usable(&self.commands.stream_off)?;
        self.command.send_command(&self.commands.stream_off)?;
        self.command
            .send_block(&render(&self.commands.windex_upload, name), &index.serialize())?;
        self.command.send_command(&render(&self.commands.windex_import, name))?;
        self.command.send_command(&render(&self.commands.windex_select, name))?;
        for command in &self.commands.arm {
            self.command.send_command(command)?;
        }
        self.command.send_command(&self.commands.header_clear)?;
        if self.commands.check_errors {
            self.command.check_errors()?;
        }
        Ok(())
    }
}

impl<'a, T: Read + Write, C: StreamConnector> StreamSession<'a, T, C, Configured> {
    /// Upload the fixed-size header and wait for the instrument's acknowledgement
    pub fn send_header(mut self, file: &PdwFile) -> Result<StreamSession<'a, T, C, HeaderSent>> {
        match self.upload_header(file) {
            Ok(body) => {
                let records = file.records().len();
                Ok(self.advance(HeaderSent { body, records }))
            }
            Err(err) => Err(self.fail(Phase::Header, err)),
        }
    }

    fn upload_header(&mut self, file: &PdwFile) -> Result<Bytes> {
        let header = file.header();
        if header.index_name != self.state.index_name || header.waveform_count as usize != self.state.waveform_count {
            return Err(PdwError::InvalidParameter(format!(
                "PDW file references association file {:?} with {} waveforms, session selected {:?} with {}",
                header.index_name, header.waveform_count, self.state.index_name, self.state.waveform_count
            )));
        }

        let (head, body) = file.split();
        let response = self.command.query_block(&self.commands.header_query, &head)?;
        if response.trim() != self.commands.header_ack {
            return Err(PdwError::HeaderRejected {
                expected: self.commands.header_ack.clone(),
                received: response,
            });
        }
        Ok(body)
    }
}

impl<'a, T: Read + Write, C: StreamConnector> StreamSession<'a, T, C, HeaderSent> {
    /// Arm streaming, push the record body over the data channel, then wait
    /// for the instrument to confirm it has consumed it
    pub fn stream_body(mut self) -> Result<StreamSession<'a, T, C, Streaming<C::Sink>>> {
        if let Err(err) = self.command.send_command(&self.commands.stream_on) {
            return Err(self.fail(Phase::Stream, err));
        }

        let mut stream = match StreamChannel::open(&mut self.connector, self.chunk_size) {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail(Phase::Stream, err)),
        };

        let body = self.state.body.clone();
        if let Err(err) = stream.send(&body) {
            return Err(self.fail_with(stream, Phase::Stream, err));
        }

        // Body bytes may still be in flight; the barrier is what orders them
        // before the trigger
        if let Err(err) = self.command.sync(&self.commands.barrier) {
            return Err(self.fail_with(stream, Phase::Sync, err));
        }

        let records = self.state.records;
        Ok(self.advance(Streaming { stream, records }))
    }
}

impl<'a, T: Read + Write, C: StreamConnector> StreamSession<'a, T, C, Streaming<C::Sink>> {
    pub fn bytes_streamed(&self) -> u64 {
        self.state.stream.bytes_sent()
    }

    /// Trigger playback, wait for completion and tear both channels down
    pub fn play(mut self) -> Result<SessionReport> {
        if let Err(err) = self.trigger() {
            let StreamSession {
                mut command,
                commands,
                state,
                ..
            } = self;
            return Err(fail_session(
                &mut command,
                &commands,
                Some(state.stream),
                Phase::Trigger,
                SessionState::Streaming,
                err,
            ));
        }

        let StreamSession {
            mut command,
            commands,
            started,
            state,
            ..
        } = self;
        let Streaming { stream, records } = state;
        let bytes_streamed = stream.bytes_sent();

        if let Err(err) = stream.close() {
            return Err(fail_session::<T, C::Sink>(
                &mut command,
                &commands,
                None,
                Phase::Teardown,
                SessionState::Streaming,
                err,
            ));
        }
        if let Err(err) = command.send_command(&commands.stream_off) {
            error!("stream session failed disarming streaming: {}", err);
            return Err(err.in_phase(Phase::Teardown));
        }

        let report = SessionReport {
            records,
            bytes_streamed,
            elapsed: started.elapsed(),
        };
        info!(
            "stream session: {:?} -> {:?} ({} records, {} bytes in {:?})",
            SessionState::Streaming,
            SessionState::Complete,
            report.records,
            report.bytes_streamed,
            report.elapsed
        );
        Ok(report)
    }

    fn trigger(&mut self) -> Result<()> {
        self.command.send_command(&self.commands.trigger)?;
        self.command.sync(&self.commands.barrier)
    }
}

impl<'a, T: Read + Write, C: StreamConnector, S: State> StreamSession<'a, T, C, S> {
    pub fn state(&self) -> SessionState {
        S::STATE
    }

    pub fn commands(&self) -> &StreamCommands {
        &self.commands
    }

    fn advance<N: State>(self, state: N) -> StreamSession<'a, T, C, N> {
        info!("stream session: {:?} -> {:?}", S::STATE, N::STATE);
        StreamSession {
            command: self.command,
            connector: self.connector,
            commands: self.commands,
            chunk_size: self.chunk_size,
            started: self.started,
            state,
        }
    }

    fn fail(mut self, phase: Phase, err: PdwError) -> PdwError {
        fail_session::<T, C::Sink>(&mut self.command, &self.commands, None, phase, S::STATE, err)
    }

    fn fail_with(mut self, stream: StreamChannel<C::Sink>, phase: Phase, err: PdwError) -> PdwError {
        fail_session(&mut self.command, &self.commands, Some(stream), phase, S::STATE, err)
    }
}

/// Close the data channel if open and disarm streaming; cleanup errors are
/// logged and never replace `err`
fn fail_session<T: Read + Write, K: StreamSink>(
    command: &mut CommandGuard<'_, T>,
    commands: &StreamCommands,
    stream: Option<StreamChannel<K>>,
    phase: Phase,
    from: SessionState,
    err: PdwError,
) -> PdwError {
    error!("stream session failed in {} phase from {:?}: {}", phase, from, err);

    if let Some(stream) = stream {
        if let Err(cleanup) = stream.close() {
            warn!("closing stream channel after failure: {}", cleanup);
        }
    }
    if let Err(cleanup) = command.send_command(&commands.stream_off) {
        warn!("disarming streaming after failure: {}", cleanup);
    }

    info!("stream session: {:?} -> {:?}", from, SessionState::Failed);
    err.in_phase(phase)
}

/// Upload IQ data for `waveform` ahead of a session that references it
pub fn download_waveform<T: Read + Write>(
    command: &mut CommandGuard<'_, T>,
    waveform: &Waveform,
    commands: &StreamCommands,
) -> Result<()> {
    let prefix = render(&commands.waveform_upload, waveform.name());
    command.send_block(&prefix, &waveform.to_iq_bytes())?;
    if commands.check_errors {
        command.check_errors()?;
    }
    info!("downloaded waveform {} ({} samples)", waveform.name(), waveform.len());
    Ok(())
}

/// Upload a CSV PDW table as stream file `name` and import it for playback
///
/// Streaming is switched off first; the caller turns it back on and triggers.
pub fn download_pdw_table<T: Read + Write>(
    command: &mut CommandGuard<'_, T>,
    name: &str,
    table: &PdwTable,
    commands: &StreamCommands,
) -> Result<()> {
    validate_name(name, "PDW table name")?;
    command.send_command(&commands.stream_off)?;
    command.send_block(&render(&commands.table_upload, name), &table.serialize())?;
    command.send_command(&render(&commands.table_import, name))?;
    if commands.check_errors {
        command.check_errors()?;
    }
    info!("downloaded PDW table {} ({} rows)", name, table.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdw::{PdwHeader, PdwRecord, RECORD_WIDTH};
    use crate::test_helpers::{Event, MockConnector, MockInstrument};
    use crate::types::{Operation, TimeOffset};
    use crate::waveform::{InstrumentLimits, WaveformIndex};

    fn responder(request: &str) -> Option<String> {
        match request {
            "*OPC?" => Some("+1".into()),
            "SYST:ERR?" => Some("+0,\"No error\"".into()),
            "stream:external:header?" => Some("+0".into()),
            _ => None,
        }
    }

    fn fixture() -> (FrozenIndex, PdwFile) {
        let mut index = WaveformIndex::new("chirps").unwrap();
        index.append("A").unwrap();
        index.append("B").unwrap();
        let index = index.finalize();

        let records = vec![
            PdwRecord::new(Operation::First, TimeOffset::ZERO, 0),
            PdwRecord::new(Operation::Continue, TimeOffset::from_micros(10).unwrap(), 1),
            PdwRecord::new(Operation::Last, TimeOffset::from_micros(20).unwrap(), 0),
        ];
        let file = PdwFile::build(&records, &index).unwrap();
        (index, file)
    }

    fn sent_commands(events: &[Event]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Command(c) => Some(c.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_full_session_order() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let report = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.bytes_streamed, (3 * RECORD_WIDTH) as u64);

        let events = log.lock().clone();
        let body = 3 * RECORD_WIDTH;
        let expected = vec![
            Event::Command("stream:state off".into()),
            Event::Block {
                prefix: "memory:data \"chirps.csv\", ".into(),
                len: index.serialize().len(),
            },
            Event::Command("memory:import:windex \"chirps.csv\",\"chirps\"".into()),
            Event::Command("stream:windex:select \"chirps\"".into()),
            Event::Command("stream:markers:pdw1:mode stime".into()),
            Event::Command("rout:trigger2:output pmarker1".into()),
            Event::Command("stream:source lan".into()),
            Event::Command("stream:trigger:play:file:type continuous".into()),
            Event::Command("stream:trigger:play:file:type:continuous:type trigger".into()),
            Event::Command("stream:trigger:play:source bus".into()),
            Event::Command("stream:external:header:clear".into()),
            Event::Command("SYST:ERR?".into()),
            Event::Block {
                prefix: "stream:external:header? ".into(),
                len: PdwHeader::SIZE,
            },
            Event::Command("stream:state on".into()),
            Event::StreamOpen,
            Event::StreamWrite(body),
            Event::Command("*OPC?".into()),
            Event::Command("stream:trigger:play:immediate".into()),
            Event::Command("*OPC?".into()),
            Event::StreamClose,
            Event::Command("stream:state off".into()),
        ];
        assert_eq!(events, expected);
    }

    #[test]
    fn test_zero_record_session() {
        let mut index = WaveformIndex::new("empty").unwrap();
        let index = index.finalize();
        let file = PdwFile::build(&[], &index).unwrap();

        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let report = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap();
        assert_eq!(report.records, 0);
        assert_eq!(report.bytes_streamed, 0);
        assert!(log.lock().contains(&Event::Block {
            prefix: "stream:external:header? ".into(),
            len: PdwHeader::SIZE,
        }));
    }

    #[test]
    fn test_header_rejected() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(|request| match request {
            "stream:external:header?" => Some("-1".into()),
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let session = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .configure(&index)
            .unwrap();
        assert_eq!(session.state(), SessionState::Configured);

        let err = session.send_header(&file).err().unwrap();
        assert_eq!(err.phase(), Some(Phase::Header));
        assert!(matches!(err.root(), PdwError::HeaderRejected { received, .. } if received == "-1"));

        let events = log.lock().clone();
        assert!(!events.contains(&Event::StreamOpen));
        assert_eq!(events.last(), Some(&Event::Command("stream:state off".into())));
    }

    #[test]
    fn test_mismatched_index_rejected_before_upload() {
        let (_, file) = fixture();
        let mut other = WaveformIndex::new("other").unwrap();
        other.append("A").unwrap();
        let other = other.finalize();

        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let err = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .configure(&other)
            .unwrap()
            .send_header(&file)
            .err()
            .unwrap();
        assert_eq!(err.phase(), Some(Phase::Header));
        assert!(matches!(err.root(), PdwError::InvalidParameter(_)));
        assert!(!log
            .lock()
            .iter()
            .any(|e| matches!(e, Event::Block { prefix, .. } if prefix.starts_with("stream:external:header"))));
    }

    #[test]
    fn test_configure_reports_instrument_error() {
        let (index, _) = fixture();
        let mut reported = false;
        let instrument = MockInstrument::new(move |request| match request {
            "SYST:ERR?" if !reported => {
                reported = true;
                Some("-224,\"Illegal parameter value\"".into())
            }
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let err = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .configure(&index)
            .err()
            .unwrap();
        assert_eq!(err.phase(), Some(Phase::Configure));
        assert!(matches!(err.root(), PdwError::InstrumentReported { code: -224, .. }));
    }

    #[test]
    fn test_configure_ignoring_instrument_errors() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(|request| match request {
            "SYST:ERR?" => Some("-224,\"Illegal parameter value\"".into()),
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let quiet = StreamCommands {
            check_errors: false,
            ..StreamCommands::default()
        };
        StreamSession::new(&channel, MockConnector::new(log.clone()))
            .with_commands(quiet)
            .run(&index, &file)
            .unwrap();
        assert!(!sent_commands(&log.lock()).contains(&"SYST:ERR?"));
    }

    #[test]
    fn test_barrier_waits_for_delayed_stream_write() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let connector = MockConnector::new(log.clone()).with_delay(Duration::from_millis(50));
        StreamSession::new(&channel, connector)
            .with_chunk_size(RECORD_WIDTH)
            .run(&index, &file)
            .unwrap();

        let events = log.lock().clone();
        let last_write = events
            .iter()
            .rposition(|e| matches!(e, Event::StreamWrite(_)))
            .unwrap();
        let first_barrier = events
            .iter()
            .position(|e| *e == Event::Command("*OPC?".into()))
            .unwrap();
        let trigger = events
            .iter()
            .position(|e| *e == Event::Command("stream:trigger:play:immediate".into()))
            .unwrap();

        assert_eq!(
            events.iter().filter(|e| matches!(e, Event::StreamWrite(_))).count(),
            3
        );
        assert!(last_write < first_barrier);
        assert!(first_barrier < trigger);
    }

    #[test]
    fn test_stream_failure_cleans_up_without_barrier() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let err = StreamSession::new(&channel, MockConnector::new(log.clone()).failing())
            .run(&index, &file)
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Stream));
        assert!(matches!(err.root(), PdwError::Transport(_)));

        let events = log.lock().clone();
        let opened = events.iter().position(|e| *e == Event::StreamOpen).unwrap();
        let tail = &events[opened + 1..];
        assert_eq!(
            tail,
            &[
                Event::StreamClose,
                Event::Command("stream:state off".into()),
            ]
        );
        assert!(!sent_commands(&events).contains(&"*OPC?"));
    }

    #[test]
    fn test_barrier_timeout_fails_in_sync_phase() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(|request| match request {
            "*OPC?" => None,
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let err = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Sync));
        assert!(matches!(err.root(), PdwError::Timeout(q) if q == "*OPC?"));

        let events = log.lock().clone();
        assert!(!sent_commands(&events).contains(&"stream:trigger:play:immediate"));
        let n = events.len();
        assert_eq!(
            &events[n - 2..],
            &[
                Event::StreamClose,
                Event::Command("stream:state off".into()),
            ]
        );
    }

    #[test]
    fn test_session_after_barrier_timeout_fails_fast() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(|request| match request {
            "*OPC?" => None,
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let first = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap_err();
        assert!(matches!(first.root(), PdwError::Timeout(_)));
        assert!(channel.is_poisoned());
        let before = log.lock().len();

        // A late "+1" must not be read as the next session's error query answer
        let second = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap_err();
        assert_eq!(second.phase(), Some(Phase::Configure));
        assert!(matches!(second.root(), PdwError::Transport(_)));
        assert_eq!(&log.lock()[before..], &[Event::Command("stream:state off".into())]);
    }

    #[test]
    fn test_completion_barrier_rejected_fails_in_trigger_phase() {
        let (index, file) = fixture();
        let mut barriers = 0;
        let instrument = MockInstrument::new(move |request| match request {
            "*OPC?" => {
                barriers += 1;
                let answer = if barriers == 1 { "+1" } else { "0" };
                Some(answer.to_string())
            }
            other => responder(other),
        });
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        let streaming = StreamSession::new(&channel, MockConnector::new(log.clone()))
            .configure(&index)
            .unwrap()
            .send_header(&file)
            .unwrap()
            .stream_body()
            .unwrap();
        assert_eq!(streaming.state(), SessionState::Streaming);
        assert_eq!(streaming.bytes_streamed(), (3 * RECORD_WIDTH) as u64);

        let err = streaming.play().unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Trigger));
        assert!(matches!(err.root(), PdwError::SyncRejected { .. }));
        assert_eq!(log.lock().last(), Some(&Event::Command("stream:state off".into())));
    }

    #[test]
    fn test_sessions_on_one_channel_serialize() {
        let (index, file) = fixture();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap();
        let first_len = log.lock().len();
        StreamSession::new(&channel, MockConnector::new(log.clone()))
            .run(&index, &file)
            .unwrap();

        let events = log.lock().clone();
        assert_eq!(events.len(), first_len * 2);
        assert_eq!(&events[..first_len], &events[first_len..]);
    }

    #[test]
    fn test_download_pdw_table() {
        let mut table = PdwTable::new(["Operation", "Time", "Frequency", "Name"]).unwrap();
        table.push_row(&[&1, &0, &1e9, &"A"]).unwrap();
        table.push_row(&[&2, &10e-6, &1e9, &"A"]).unwrap();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        download_pdw_table(&mut channel.lock(), "basic_chirp", &table, &StreamCommands::default()).unwrap();

        let events = log.lock().clone();
        assert_eq!(
            events,
            vec![
                Event::Command("stream:state off".into()),
                Event::Block {
                    prefix: "memory:data \"basic_chirp.csv\", ".into(),
                    len: table.serialize().len(),
                },
                Event::Command("memory:import:stream \"basic_chirp.csv\",\"basic_chirp\"".into()),
                Event::Command("SYST:ERR?".into()),
            ]
        );

        let err = download_pdw_table(&mut channel.lock(), "bad\"name", &table, &StreamCommands::default()).unwrap_err();
        assert!(matches!(err, PdwError::InvalidParameter(_)));
        assert_eq!(log.lock().len(), events.len());
    }

    #[test]
    fn test_download_waveform() {
        let waveform = Waveform::new("A", vec![0.5; 60], vec![-0.5; 60], &InstrumentLimits::default()).unwrap();
        let instrument = MockInstrument::new(responder);
        let log = instrument.log();
        let channel = CommandChannel::new(instrument);

        download_waveform(&mut channel.lock(), &waveform, &StreamCommands::default()).unwrap();

        let events = log.lock().clone();
        assert_eq!(
            events,
            vec![
                Event::Block {
                    prefix: "memory:data \"WFM1:A\", ".into(),
                    len: 60 * 4,
                },
                Event::Command("SYST:ERR?".into()),
            ]
        );
    }
}
