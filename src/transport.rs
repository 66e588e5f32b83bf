//! Byte-stream transport.
//!
//! [`StreamBridge`] connects any [`Read`]/[`Write`] pair (a PTY, a socket, a pipe)
//! to a terminal session:
//!
//! 1. A background thread reads the stream in 4KB chunks
//! 2. Chunks travel through a [flume](https://docs.rs/flume) channel, so the UI
//!    side can poll them ([`StreamBridge::try_next`]) or await them
//!    ([`StreamBridge::next`]) on any executor
//! 3. Chunks are decoded as UTF-8, holding back a multi-byte character split
//!    across two reads until its tail arrives
//! 4. [`TransportEvent::deliver`] hands the text to a
//!    [`ControlHandle`](crate::handle::ControlHandle); end of stream becomes
//!    `on_connection_closed`
//!
//! In the other direction, [`StreamBridge::input_sink`] is an `on_data` callback
//! that writes what the user types into the stream.
//!
//! # Example
//!
//! ```ignore
//! let mut bridge = StreamBridge::new(reader, writer)?;
//! let props = TerminalProps::new(config).with_data_callback({
//!     let sink = bridge.input_sink();
//!     move |data| sink(data)
//! });
//! // On every UI tick:
//! bridge.pump(&adapter.handle());
//! ```

use crate::engine::Engine;
use crate::handle::ControlHandle;
use crate::session::DataCallback;
use anyhow::Context as _;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Reason reported when the stream ends cleanly.
pub const STREAM_CLOSED_REASON: &str = "process exited";

const READ_CHUNK_SIZE: usize = 4096;

/// What the transport has for the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Decoded output, to be written verbatim.
    Data(String),
    /// The stream ended; carries the reason to show.
    Closed(String),
}

impl TransportEvent {
    /// Forward this event to the session behind `handle`.
    pub fn deliver<E: Engine>(&self, handle: &ControlHandle<E>) {
        match self {
            TransportEvent::Data(data) => handle.on_data_received(data),
            TransportEvent::Closed(reason) => handle.on_connection_closed(reason),
        }
    }
}

enum Chunk {
    Bytes(Vec<u8>),
    Eof,
    Failed(String),
}

/// Thread-safe writer shared between the bridge and its input sinks.
type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Connects a byte stream to a terminal session.
pub struct StreamBridge {
    writer: SharedWriter,
    chunks: flume::Receiver<Chunk>,
    decoder: Utf8Decoder,
    ready: VecDeque<TransportEvent>,
    closed: bool,
}

impl StreamBridge {
    /// Start reading `reader` on a background thread.
    pub fn new<R, W>(reader: R, writer: W) -> anyhow::Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (chunks_tx, chunks_rx) = flume::unbounded();
        thread::Builder::new()
            .name("terminal-stream-reader".into())
            .spawn(move || read_blocking(reader, chunks_tx))
            .context("failed to spawn terminal stream reader")?;

        Ok(Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            chunks: chunks_rx,
            decoder: Utf8Decoder::default(),
            ready: VecDeque::new(),
            closed: false,
        })
    }

    /// Write user input into the stream.
    pub fn send_input(&self, data: &str) -> anyhow::Result<()> {
        write_input(&self.writer, data)
    }

    /// An `on_data` callback that writes into the stream.
    pub fn input_sink(&self) -> DataCallback {
        let writer = Arc::clone(&self.writer);
        Rc::new(move |data: &str| {
            if let Err(error) = write_input(&writer, data) {
                tracing::warn!("{error:#}");
            }
        })
    }

    /// The next event, if one is ready without blocking.
    pub fn try_next(&mut self) -> Option<TransportEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }
            match self.chunks.try_recv() {
                Ok(chunk) => self.accept(chunk),
                Err(flume::TryRecvError::Empty) => return None,
                Err(flume::TryRecvError::Disconnected) => self.accept(Chunk::Eof),
            }
        }
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<TransportEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }
            match self.chunks.recv_timeout(timeout) {
                Ok(chunk) => self.accept(chunk),
                Err(flume::RecvTimeoutError::Timeout) => return None,
                Err(flume::RecvTimeoutError::Disconnected) => self.accept(Chunk::Eof),
            }
        }
    }

    /// Wait for the next event. Returns `None` once the close has been reported.
    pub async fn next(&mut self) -> Option<TransportEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if self.closed {
                return None;
            }
            let chunk = self.chunks.recv_async().await.unwrap_or(Chunk::Eof);
            self.accept(chunk);
        }
    }

    /// Deliver every event that is ready. Returns `false` once the stream closed.
    pub fn pump<E: Engine>(&mut self, handle: &ControlHandle<E>) -> bool {
        while let Some(event) = self.try_next() {
            event.deliver(handle);
        }
        !self.is_closed()
    }

    /// Whether the end of the stream has been handed out.
    pub fn is_closed(&self) -> bool {
        self.closed && self.ready.is_empty()
    }

    fn accept(&mut self, chunk: Chunk) {
        let reason = match chunk {
            Chunk::Bytes(bytes) => {
                let text = self.decoder.decode(&bytes);
                if !text.is_empty() {
                    self.ready.push_back(TransportEvent::Data(text));
                }
                return;
            }
            Chunk::Eof => STREAM_CLOSED_REASON.to_owned(),
            Chunk::Failed(error) => error,
        };

        let rest = self.decoder.finish();
        if !rest.is_empty() {
            self.ready.push_back(TransportEvent::Data(rest));
        }
        tracing::debug!(%reason, "terminal stream closed");
        self.ready.push_back(TransportEvent::Closed(reason));
        self.closed = true;
    }
}

fn write_input(writer: &SharedWriter, data: &str) -> anyhow::Result<()> {
    let mut writer = writer.lock();
    writer
        .write_all(data.as_bytes())
        .and_then(|()| writer.flush())
        .context("failed to write terminal input")
}

/// Background thread body: read until EOF or error.
fn read_blocking<R: Read>(mut reader: R, chunks_tx: flume::Sender<Chunk>) {
    let mut buffer = [0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                let _ = chunks_tx.send(Chunk::Eof);
                break;
            }
            Ok(n) => {
                if chunks_tx.send(Chunk::Bytes(buffer[..n].to_vec())).is_err() {
                    break; // Bridge dropped
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                tracing::warn!(%error, "terminal stream read failed");
                let _ = chunks_tx.send(Chunk::Failed(error.to_string()));
                break;
            }
        }
    }
}

/// Incremental UTF-8 decoding. Invalid sequences become U+FFFD; an incomplete
/// sequence at the end of a chunk waits for the next one.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    return text;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match error.error_len() {
                        Some(invalid_len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid_len);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            return text;
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
