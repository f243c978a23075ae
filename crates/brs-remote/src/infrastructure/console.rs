//! Debug console client: a long-lived TCP text session with auto-reconnect.
//!
//! Architecture:
//! - A reader task owns the socket's read half and turns it into
//!   [`ConsoleEvent`]s on an `mpsc` channel (data, error, close).
//! - A session task drains that channel, decodes UTF-8 across chunk
//!   boundaries and feeds the shared [`LineBuffer`].
//! - The write half sits behind an async mutex, tagged with the connection
//!   generation that opened it, so a stale session can never clear a newer
//!   connection's writer.
//!
//! # State machine
//!
//! ```text
//!               connect()                  socket open
//! Disconnected ──────────▶ Connecting ─────────────────▶ Connected
//!      ▲                       │                             │
//!      │   refused / timeout   │        close / error        │
//!      └───────────────────────┴─────────────────────────────┘
//!                    (arms one reconnect timer unless disconnect() was called)
//! ```
//!
//! Commands are not correlated with their output: [`ConsoleClient::send_command`]
//! returns whatever lines arrived while it waited.  Callers must not issue
//! overlapping commands on one client.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use brs_core::{LineBuffer, SimulatorConfig, MAX_BUFFER_LINES};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::application::status::HealthProbe;
use crate::error::ClientError;

/// Deadline for one connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed delay between a lost connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Deadline for writing one command.  The writer lock is held while writing,
/// so a peer that stops reading must not stall `disconnect()`.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 4096;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection phase of a [`ConsoleClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Events produced by [`read_console_stream`].
#[derive(Debug)]
pub enum ConsoleEvent {
    /// Raw bytes as they arrived; may end mid-line or mid-character.
    Data(Vec<u8>),
    /// The read failed; no further events follow.
    Error(io::Error),
    /// The peer closed the stream.
    Closed,
}

/// Tunables for a [`ConsoleClient`].
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub write_timeout: Duration,
    /// Number of complete lines retained.
    pub buffer_capacity: usize,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
            write_timeout: WRITE_TIMEOUT,
            buffer_capacity: MAX_BUFFER_LINES,
        }
    }
}

/// Client for the simulator's debug console.
///
/// Dropping the client stops its background tasks and any pending reconnect.
#[derive(Debug)]
pub struct ConsoleClient {
    shared: Arc<Shared>,
}

impl ConsoleClient {
    /// Creates a disconnected client for the console port of `config`.
    pub fn new(config: &SimulatorConfig) -> Self {
        Self::with_options(config.console_addr(), ConsoleOptions::default())
    }

    /// Creates a disconnected client for `addr` (`host:port`).
    pub fn with_options(addr: impl Into<String>, options: ConsoleOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                addr: addr.into(),
                connect_timeout: options.connect_timeout,
                reconnect_delay: options.reconnect_delay,
                write_timeout: options.write_timeout,
                session: Mutex::new(Session::default()),
                buffer: Mutex::new(LineBuffer::with_capacity(options.buffer_capacity)),
                writer: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn addr(&self) -> &str {
        &self.shared.addr
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock_session().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens the connection and enables auto-reconnect.
    ///
    /// A no-op while already connecting or connected.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConsoleConnect`] if the connection is refused.
    /// - [`ClientError::Timeout`] if it is not established within the deadline.
    /// - [`ClientError::NotConnected`] if [`disconnect`](Self::disconnect) was
    ///   called while the attempt was in flight.
    pub async fn connect(&self) -> Result<(), ClientError> {
        Arc::clone(&self.shared).open(Origin::Caller).await
    }

    /// Closes the socket and cancels any pending reconnect.
    ///
    /// The client stays disconnected until [`connect`](Self::connect) is
    /// called again.  The line buffer is kept.
    pub async fn disconnect(&self) {
        let handles = {
            let mut session = self.shared.lock_session();
            session.auto_reconnect = false;
            session.generation += 1;
            session.phase = ConnectionState::Disconnected;
            session.take_tasks()
        };
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }

        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            if let Err(e) = writer.half.shutdown().await {
                debug!("console shutdown: {e}");
            }
        }
        info!(addr = %self.shared.addr, "console disconnected");
    }

    /// Writes `command` followed by CRLF, waits `wait`, and returns the lines
    /// that arrived in the meantime joined with `\n`.
    ///
    /// Connects first if needed.  Commands must be serialized by the caller.
    ///
    /// # Errors
    ///
    /// - Any error from [`connect`](Self::connect).
    /// - [`ClientError::NotConnected`] if no connection is live after connecting.
    /// - [`ClientError::ConsoleWrite`] if the write fails.
    /// - [`ClientError::Timeout`] if the peer does not take the command within
    ///   the write deadline.
    pub async fn send_command(&self, command: &str, wait: Duration) -> Result<String, ClientError> {
        self.connect().await?;

        let mark = {
            let mut guard = self.shared.writer.lock().await;
            let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
            let mark = self.shared.lock_buffer().mark();
            debug!("console <- {command}");
            let line = format!("{command}\r\n");
            let timeout = self.shared.write_timeout;
            time::timeout(timeout, writer.half.write_all(line.as_bytes()))
                .await
                .map_err(|_| ClientError::Timeout {
                    operation: format!("console write to {}", self.shared.addr),
                    timeout,
                })?
                .map_err(ClientError::ConsoleWrite)?;
            mark
        };

        time::sleep(wait).await;
        Ok(self.shared.lock_buffer().lines_since(mark).join("\n"))
    }

    /// The last `n` buffered lines, oldest first.
    pub fn get_recent_lines(&self, n: usize) -> Vec<String> {
        self.shared.lock_buffer().recent(n)
    }

    /// Tries to connect and reports whether the client is now connected.
    pub async fn check_health(&self) -> bool {
        if let Err(e) = self.connect().await {
            debug!("console health check failed: {e}");
        }
        self.is_connected()
    }
}

#[async_trait]
impl HealthProbe for ConsoleClient {
    async fn check_health(&self) -> bool {
        ConsoleClient::check_health(self).await
    }
}

impl Drop for ConsoleClient {
    fn drop(&mut self) {
        let mut session = self.shared.lock_session();
        session.auto_reconnect = false;
        session.generation += 1;
        for handle in session.take_tasks().into_iter().flatten() {
            handle.abort();
        }
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Who asked for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Caller,
    Timer,
}

#[derive(Debug, Default)]
struct Session {
    phase: ConnectionState,
    /// Bumped on every attempt and every explicit disconnect.
    generation: u64,
    auto_reconnect: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    session_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl Session {
    fn take_tasks(&mut self) -> [Option<JoinHandle<()>>; 3] {
        [
            self.reconnect_timer.take(),
            self.session_task.take(),
            self.reader_task.take(),
        ]
    }
}

#[derive(Debug)]
struct Writer {
    generation: u64,
    half: OwnedWriteHalf,
}

#[derive(Debug)]
struct Shared {
    addr: String,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    write_timeout: Duration,
    session: Mutex<Session>,
    buffer: Mutex<LineBuffer>,
    writer: tokio::sync::Mutex<Option<Writer>>,
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>;

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, LineBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One connection attempt.  Boxed because the reconnect timer it may arm
    /// calls back into it.
    fn open(self: Arc<Self>, origin: Origin) -> ConnectFuture {
        Box::pin(async move {
            let generation = {
                let mut session = self.lock_session();
                match origin {
                    Origin::Timer => {
                        session.reconnect_timer = None;
                        if !session.auto_reconnect {
                            return Ok(());
                        }
                    }
                    Origin::Caller => session.auto_reconnect = true,
                }
                if session.phase != ConnectionState::Disconnected {
                    return Ok(());
                }
                session.phase = ConnectionState::Connecting;
                session.generation += 1;
                session.generation
            };

            debug!(addr = %self.addr, ?origin, "connecting to console");
            let stream = match time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    self.attempt_failed(generation);
                    return Err(ClientError::ConsoleConnect {
                        addr: self.addr.clone(),
                        source,
                    });
                }
                Err(_) => {
                    self.attempt_failed(generation);
                    return Err(ClientError::Timeout {
                        operation: format!("console connect to {}", self.addr),
                        timeout: self.connect_timeout,
                    });
                }
            };

            let (read_half, write_half) = stream.into_split();
            *self.writer.lock().await = Some(Writer {
                generation,
                half: write_half,
            });

            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            {
                let mut session = self.lock_session();
                if session.generation == generation {
                    session.phase = ConnectionState::Connected;
                    session.reader_task = Some(tokio::spawn(read_console_stream(read_half, tx)));
                    session.session_task =
                        Some(tokio::spawn(Arc::clone(&self).run_session(generation, rx)));
                    info!(addr = %self.addr, "console connected");
                    return Ok(());
                }
            }

            // disconnect() won the race; drop the fresh socket.
            self.clear_writer(generation).await;
            Err(ClientError::NotConnected)
        })
    }

    fn attempt_failed(self: &Arc<Self>, generation: u64) {
        let mut session = self.lock_session();
        if session.generation != generation {
            return;
        }
        session.phase = ConnectionState::Disconnected;
        if session.auto_reconnect {
            self.arm_reconnect(&mut session);
        }
    }

    /// Arms the reconnect timer unless one is already pending.
    fn arm_reconnect(self: &Arc<Self>, session: &mut Session) {
        if session.reconnect_timer.is_some() {
            return;
        }
        let this = Arc::clone(self);
        let delay = self.reconnect_delay;
        debug!("console reconnect in {delay:?}");
        session.reconnect_timer = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            if let Err(e) = this.open(Origin::Timer).await {
                debug!("console reconnect failed: {e}");
            }
        }));
    }

    async fn run_session(self: Arc<Self>, generation: u64, mut events: mpsc::Receiver<ConsoleEvent>) {
        let mut decoder = Utf8Carry::default();
        while let Some(event) = events.recv().await {
            match event {
                ConsoleEvent::Data(bytes) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        let lines = self.lock_buffer().ingest(&text);
                        trace!(bytes = bytes.len(), lines, "console data");
                    }
                }
                ConsoleEvent::Error(e) => warn!("console read error: {e}"),
                ConsoleEvent::Closed => break,
            }
        }
        self.connection_lost(generation).await;
    }

    async fn connection_lost(self: &Arc<Self>, generation: u64) {
        {
            let mut session = self.lock_session();
            if session.generation != generation {
                return;
            }
            info!(addr = %self.addr, "console connection closed");
            session.phase = ConnectionState::Disconnected;
            session.session_task = None;
            session.reader_task = None;
            if session.auto_reconnect {
                self.arm_reconnect(&mut session);
            }
        }
        self.clear_writer(generation).await;
    }

    async fn clear_writer(&self, generation: u64) {
        let mut guard = self.writer.lock().await;
        if guard.as_ref().is_some_and(|w| w.generation == generation) {
            *guard = None;
        }
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads `reader` until EOF or error, forwarding each chunk on `events`.
///
/// Ends with exactly one [`ConsoleEvent::Closed`] or [`ConsoleEvent::Error`],
/// or silently if the receiver is gone.
pub async fn read_console_stream<R>(mut reader: R, events: mpsc::Sender<ConsoleEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let event = match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(ConsoleEvent::Closed).await;
                return;
            }
            Ok(n) => ConsoleEvent::Data(buf[..n].to_vec()),
            Err(e) => {
                let _ = events.send(ConsoleEvent::Error(e)).await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
}

/// Decodes UTF-8 that may be split across reads.
///
/// An incomplete character at the end of a chunk is held back until the next
/// chunk; invalid bytes are replaced.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let tail = self.pending.split_off(complete);
        let head = std::mem::replace(&mut self.pending, tail);
        String::from_utf8_lossy(&head).into_owned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
