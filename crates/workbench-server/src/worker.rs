//! Connection worker
//!
//! Binds one accepted connection to one [`Session`] and drives it until the
//! peer goes away. Requests are handled strictly one after another: a request
//! is fully read, processed and answered before the next byte is looked at.
//!
//! Every request failure is answered with exactly one `Error:0` frame and
//! the connection goes back to waiting for a command.

use crate::codec::{self, EncodedPayload};
use crate::config::Account;
use crate::context::ServerContext;
use crate::error::{ConnectionError, ExecutionError, RequestError};
use crate::protocol::{self, PayloadKind};
use crate::session::{Session, SessionEvent, SessionPhase};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;
use workbench_core::{Model, ModelId};

/// Size of one socket read
const READ_CHUNK: usize = 64 * 1024;

/// Identifies a connection in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a finished connection did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Logged in as
    pub username: Option<String>,
    /// Models accepted into the workspace
    pub models_received: usize,
    /// Algorithms run successfully
    pub algorithms_run: usize,
    /// Result models streamed back
    pub results_sent: usize,
    /// Requests answered with `Error:0`
    pub errors: usize,
}

enum ReadOutcome {
    Data(usize),
    Eof,
    TimedOut,
}

/// Serves one client connection
pub struct ConnectionWorker<S> {
    id: ConnectionId,
    stream: S,
    session: Session,
    context: ServerContext,
    payload_timeout: Option<Duration>,
    outcome: WorkerOutcome,
}

impl<S> ConnectionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take ownership of `stream`
    pub fn new(stream: S, accounts: Arc<[Account]>, context: ServerContext) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            session: Session::new(accounts),
            context,
            payload_timeout: None,
            outcome: WorkerOutcome::default(),
        }
    }

    /// Abort a payload when no bytes arrive for `timeout`
    #[must_use]
    pub fn with_payload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.payload_timeout = timeout;
        self
    }

    /// Use a specific connection id
    #[must_use]
    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve until the peer disconnects or the stream fails
    pub async fn run(mut self) -> WorkerOutcome {
        let id = self.id;
        tracing::info!(connection = %id, "client connected");

        if let Err(e) = self.pump().await {
            tracing::warn!(connection = %id, error = %e, "connection failed");
        }

        self.session.close();
        tracing::info!(
            connection = %id,
            models = self.outcome.models_received,
            algorithms = self.outcome.algorithms_run,
            errors = self.outcome.errors,
            "client disconnected"
        );
        self.outcome
    }

    async fn pump(&mut self) -> Result<(), ConnectionError> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match self.read_chunk(&mut buf).await? {
                ReadOutcome::Data(n) => {
                    self.session.feed(&buf[..n]);
                    self.drain_events().await?;
                }
                ReadOutcome::Eof => {
                    if self.session.phase() == SessionPhase::ReceivingPayload {
                        let err = RequestError::TransportIncomplete {
                            expected: self.session.buffered_payload() + self.session.expected_bytes(),
                            received: self.session.buffered_payload(),
                        };
                        tracing::warn!(connection = %self.id, error = %err, "request failed");
                    }
                    return Ok(());
                }
                ReadOutcome::TimedOut => {
                    let err = RequestError::TransportIncomplete {
                        expected: self.session.buffered_payload() + self.session.expected_bytes(),
                        received: self.session.buffered_payload(),
                    };
                    self.session.abort_payload()?;
                    self.fail(&err).await?;
                }
            }
        }
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let read = match self.payload_timeout {
            Some(timeout) if self.session.phase() == SessionPhase::ReceivingPayload => {
                match tokio::time::timeout(timeout, self.stream.read(buf)).await {
                    Ok(read) => read?,
                    Err(_) => return Ok(ReadOutcome::TimedOut),
                }
            }
            _ => self.stream.read(buf).await?,
        };
        Ok(if read == 0 {
            ReadOutcome::Eof
        } else {
            ReadOutcome::Data(read)
        })
    }

    async fn drain_events(&mut self) -> Result<(), ConnectionError> {
        while let Some(event) = self.session.poll()? {
            match event {
                SessionEvent::LoggedIn { username } => {
                    tracing::info!(connection = %self.id, user = %username, "client logged in");
                    self.outcome.username = Some(username);
                }
                SessionEvent::PayloadComplete {
                    kind: PayloadKind::Model,
                    expected,
                    payload,
                } => self.handle_model(&payload, expected).await?,
                SessionEvent::PayloadComplete {
                    kind: PayloadKind::Algorithm,
                    expected,
                    payload,
                } => self.handle_algorithm(&payload, expected).await?,
            }
        }
        Ok(())
    }

    async fn handle_model(&mut self, payload: &[u8], expected: usize) -> io::Result<()> {
        tracing::debug!(connection = %self.id, bytes = expected, "model payload received");
        match self.load_model(payload, expected) {
            Ok(id) => {
                self.outcome.models_received += 1;
                tracing::info!(
                    connection = %self.id,
                    model = %id,
                    models = self.context.workspace().len(),
                    "model added"
                );
                self.write_flushed(protocol::SUCCESS).await
            }
            Err(e) => self.fail(&e).await,
        }
    }

    fn load_model(&self, payload: &[u8], expected: usize) -> Result<ModelId, RequestError> {
        let document = codec::decode(payload, expected)?;
        let model = self.context.models().deserialize(&document)?;
        let id = model.id().clone();
        self.context.workspace().insert(model);
        Ok(id)
    }

    async fn handle_algorithm(&mut self, payload: &[u8], expected: usize) -> io::Result<()> {
        tracing::debug!(connection = %self.id, bytes = expected, "algorithm payload received");
        let frames = match self.run_algorithm(payload, expected).await {
            Ok(frames) => frames,
            Err(e) => return self.fail(&e).await,
        };

        self.outcome.algorithms_run += 1;
        for frame in frames {
            let header = frame.header(PayloadKind::Model);
            tracing::debug!(connection = %self.id, header = header.trim_end(), "sending result");
            self.write_flushed(header.as_bytes()).await?;
            self.write_flushed(frame.as_bytes()).await?;
            self.outcome.results_sent += 1;
        }
        Ok(())
    }

    /// Decode, run, and encode every result before anything is written
    async fn run_algorithm(
        &mut self,
        payload: &[u8],
        expected: usize,
    ) -> Result<Vec<EncodedPayload>, RequestError> {
        let document = codec::decode(payload, expected)?;
        let mut algorithm = self.context.algorithms().deserialize(&document)?;
        tracing::debug!(
            connection = %self.id,
            algorithm = algorithm.type_name(),
            "algorithm loaded"
        );

        let executor = self.context.executor().clone();
        let results = tokio::task::spawn_blocking(move || executor.execute(algorithm.as_mut()))
            .await
            .map_err(|_| ExecutionError::NonExplainable)??;

        Ok(results
            .iter()
            .map(|model| codec::encode_model(model.as_ref()))
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn fail(&mut self, error: &RequestError) -> io::Result<()> {
        self.outcome.errors += 1;
        tracing::warn!(connection = %self.id, error = %error, "request failed");
        self.write_flushed(protocol::ERROR).await
    }

    async fn write_flushed(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }
}

impl<S> fmt::Debug for ConnectionWorker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .field("state", &self.session.state())
            .field("payload_timeout", &self.payload_timeout)
            .finish_non_exhaustive()
    }
}
