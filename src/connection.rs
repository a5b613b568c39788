//! Connection management and the queue-client seam.
//!
//! A [`Connection`] owns one beanstalkd session. It is dialed once by the
//! entry point, handed by reference to the dispatcher and the tube engine,
//! and closed once on the way out. The engine only sees the [`QueueClient`]
//! trait, which keeps it independent of the transport.

use crate::error::{CliError, ConnectionError, ProtocolError};
use crate::models::{JobId, PutRequest, ReservedJob};
use crate::protocol::{self, Reply, Request};
use crate::stats::{self, StatsReport};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:11300";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TUBE: &str = "default";

/// Where and how to dial.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// The operations the tube engine and dispatcher need from a queue server.
#[allow(async_fn_in_trait)]
pub trait QueueClient {
    /// Global server statistics.
    async fn stats(&mut self) -> Result<StatsReport, ProtocolError>;

    async fn list_tubes(&mut self) -> Result<Vec<String>, ProtocolError>;

    async fn delete(&mut self, id: JobId) -> Result<(), ProtocolError>;

    async fn tube_stats(&mut self, tube: &str) -> Result<StatsReport, ProtocolError>;

    /// Move up to `bound` buried or delayed jobs of `tube` back to ready.
    /// Returns how many the server actually kicked.
    async fn kick(&mut self, tube: &str, bound: u64) -> Result<u64, ProtocolError>;

    async fn put(&mut self, tube: &str, job: &PutRequest) -> Result<JobId, ProtocolError>;

    /// Reserve the next ready job from any of `tubes`, waiting at most `timeout`.
    async fn reserve_with_timeout(
        &mut self,
        tubes: &[&str],
        timeout: Duration,
    ) -> Result<ReservedJob, ProtocolError>;
}

/// A live beanstalkd session over any byte stream (TCP in production).
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    endpoint: String,
    stream: BufReader<S>,
    using: String,
    watched: Vec<String>,
}

impl Connection<TcpStream> {
    /// Dial the server exactly once, bounded by `config.connect_timeout`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ConnectionError> {
        let endpoint = config.endpoint.clone();
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| ConnectionError::Timeout {
                endpoint: endpoint.clone(),
                secs: config.connect_timeout.as_secs(),
            })?
            .map_err(|source| ConnectionError::Dial {
                endpoint: endpoint.clone(),
                source,
            })?;
        debug!(%endpoint, "connected to beanstalkd");
        Ok(Self::from_stream(endpoint, stream))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already established stream. A fresh session uses and watches
    /// the `default` tube.
    pub fn from_stream(endpoint: impl Into<String>, stream: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            stream: BufReader::new(stream),
            using: DEFAULT_TUBE.to_string(),
            watched: vec![DEFAULT_TUBE.to_string()],
        }
    }

    /// Send `quit` and shut the stream down. Dropping the connection also
    /// releases the socket; this just ends the session politely.
    pub async fn close(mut self) -> Result<(), ProtocolError> {
        let op = Request::Quit.op();
        self.write(&Request::Quit).await?;
        self.stream
            .get_mut()
            .shutdown()
            .await
            .map_err(|source| ProtocolError::Io { op, source })?;
        debug!(endpoint = %self.endpoint, "connection closed");
        Ok(())
    }

    async fn write(&mut self, request: &Request<'_>) -> Result<(), ProtocolError> {
        let op = request.op();
        let stream = self.stream.get_mut();
        stream
            .write_all(&request.encode())
            .await
            .map_err(|source| ProtocolError::Io { op, source })?;
        stream
            .flush()
            .await
            .map_err(|source| ProtocolError::Io { op, source })
    }

    async fn read_line(&mut self, op: &'static str) -> Result<String, ProtocolError> {
        let mut line = String::new();
        let n = self
            .stream
            .read_line(&mut line)
            .await
            .map_err(|source| ProtocolError::Io { op, source })?;
        if n == 0 {
            return Err(ProtocolError::Closed { op });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read a `len`-byte body and its CRLF. The buffer grows with the bytes
    /// actually received, never with the announced length.
    async fn read_body(&mut self, op: &'static str, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let total = len
            .checked_add(protocol::CRLF.len())
            .ok_or_else(|| ProtocolError::Unexpected {
                op,
                line: format!("body length {len} out of range"),
            })?;
        let mut body = Vec::new();
        (&mut self.stream)
            .take(total as u64)
            .read_to_end(&mut body)
            .await
            .map_err(|source| ProtocolError::Io { op, source })?;
        if body.len() < total {
            return Err(ProtocolError::Closed { op });
        }
        if !body.ends_with(protocol::CRLF) {
            return Err(ProtocolError::ExpectedCrlf { op });
        }
        body.truncate(len);
        Ok(body)
    }

    /// One request, one reply head.
    async fn round_trip(&mut self, request: Request<'_>) -> Result<Reply, ProtocolError> {
        let op = request.op();
        debug!(op, "sending request");
        self.write(&request).await?;
        let line = self.read_line(op).await?;
        debug!(op, reply = %line, "received reply");
        protocol::parse_reply(op, &line)
    }

    /// Round-trip for commands answered with `OK <bytes>` and a body.
    async fn fetch_body(&mut self, request: Request<'_>) -> Result<Vec<u8>, ProtocolError> {
        let op = request.op();
        match self.round_trip(request).await? {
            Reply::Ok { len } => self.read_body(op, len).await,
            other => Err(unexpected(op, other)),
        }
    }

    async fn use_tube(&mut self, tube: &str) -> Result<(), ProtocolError> {
        if self.using == tube {
            return Ok(());
        }
        let op = "use";
        match self.round_trip(Request::Use(tube)).await? {
            Reply::Using(name) => {
                self.using = name;
                Ok(())
            }
            other => Err(unexpected(op, other)),
        }
    }

    /// Make the watch list equal to `tubes`. New tubes are watched before
    /// old ones are ignored, since the last watched tube cannot be ignored.
    async fn watch_only(&mut self, tubes: &[&str]) -> Result<(), ProtocolError> {
        for tube in tubes {
            if self.watched.iter().any(|w| w == tube) {
                continue;
            }
            match self.round_trip(Request::Watch(tube)).await? {
                Reply::Watching(_) => self.watched.push(tube.to_string()),
                other => return Err(unexpected("watch", other)),
            }
        }
        let stale: Vec<String> = self
            .watched
            .iter()
            .filter(|w| !tubes.contains(&w.as_str()))
            .cloned()
            .collect();
        for tube in stale {
            match self.round_trip(Request::Ignore(&tube)).await? {
                Reply::Watching(_) => self.watched.retain(|w| *w != tube),
                other => return Err(unexpected("ignore", other)),
            }
        }
        Ok(())
    }
}

impl<S> QueueClient for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn stats(&mut self) -> Result<StatsReport, ProtocolError> {
        let body = self.fetch_body(Request::Stats).await?;
        StatsReport::from_yaml("stats", &body)
    }

    async fn list_tubes(&mut self) -> Result<Vec<String>, ProtocolError> {
        let body = self.fetch_body(Request::ListTubes).await?;
        stats::decode_list("list-tubes", &body)
    }

    async fn delete(&mut self, id: JobId) -> Result<(), ProtocolError> {
        match self.round_trip(Request::Delete(id)).await? {
            Reply::Deleted => Ok(()),
            other => Err(unexpected("delete", other)),
        }
    }

    async fn tube_stats(&mut self, tube: &str) -> Result<StatsReport, ProtocolError> {
        let body = self.fetch_body(Request::StatsTube(tube)).await?;
        StatsReport::from_yaml("stats-tube", &body)
    }

    async fn kick(&mut self, tube: &str, bound: u64) -> Result<u64, ProtocolError> {
        self.use_tube(tube).await?;
        match self.round_trip(Request::Kick(bound)).await? {
            Reply::Kicked(n) => Ok(n),
            other => Err(unexpected("kick", other)),
        }
    }

    async fn put(&mut self, tube: &str, job: &PutRequest) -> Result<JobId, ProtocolError> {
        self.use_tube(tube).await?;
        let request = Request::Put {
            priority: job.priority,
            delay: job.delay.as_secs(),
            ttr: job.ttr.as_secs(),
            data: &job.payload,
        };
        match self.round_trip(request).await? {
            Reply::Inserted(id) => Ok(id),
            other => Err(unexpected("put", other)),
        }
    }

    async fn reserve_with_timeout(
        &mut self,
        tubes: &[&str],
        timeout: Duration,
    ) -> Result<ReservedJob, ProtocolError> {
        self.watch_only(tubes).await?;
        let op = "reserve-with-timeout";
        match self
            .round_trip(Request::ReserveWithTimeout(timeout.as_secs()))
            .await?
        {
            Reply::Reserved { id, len } => {
                let payload = self.read_body(op, len).await?;
                Ok(ReservedJob { id, payload })
            }
            other => Err(unexpected(op, other)),
        }
    }
}

/// Fail unless a connection was established. Every command that talks to
/// the server goes through here first.
pub fn require_live<C>(conn: Option<&mut C>) -> Result<&mut C, CliError> {
    conn.ok_or(CliError::NotConnected)
}

fn unexpected(op: &'static str, reply: Reply) -> ProtocolError {
    ProtocolError::Unexpected {
        op,
        line: format!("{reply:?}"),
    }
}
