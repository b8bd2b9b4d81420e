use std::fs::File;
use std::future::Future;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::framer::{FrameError, RawRequest, drain_pending, read_request};
use crate::http::mime::ContentTypes;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::response::Response;
use crate::http::writer::{ResponseWriter, stream_body};
use crate::metrics::{AccessLog, AccessLogError, CpuMeter, LogRecord, MeteredRead};

/// Everything a worker needs that outlives a single connection.
#[derive(Debug)]
pub struct ServeContext {
    /// Canonical server root; every served file resolves inside it
    root: PathBuf,
    content_types: ContentTypes,
    access_log: Arc<AccessLog>,
    max_request_size: usize,
    chunk_size: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ServeContext {
    /// Fails if the configured root does not exist.
    pub fn new(cfg: &Config, access_log: Arc<AccessLog>) -> std::io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(&cfg.static_files.root)?,
            content_types: ContentTypes::from_config(&cfg.static_files),
            access_log,
            max_request_size: cfg.server.max_request_size,
            chunk_size: cfg.static_files.chunk_size,
            read_timeout: cfg.server.read_timeout(),
            write_timeout: cfg.server.write_timeout(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// How a connection that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200 sent and logged
    Served { path: String, bytes: u64 },
    /// 404 sent
    NotFound { path: String },
    /// 400 sent
    Rejected(ParseError),
}

/// Errors that abort a connection without a complete response.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("framing error: {0}")]
    FrameError(#[from] FrameError),

    #[error("timed out writing the response")]
    WriteTimeout,

    #[error("file shrank while being sent: {sent} of {expected} bytes")]
    Truncated { sent: u64, expected: u64 },

    #[error("access log error: {0}")]
    AccessLogError(#[from] AccessLogError),
}

/// One accepted client, handled from request to close.
pub struct Connection {
    stream: TcpStream,
    ctx: Arc<ServeContext>,
    meter: CpuMeter,
}

impl Connection {
    /// `meter` must be the meter measuring the future that runs this
    /// connection; its reading ends up in the log record.
    pub fn new(stream: TcpStream, ctx: Arc<ServeContext>, meter: CpuMeter) -> Self {
        Self { stream, ctx, meter }
    }

    pub async fn run(&mut self) -> Result<Outcome, ConnectionError> {
        let raw = self.read_request().await?;
        let drained = drain_pending(&self.stream, self.ctx.max_request_size);
        if raw.trailing() + drained > 0 {
            debug!(bytes = raw.trailing() + drained, "discarded bytes after request head");
        }

        let request = match parse_http_request(raw.head(), self.ctx.max_request_size) {
            Ok(request) => request,
            Err(e) => {
                self.send_head(&Response::bad_request()).await?;
                return Ok(Outcome::Rejected(e));
            }
        };

        let Some((file, size)) = self.open_file(&request.path).await else {
            self.send_head(&Response::not_found()).await?;
            return Ok(Outcome::NotFound { path: request.path });
        };

        let content_type = self.ctx.content_types.lookup(request.extension());
        let head = Response::file(size, content_type, SystemTime::now());
        let bytes = self.send_file(&head, file, size).await?;
        if bytes != size {
            return Err(ConnectionError::Truncated {
                sent: bytes,
                expected: size,
            });
        }

        let record = LogRecord::new(request.path.clone(), bytes, SystemTime::now(), self.meter.elapsed());
        self.ctx.access_log.append(&record).await?;

        Ok(Outcome::Served {
            path: request.path,
            bytes,
        })
    }

    async fn read_request(&mut self) -> Result<RawRequest, FrameError> {
        let limit = self.ctx.max_request_size;
        let framing = read_request(&mut self.stream, limit);

        match self.ctx.read_timeout {
            Some(t) => tokio::time::timeout(t, framing)
                .await
                .map_err(|_| FrameError::TimedOut)?,
            None => framing.await,
        }
    }

    async fn send_head(&mut self, head: &Response) -> Result<(), ConnectionError> {
        let timeout = self.ctx.write_timeout;
        let stream = &mut self.stream;

        with_write_timeout(timeout, async move {
            ResponseWriter::new(head).write_to_stream(stream).await?;
            stream.flush().await
        })
        .await
    }

    async fn send_file(&mut self, head: &Response, file: File, size: u64) -> Result<u64, ConnectionError> {
        let timeout = self.ctx.write_timeout;
        let chunk_size = self.ctx.chunk_size;
        let stream = &mut self.stream;

        // Never send more than the Content-Length we announced, even if the
        // file grows while we stream it.
        let mut body = MeteredRead::new(file.take(size), self.meter.clone(), chunk_size);

        with_write_timeout(timeout, async move {
            ResponseWriter::new(head).write_to_stream(stream).await?;
            stream_body(&mut body, stream, chunk_size).await
        })
        .await
    }

    /// Opens `name` under the server root, returning the handle and its size.
    ///
    /// Anything that does not resolve to a regular file inside the root
    /// (missing files, directories, symlinks leading outside) is reported as
    /// absent.
    async fn open_file(&self, name: &str) -> Option<(File, u64)> {
        let root = self.ctx.root.clone();
        let owned = name.to_string();

        let found = match self.meter.blocking(move || lookup(&root, &owned)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(path = name, error = %e, "file lookup task failed");
                return None;
            }
        };

        match found {
            Lookup::Found(file, size) => return Some((file, size)),
            Lookup::Unresolved(e) => debug!(path = name, error = %e, "cannot resolve file"),
            Lookup::Escapes(resolved) => {
                warn!(path = name, resolved = %resolved.display(), "path escapes server root")
            }
            Lookup::Unopenable(e) => debug!(path = name, error = %e, "cannot open file"),
            Lookup::NotAFile => debug!(path = name, "not a regular file"),
        }
        None
    }
}

async fn with_write_timeout<T, F>(timeout: Option<Duration>, fut: F) -> Result<T, ConnectionError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(t) => tokio::time::timeout(t, fut)
            .await
            .map_err(|_| ConnectionError::WriteTimeout)?
            .map_err(ConnectionError::from),
        None => Ok(fut.await?),
    }
}

enum Lookup {
    Found(File, u64),
    Unresolved(std::io::Error),
    Escapes(PathBuf),
    Unopenable(std::io::Error),
    NotAFile,
}

fn lookup(root: &Path, name: &str) -> Lookup {
    let resolved = match std::fs::canonicalize(root.join(name)) {
        Ok(p) => p,
        Err(e) => return Lookup::Unresolved(e),
    };
    if !resolved.starts_with(root) {
        return Lookup::Escapes(resolved);
    }

    let file = match File::open(&resolved) {
        Ok(f) => f,
        Err(e) => return Lookup::Unopenable(e),
    };
    match file.metadata() {
        Ok(meta) if meta.is_file() => Lookup::Found(file, meta.len()),
        Ok(_) => Lookup::NotAFile,
        Err(e) => Lookup::Unopenable(e),
    }
}

/// Runs one connection to completion and closes it.
///
/// Errors stay here: they are logged and never reach the accept loop.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServeContext>) {
    let meter = CpuMeter::new();
    let mut conn = Connection::new(stream, ctx, meter.clone());

    let result = meter.measure(conn.run()).await;

    match &result {
        Ok(Outcome::Served { path, bytes }) => {
            info!(client = %peer, path = %path, bytes = *bytes, status = 200, "file served")
        }
        Ok(Outcome::NotFound { path }) => {
            info!(client = %peer, path = %path, status = 404, "file not found")
        }
        Ok(Outcome::Rejected(e)) => {
            warn!(client = %peer, error = %e, status = 400, "request rejected")
        }
        Err(ConnectionError::FrameError(FrameError::Empty)) => {
            debug!(client = %peer, "client closed without sending a request")
        }
        Err(ConnectionError::IoError(io_err))
            if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
        {
            debug!(client = %peer, "connection reset by client")
        }
        Err(e) => warn!(client = %peer, error = %e, "connection aborted"),
    }

    // Best effort; the socket is closed when `conn` drops either way.
    let _ = conn.stream.shutdown().await;
}
