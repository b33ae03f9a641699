use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{io, net::SocketAddr};

use http::Request;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

pub mod dispatcher;
pub mod errors;
pub mod helpers;
pub mod pages;
pub mod responses;

pub use dispatcher::Dispatcher;
pub use errors::TransferError;
pub use helpers::compression::ContentCoding;
pub use helpers::traits::http_request::{decode_multipart, RequestUtils, UploadedFile};
pub use helpers::traits::http_response::ResponseUtil;
pub use helpers::traits::http_stream::{
    complete_request, read_body, read_head, split_request, RequestHead, RequestLine, StreamHttp,
};
pub use helpers::traits::zero_copy::{load_file, FileContents, ZeroCopyFile};

pub mod external {
    pub use http;
    pub use tokio;
}

/// What the endpoint offers on `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Serve one fixed file.
    Download(PathBuf),
    /// Accept one file per POST.
    Upload,
    /// Upload form plus a listing of the download directory; the target is optional.
    Both(Option<PathBuf>),
}

impl Mode {
    pub fn target(&self) -> Option<&Path> {
        match self {
            Mode::Download(target) => Some(target),
            Mode::Both(target) => target.as_deref(),
            Mode::Upload => None,
        }
    }

    pub fn serves_downloads(&self) -> bool {
        !matches!(self, Mode::Upload)
    }

    pub fn accepts_uploads(&self) -> bool {
        !matches!(self, Mode::Download(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Download(_) => "download",
            Mode::Upload => "upload",
            Mode::Both(_) => "both",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub mode: Mode,
    pub gzip: bool,
    pub auth_token: Option<String>,
    pub timing: bool,
    pub download_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub read_buffer_size: usize,
    pub max_header_size: usize,
    pub zero_copy_threshold: usize,
}

impl ServerConfig {
    pub fn new(mode: Mode) -> ServerConfig {
        ServerConfig {
            mode,
            gzip: false,
            auth_token: None,
            timing: false,
            download_dir: PathBuf::from("archivos_servidor"),
            upload_dir: PathBuf::from("archivos_subidos"),
            read_buffer_size: 4096,
            max_header_size: 64 * 1024,
            zero_copy_threshold: 1024 * 1024, // mmap files from 1MB up
        }
    }

    pub fn gzip(mut self, enable: bool) -> Self {
        self.gzip = enable;
        self
    }

    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn timing(mut self, enable: bool) -> Self {
        self.timing = enable;
        self
    }

    pub fn download_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn upload_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    pub fn zero_copy_threshold(mut self, threshold: usize) -> Self {
        self.zero_copy_threshold = threshold;
        self
    }
}

/// Request body as read off the connection.
#[derive(Debug, Default)]
pub struct Body {
    pub bytes: Vec<u8>,
    pub content_length: usize,
    pub ip: Option<SocketAddr>,
}

impl Body {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Response body exactly as it goes on the wire.
#[derive(Debug, Default)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub coding: Option<ContentCoding>,
}

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            coding: None,
        }
    }

    pub fn encoded(bytes: &[u8], coding: ContentCoding) -> io::Result<Self> {
        Ok(Self {
            bytes: coding.encode(bytes)?,
            coding: Some(coding),
        })
    }
}

/// Where a single connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitConnection,
    ReadInitial,
    ParseLine,
    ParseHeaders,
    RouteAndRespond,
    Send,
    Close,
}

pub struct Server {
    pub listener: TcpListener,
    pub dispatcher: Dispatcher,
}

impl Server {
    pub async fn new(address: &str, config: ServerConfig) -> Result<Server, TransferError> {
        let listener = TcpListener::bind(address).await?;
        info!(
            address = %listener.local_addr()?,
            mode = config.mode.name(),
            gzip = config.gzip,
            auth = config.auth_token.is_some(),
            "server listening"
        );
        Ok(Server {
            listener,
            dispatcher: Dispatcher::new(Arc::new(config)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        self.dispatcher.config()
    }

    /// Serves connections one after another until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), TransferError> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        error!("failed to listen for shutdown signal: {e}");
                    }
                    info!("shutting down listener");
                    return Ok(());
                }
                result = self.serve_one() => {
                    if let Err(e) = result {
                        warn!("accept failed: {e}");
                    }
                }
            }
        }
    }

    /// One full accept → respond → close cycle.
    pub async fn serve_one(&mut self) -> Result<(), TransferError> {
        trace!(state = ?ConnectionState::AwaitConnection);
        let (stream, peer) = match self.listener.accept().await {
            Ok(data) => data,
            Err(e) => {
                if !errors::is_connection_error(&e) {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                return Err(e.into());
            }
        };

        Connection::new(stream, peer).handle(&self.dispatcher).await;
        Ok(())
    }
}

pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    state: ConnectionState,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            state: ConnectionState::AwaitConnection,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        trace_transition(self.peer, &mut self.state, next);
    }

    async fn read_request(&mut self, config: &ServerConfig) -> Result<Request<Body>, TransferError> {
        let peer = self.peer;
        let state = &mut self.state;
        let mut request = self
            .stream
            .parse_request_observed(config, |next| trace_transition(peer, state, next))
            .await?;
        request.body_mut().ip = Some(peer);
        Ok(request)
    }

    /// Never fails: every error ends as a logged close, with a best-effort
    /// error response whenever one can be produced.
    pub async fn handle(mut self, dispatcher: &Dispatcher) {
        let started = Instant::now();

        let ((method, path), response) = match self.read_request(dispatcher.config()).await {
            Ok(request) => {
                self.transition(ConnectionState::RouteAndRespond);
                (describe(&request), dispatcher.route(&request).await)
            }
            Err(TransferError::EmptyRequest) => {
                debug!(peer = %self.peer, "peer closed without sending a request");
                self.close().await;
                return;
            }
            Err(e) if e.is_peer_reset() => {
                debug!(peer = %self.peer, "connection reset while reading: {e}");
                self.close().await;
                return;
            }
            Err(e) => {
                warn!(peer = %self.peer, "rejecting request: {e}");
                self.transition(ConnectionState::RouteAndRespond);
                (
                    ("-".to_owned(), "-".to_owned()),
                    responses::for_error(&e),
                )
            }
        };

        self.transition(ConnectionState::Send);
        let status = response.status();
        if let Err(e) = response.responser(&mut self.stream).await {
            if errors::is_connection_error(&e) {
                debug!(peer = %self.peer, "connection reset while sending: {e}");
            } else {
                warn!(peer = %self.peer, "failed to send response: {e}");
            }
        }

        if dispatcher.config().timing {
            info!(
                peer = %self.peer,
                %method,
                %path,
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "request handled"
            );
        } else {
            debug!(peer = %self.peer, %method, %path, status = status.as_u16());
        }

        self.close().await;
    }

    async fn close(mut self) {
        self.transition(ConnectionState::Close);
        if let Err(e) = self.stream.shutdown().await {
            trace!(peer = %self.peer, "shutdown: {e}");
        }
    }
}

fn trace_transition(peer: SocketAddr, state: &mut ConnectionState, next: ConnectionState) {
    trace!(%peer, from = ?*state, to = ?next, "connection state");
    *state = next;
}

fn describe(request: &Request<Body>) -> (String, String) {
    (request.method().to_string(), request.uri().path().to_owned())
}
