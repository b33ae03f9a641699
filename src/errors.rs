use std::io;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// The peer closed the connection before sending a single byte.
    #[error("connection closed before any request bytes arrived")]
    EmptyRequest,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("missing or invalid bearer token")]
    Unauthenticated,

    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("multipart body did not carry a file")]
    DecodeFailure,

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("incomplete body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: usize, received: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Http(#[from] http::Error),
}

impl TransferError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransferError::EmptyRequest
            | TransferError::MalformedRequest(_)
            | TransferError::DecodeFailure
            | TransferError::InvalidFileName(_)
            | TransferError::IncompleteBody { .. } => StatusCode::BAD_REQUEST,
            TransferError::RouteNotFound(_) | TransferError::ResourceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            TransferError::Unauthenticated => StatusCode::UNAUTHORIZED,
            TransferError::Io(_) | TransferError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the peer went away mid-exchange; such errors are swallowed.
    pub fn is_peer_reset(&self) -> bool {
        match self {
            TransferError::Io(e) => is_connection_error(e),
            _ => false,
        }
    }
}

pub(crate) fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
    )
}
