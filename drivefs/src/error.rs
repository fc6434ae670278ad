use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    // Contract violations on a handle
    #[error("invalid operation: {0}")]
    InvalidOperation(String), // Contains a descriptive message

    #[error("{0} not found")]
    NotFound(String),

    #[error("negative offset {0} is not supported")]
    NegativeOffset(i64),

    #[error("no content available for {0}")]
    NoContent(String), // Contains the node name

    // Remote failures
    #[error("remote returned {status} for {url}")]
    Http { status: StatusCode, url: String },

    #[error("invalid remote response: {0}")]
    InvalidResponse(String),

    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn from_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::Http {
            status,
            url: url.into(),
        }
    }

    /// The POSIX-flavoured kind a file-serving protocol layer should report.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidOperation(_) | Self::NegativeOffset(_) | Self::Config(_) => {
                io::ErrorKind::InvalidInput
            }
            Self::NotFound(_) => io::ErrorKind::NotFound,
            Self::NoContent(_) => io::ErrorKind::PermissionDenied,
            Self::Http { status, .. } => match *status {
                StatusCode::NOT_FOUND | StatusCode::GONE => io::ErrorKind::NotFound,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    io::ErrorKind::PermissionDenied
                }
                StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                    io::ErrorKind::TimedOut
                }
                _ => io::ErrorKind::Other,
            },
            Self::Transport(err) if err.is_timeout() => io::ErrorKind::TimedOut,
            Self::Io(err) => err.kind(),
            Self::InvalidResponse(_) | Self::Json(_) => io::ErrorKind::InvalidData,
            Self::Transport(_) => io::ErrorKind::Other,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(err) => err,
            other => io::Error::new(other.kind(), other),
        }
    }
}
