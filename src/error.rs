//! Error kinds per the error handling design: Configuration, Protocol, OS, Encoding.

use std::fmt;
use thiserror::Error;

/// Which read-family operation hit unexpected EOF, for `ProtocolError::UnexpectedEof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    ExactSize,
    Pattern,
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadKind::ExactSize => write!(f, "exact-size read"),
            ReadKind::Pattern => write!(f, "pattern read"),
        }
    }
}

/// Top-level error type for the `zio` library.
#[derive(Error, Debug)]
pub enum ZioError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{kind} hit EOF before completion ({} bytes buffered)", .partial.len())]
    UnexpectedEof { kind: ReadKind, partial: Vec<u8> },

    #[error("invalid encoding input: {0}")]
    Encoding(String),

    #[error("child process was stopped, which is unsupported")]
    ChildStopped,

    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ZioResult<T> = Result<T, ZioError>;

impl ZioError {
    pub fn config(msg: impl Into<String>) -> Self {
        ZioError::Configuration(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        ZioError::Encoding(msg.into())
    }

    /// Returns the partial buffer carried by an unexpected-EOF error, if any.
    pub fn partial(&self) -> Option<&[u8]> {
        match self {
            ZioError::UnexpectedEof { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
