//! Error types for the server
//!
//! One enum per operation. Everything that goes wrong while serving a request
//! is funneled into [`RequestError`], which the worker answers with a single
//! `Error:0` frame.

use crate::session::SessionPhase;
use std::fmt;
use std::io;
use std::path::PathBuf;
use workbench_core::{DeserializeError, WorkspaceError, XmlError};

/// Payload could not be turned into an XML document
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Received byte count differs from the declared one
    #[error("declared {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Bad gzip header or corrupt stream
    #[error("gzip: {0}")]
    Gzip(#[source] io::Error),

    /// Decompressed bytes are not a document
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Result model could not be framed
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("gzip: {0}")]
    Compress(#[source] io::Error),
}

/// Algorithm run failed
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Required parameters missing
    #[error("some parameters are not available")]
    ParametersUnavailable,

    /// Referenced model absent from the workspace
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Algorithm reported an error
    #[error("explainable error occurred: {0}")]
    Explainable(String),

    /// Algorithm panicked or the job was lost
    #[error("non-explainable error occurred")]
    NonExplainable,
}

impl ExecutionError {
    /// Whether the algorithm itself explained the failure
    #[inline]
    #[must_use]
    pub fn is_explainable(&self) -> bool {
        !matches!(self, Self::NonExplainable)
    }
}

/// Failure of one client request; always answered with `Error:0`
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Peer stopped sending before the declared length arrived
    #[error("transport incomplete: received {received} of {expected} bytes")]
    TransportIncomplete { expected: usize, received: usize },

    #[error("decode failure: {0}")]
    DecodeFailure(#[from] DecodeError),

    #[error("deserialize failure: {0}")]
    DeserializeFailure(#[from] DeserializeError),

    #[error("execution failure: {0}")]
    ExecutionFailure(#[from] ExecutionError),

    /// A result model could not be encoded; nothing was streamed
    #[error("encode failure: {0}")]
    EncodeFailure(#[from] EncodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    IllegalTransition { from: SessionPhase, to: SessionPhase },
}

impl fmt::Display for StateMachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateMachineError::IllegalTransition { from, to } => {
                write!(f, "illegal session transition {from:?} -> {to:?}")
            }
        }
    }
}

impl std::error::Error for StateMachineError {}

/// Errors that end a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid account '{0}': expected <user>:<password> without further ':'")]
    InvalidAccount(String),

    #[error("no accounts configured")]
    NoAccounts,

    #[error("invalid listen address '{0}'")]
    InvalidListenAddress(String),

    #[error("payload timeout must be at least one second")]
    InvalidPayloadTimeout,
}

/// Listener errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}
