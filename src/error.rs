//! Error types for LinkChain

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Dial, accept or write failure, scoped to a single peer.
    Connection { address: String, reason: String },
    OutOfRange { index: i64, len: usize },
    MalformedMessage(String),
    Framing(String),
    /// Failure to bind a listening address. Fatal at start-up.
    Bind { address: String, reason: String },
    Config(String),
    IoError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::Connection { address, reason } => {
                write!(f, "Connection error with {}: {}", address, reason)
            }
            ChainError::OutOfRange { index, len } => {
                write!(f, "Index out of range: {} (ledger length {})", index, len)
            }
            ChainError::MalformedMessage(msg) => write!(f, "Malformed message: {}", msg),
            ChainError::Framing(msg) => write!(f, "Framing error: {}", msg),
            ChainError::Bind { address, reason } => {
                write!(f, "Failed to bind {}: {}", address, reason)
            }
            ChainError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<crate::protocol::FramingError> for ChainError {
    fn from(err: crate::protocol::FramingError) -> Self {
        ChainError::Framing(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
