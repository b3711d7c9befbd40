//! Error types for LSP operations.
//!
//! The taxonomy follows the failure classes of the transport:
//!
//! - **transport** (spawn failure, pipe I/O, malformed frame) - fatal to the
//!   connection; all pending calls are failed
//! - **protocol** (`ServerError`) - the server answered with a JSON-RPC error
//!   object; surfaced to the one caller, non-fatal to the connection
//! - **timeout** - the caller's deadline expired before a response arrived;
//!   a distinct kind so callers can tell "server said no" from "server never
//!   answered"
//! - **capability** (`Unsupported`) - the handshake did not advertise the
//!   capability a typed operation needs

use thiserror::Error;

/// Errors that can occur during LSP operations.
#[derive(Debug, Error)]
pub enum LspError {
    /// Failed to spawn the language server process.
    #[error("failed to spawn language server '{command}': {source}")]
    SpawnFailed {
        /// The command that failed to spawn.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Language server executable not found on PATH.
    #[error("{command} not found\n\n{install_hint}")]
    NotFound {
        /// The command that was not found.
        command: String,
        /// Installation instructions for the missing command.
        install_hint: String,
    },

    /// I/O error communicating with the language server.
    #[error("LSP communication error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a request to JSON.
    #[error("failed to serialize LSP request: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Failed to deserialize a response from JSON.
    #[error("failed to deserialize LSP response: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// Missing or unparsable framing header on the wire.
    #[error("invalid message frame: {0}")]
    Frame(String),

    /// Invalid file path for an LSP operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The server returned a JSON-RPC error object.
    #[error("LSP error {code}: {message}")]
    ServerError {
        /// The JSON-RPC error code.
        code: i64,
        /// The error message from the server.
        message: String,
    },

    /// The caller's deadline expired before a response arrived.
    #[error("timed out waiting for {operation}")]
    Timeout {
        /// The request method (or wait) that timed out.
        operation: String,
    },

    /// The connection is closed; no further calls can complete.
    #[error("connection closed")]
    Closed,

    /// The server did not advertise a capability the operation requires.
    #[error("server does not support {capability}")]
    Unsupported {
        /// The missing server capability.
        capability: &'static str,
    },

    /// The language server process exited unexpectedly.
    #[error("language server exited unexpectedly")]
    ServerExited,
}

impl LspError {
    /// Create a "not found" error with an install hint.
    #[must_use]
    pub fn not_found(command: &str, install_hint: &str) -> Self {
        Self::NotFound {
            command: command.to_string(),
            install_hint: install_hint.to_string(),
        }
    }

    /// Create a spawn failed error.
    #[must_use]
    pub fn spawn_failed(command: &str, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            command: command.to_string(),
            source,
        }
    }

    /// Create a server error from a JSON-RPC error response.
    #[must_use]
    pub fn server_error(code: i64, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    /// Create a timeout error for an operation.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Returns `true` for failures that are fatal to the connection.
    ///
    /// Protocol errors and timeouts are per-call; everything touching the
    /// byte stream is not.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. }
                | Self::NotFound { .. }
                | Self::Io(_)
                | Self::Frame(_)
                | Self::Closed
                | Self::ServerExited
        )
    }
}
