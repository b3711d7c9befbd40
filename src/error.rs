//! Top-level error type for capstan operations.
//!
//! Each layer has its own structured error (`lsp::LspError` for transport and
//! protocol failures, `resolver::ResolveError` for symbol resolution,
//! `hierarchy::TraverseError` for traversal roots); this module folds them
//! into one crate-level type for callers that drive the whole pipeline.

use thiserror::Error;

use crate::hierarchy::TraverseError;
use crate::lsp::LspError;
use crate::resolver::ResolveError;

/// Result type for capstan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for capstan operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or protocol failure talking to the language server.
    #[error(transparent)]
    Lsp(#[from] LspError),

    /// Symbol resolution failed (not found or ambiguous).
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Call-hierarchy traversal failed at its root.
    #[error(transparent)]
    Traverse(#[from] TraverseError),
}

impl Error {
    /// Returns `true` if the failure was a request deadline expiring.
    ///
    /// Lets callers distinguish "server said no" from "server never answered"
    /// without matching through the nested error layers.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Lsp(e) => matches!(e, LspError::Timeout { .. }),
            Self::Resolve(ResolveError::Search { source, .. }) => {
                matches!(source, LspError::Timeout { .. })
            }
            Self::Resolve(_) => false,
            Self::Traverse(TraverseError::Root { source, .. }) => {
                matches!(source, LspError::Timeout { .. })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_detection_through_layers() {
        let lsp = Error::from(LspError::Timeout {
            operation: "workspace/symbol".to_string(),
        });
        assert!(lsp.is_timeout());

        let protocol = Error::from(LspError::server_error(-32601, "method not found"));
        assert!(!protocol.is_timeout());

        let root = Error::from(TraverseError::Root {
            method: "callHierarchy/incomingCalls",
            source: LspError::Timeout {
                operation: "callHierarchy/incomingCalls".to_string(),
            },
        });
        assert!(root.is_timeout());
    }
}
