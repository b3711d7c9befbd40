//! LSP client infrastructure: transport, process lifecycle, typed RPC surface.
//!
//! This module speaks JSON-RPC 2.0 to a language server over the server's
//! standard streams and exposes the protocol operations capstan needs:
//! workspace symbol search, call hierarchy, references, implementations,
//! type hierarchy, and document symbols.
//!
//! ## Layers
//!
//! - [`Connection`] - framing and request/response correlation over a raw
//!   byte-stream pair; no protocol semantics
//! - [`ServerProcess`] - subprocess lifecycle (spawn, graceful stop, kill)
//! - [`Client`] - the initialize handshake, indexing-readiness tracking, and
//!   typed operations
//!
//! ## Design Notes
//!
//! - Uses `lsp-types` for all protocol types
//! - JSON-RPC format: `Content-Length: N\r\n\r\n{json}`
//! - Request IDs are incrementing integers, unique per connection
//! - N callers may have N requests in flight on one connection; each call
//!   owns an independent result slot keyed by its request ID

mod client;
mod connection;
mod error;
mod message;
mod provider;
mod server;

pub use client::Client;
pub use connection::{Connection, NotificationHandler};
pub use error::LspError;
pub use provider::{GoplsProvider, LspProvider, RustAnalyzerProvider};
pub use server::ServerProcess;

use std::path::{Path, PathBuf};

use lsp_types::Uri;
use percent_encoding::percent_decode_str;

/// Result type for LSP operations.
pub type Result<T> = std::result::Result<T, LspError>;

/// Convert a filesystem path to an LSP `file://` URI.
///
/// On Unix this produces URIs like `file:///home/user/project/src/main.go`.
/// On Windows it handles drive letters (`file:///C:/Users/...`).
///
/// # Errors
///
/// Returns an error if the path cannot be canonicalized, is not valid UTF-8,
/// or does not form a valid URI.
pub fn path_to_uri(path: &Path) -> Result<Uri> {
    let absolute_path = path.canonicalize().map_err(|e| {
        LspError::InvalidPath(format!(
            "cannot canonicalize path '{}': {e}",
            path.display()
        ))
    })?;

    let path_str = absolute_path.to_str().ok_or_else(|| {
        LspError::InvalidPath(format!("path contains invalid UTF-8: {}", path.display()))
    })?;

    #[cfg(windows)]
    let uri_string = format!("file:///{}", path_str.replace('\\', "/"));

    #[cfg(not(windows))]
    let uri_string = format!("file://{path_str}");

    uri_string
        .parse()
        .map_err(|e| LspError::InvalidPath(format!("invalid URI '{uri_string}': {e}")))
}

/// Convert an LSP `file://` URI back to a filesystem path.
///
/// Percent-encoded bytes are decoded; a URI that is not a `file://` URI is
/// converted best-effort from its full text.
#[must_use]
pub fn uri_to_path(uri: &Uri) -> PathBuf {
    let s = uri.as_str();
    let raw = s.strip_prefix("file://").unwrap_or(s);

    #[cfg(windows)]
    let raw = raw.strip_prefix('/').unwrap_or(raw);

    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    PathBuf::from(decoded.into_owned())
}
