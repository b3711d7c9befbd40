//! Provider trait and implementations for different language servers.

use serde_json::Value;

/// Trait for configuring language server providers.
///
/// Implementations define how to spawn and configure a specific server.
/// Whatever server is chosen must advertise call-hierarchy support in its
/// handshake for the traversal layer to work.
///
/// # Example
///
/// ```rust
/// use capstan::lsp::LspProvider;
///
/// struct MyCustomLsp;
///
/// impl LspProvider for MyCustomLsp {
///     fn command(&self) -> &'static str { "my-lsp" }
///     fn args(&self) -> Vec<&str> { vec!["--stdio"] }
/// }
/// ```
pub trait LspProvider: Send + Sync {
    /// The command to spawn (e.g., "gopls", "rust-analyzer").
    fn command(&self) -> &'static str;

    /// Additional command-line arguments for the server.
    fn args(&self) -> Vec<&str> {
        vec![]
    }

    /// Language-specific initialization options.
    ///
    /// Passed in the `initializationOptions` field of the initialize request.
    fn initialize_options(&self) -> Option<Value> {
        None
    }

    /// Installation hint shown when the server is not found.
    fn install_hint(&self) -> &'static str {
        "Please install the language server and ensure it's in your PATH."
    }
}

/// Provider for gopls, the official Go language server.
///
/// Install via: `go install golang.org/x/tools/gopls@latest`
#[derive(Debug, Clone, Copy, Default)]
pub struct GoplsProvider;

impl LspProvider for GoplsProvider {
    fn command(&self) -> &'static str {
        "gopls"
    }

    fn install_hint(&self) -> &'static str {
        "Install gopls: go install golang.org/x/tools/gopls@latest"
    }
}

/// Provider for rust-analyzer, the official LSP implementation for Rust.
///
/// Install via: `rustup component add rust-analyzer`
#[derive(Debug, Clone, Copy, Default)]
pub struct RustAnalyzerProvider;

impl LspProvider for RustAnalyzerProvider {
    fn command(&self) -> &'static str {
        "rust-analyzer"
    }

    fn install_hint(&self) -> &'static str {
        "Install rust-analyzer: https://rust-analyzer.github.io/manual.html#installation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gopls_provider_has_correct_command() {
        assert_eq!(GoplsProvider.command(), "gopls");
    }

    #[test]
    fn gopls_provider_has_no_args_by_default() {
        assert!(GoplsProvider.args().is_empty());
    }

    #[test]
    fn rust_analyzer_provider_has_install_hint() {
        assert!(RustAnalyzerProvider.install_hint().contains("rust-analyzer"));
    }

    #[test]
    fn providers_have_no_init_options_by_default() {
        assert!(GoplsProvider.initialize_options().is_none());
        assert!(RustAnalyzerProvider.initialize_options().is_none());
    }
}
