//! Protocol client: handshake, readiness tracking, and the typed RPC surface.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use lsp_types::{
    CallHierarchyClientCapabilities, CallHierarchyIncomingCall, CallHierarchyIncomingCallsParams,
    CallHierarchyItem, CallHierarchyOutgoingCall, CallHierarchyOutgoingCallsParams,
    CallHierarchyPrepareParams, CallHierarchyServerCapability, ClientCapabilities,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentSymbolClientCapabilities,
    DocumentSymbolParams, DocumentSymbolResponse, ImplementationProviderCapability,
    InitializeParams, InitializeResult, Location, OneOf, PartialResultParams, Position,
    ReferenceClientCapabilities, ReferenceContext, ReferenceParams, ServerCapabilities,
    SymbolInformation, TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, TypeHierarchyItem, TypeHierarchyPrepareParams,
    TypeHierarchyServerCapability, TypeHierarchySubtypesParams, TypeHierarchySupertypesParams,
    WindowClientCapabilities, WorkDoneProgressParams, WorkspaceClientCapabilities,
    WorkspaceSymbolClientCapabilities, WorkspaceSymbolParams, WorkspaceSymbolResponse,
    notification::{DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized, Notification},
    request::{
        CallHierarchyIncomingCalls, CallHierarchyOutgoingCalls, CallHierarchyPrepare,
        DocumentSymbolRequest, GotoImplementation, GotoImplementationParams,
        GotoImplementationResponse, Initialize, References, Request, Shutdown,
        TypeHierarchyPrepare, TypeHierarchySubtypes, TypeHierarchySupertypes,
        WorkspaceSymbolRequest,
    },
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use super::connection::Connection;
use super::error::LspError;
use super::provider::LspProvider;
use super::server::ServerProcess;
use super::{Result, path_to_uri};

/// Default per-request deadline.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for voluntary exit after the protocol shutdown handshake.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One-shot gate derived from `$/progress` notifications.
///
/// `begin` adds the progress token to an active set, `end` removes it; the
/// first transition to empty after at least one `begin` fires the gate,
/// exactly once (check-and-set, never an unconditional re-fire).
struct ReadyGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    active: HashSet<String>,
    seen_begin: bool,
    ready: bool,
}

impl ReadyGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            cond: Condvar::new(),
        }
    }

    /// Feed one `$/progress` notification's params into the gate.
    fn observe(&self, params: &Value) {
        // Tokens may be strings or numbers on the wire
        let token = params.get("token").and_then(|t| {
            t.as_str()
                .map(String::from)
                .or_else(|| t.as_i64().map(|n| n.to_string()))
        });
        let Some(token) = token else { return };
        let kind = params
            .get("value")
            .and_then(|v| v.get("kind"))
            .and_then(Value::as_str);

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match kind {
            Some("begin") => {
                trace!(token = %token, "progress began");
                state.active.insert(token);
                state.seen_begin = true;
            }
            Some("end") => {
                trace!(token = %token, "progress ended");
                state.active.remove(&token);
                if state.seen_begin && state.active.is_empty() && !state.ready {
                    debug!("all indexing progress complete, server ready");
                    state.ready = true;
                    self.cond.notify_all();
                }
            }
            _ => {}
        }
    }

    /// Block until the gate fires or the deadline elapses.
    ///
    /// Returns `Err(Timeout)` only when progress was observed but never
    /// completed; a server that emits no progress at all is presumed ready
    /// once the deadline passes.
    fn wait(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        while !state.ready {
            let now = Instant::now();
            if now >= deadline {
                if state.seen_begin {
                    return Err(LspError::timeout("indexing progress"));
                }
                debug!("no progress notifications observed, presuming server ready");
                return Ok(());
            }
            let (next, _) = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
        Ok(())
    }
}

/// Typed LSP client bound to one server session.
///
/// Construction spawns the server, wires a [`Connection`] to its standard
/// streams, and performs the initialize/initialized handshake. Call-hierarchy
/// items and other handles returned by this client are valid only within the
/// session that produced them.
pub struct Client {
    server: ServerProcess,
    conn: Connection,
    capabilities: ServerCapabilities,
    ready: Arc<ReadyGate>,
    timeout: Duration,
    root: PathBuf,
}

impl Client {
    /// Start a server and perform the handshake.
    ///
    /// The handshake declares interest in call hierarchy, references,
    /// hierarchical document symbols, workspace symbol search, and
    /// work-done progress; the server's advertised capabilities are stored
    /// and individual operations fail when the capability they need is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be spawned, the workspace path
    /// is invalid, or the initialize request itself fails.
    #[must_use = "client holds a running server process that should be shut down"]
    pub fn start(provider: &dyn LspProvider, workspace: &Path) -> Result<Self> {
        let root = workspace.canonicalize().map_err(|e| {
            LspError::InvalidPath(format!(
                "workspace root not found: {} ({e})",
                workspace.display()
            ))
        })?;

        let (server, stdin, stdout) = ServerProcess::start(provider, &root)?;

        let ready = Arc::new(ReadyGate::new());
        let gate = Arc::clone(&ready);
        let conn = Connection::new(
            stdout,
            stdin,
            Arc::new(move |method: &str, params: Value| {
                if method == "$/progress" {
                    gate.observe(&params);
                }
            }),
        );

        let capabilities = Self::initialize(&conn, &server, &root, provider)?;
        debug!(root = %root.display(), "LSP handshake complete");

        Ok(Self {
            server,
            conn,
            capabilities,
            ready,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            root,
        })
    }

    /// Perform the initialize/initialized handshake on a fresh connection.
    #[allow(deprecated)] // root_uri is deprecated but still what servers key on
    fn initialize(
        conn: &Connection,
        server: &ServerProcess,
        root: &Path,
        provider: &dyn LspProvider,
    ) -> Result<ServerCapabilities> {
        let root_uri = path_to_uri(root)?;

        let capabilities = ClientCapabilities {
            workspace: Some(WorkspaceClientCapabilities {
                symbol: Some(WorkspaceSymbolClientCapabilities {
                    dynamic_registration: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            text_document: Some(TextDocumentClientCapabilities {
                call_hierarchy: Some(CallHierarchyClientCapabilities {
                    dynamic_registration: Some(false),
                }),
                references: Some(ReferenceClientCapabilities {
                    dynamic_registration: Some(false),
                }),
                document_symbol: Some(DocumentSymbolClientCapabilities {
                    hierarchical_document_symbol_support: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            window: Some(WindowClientCapabilities {
                work_done_progress: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let params = InitializeParams {
            process_id: Some(server.id()),
            root_uri: Some(root_uri),
            capabilities,
            initialization_options: provider.initialize_options(),
            ..Default::default()
        };

        let raw = conn.call(
            Initialize::METHOD,
            &serde_json::to_value(params).map_err(LspError::Serialize)?,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        let result: InitializeResult =
            serde_json::from_value(raw).map_err(LspError::Deserialize)?;

        conn.notify(Initialized::METHOD, &json!({}))?;

        Ok(result.capabilities)
    }

    /// Block until initial indexing completes or the deadline elapses.
    ///
    /// Readiness is derived from `$/progress`: when every begun progress
    /// token has ended, the server is ready. A server that never reports
    /// progress is presumed ready once `timeout` passes without any `begin`;
    /// a server with progress still in flight at the deadline yields a
    /// timeout error.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::Timeout`] when progress began but did not
    /// complete within the deadline.
    pub fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        self.ready.wait(timeout)
    }

    /// Override the per-request deadline (default 30 seconds).
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// The canonicalized workspace root this session was opened on.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.root
    }

    /// The capabilities the server advertised in the handshake.
    #[must_use]
    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    fn request<R>(&self, params: R::Params) -> Result<R::Result>
    where
        R: Request,
        R::Params: Serialize,
        R::Result: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(LspError::Serialize)?;
        let raw = self.conn.call(R::METHOD, &params, self.timeout)?;
        serde_json::from_value(raw).map_err(LspError::Deserialize)
    }

    fn require(&self, supported: bool, capability: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(LspError::Unsupported { capability })
        }
    }

    fn position_params(
        &self,
        file: &Path,
        line: u32,
        character: u32,
    ) -> Result<TextDocumentPositionParams> {
        let uri = path_to_uri(file)?;
        Ok(TextDocumentPositionParams {
            text_document: TextDocumentIdentifier::new(uri),
            position: Position::new(line, character),
        })
    }

    /// Free-text workspace symbol search.
    ///
    /// Nested (`WorkspaceSymbol`) responses are flattened; entries without a
    /// full location are dropped since every consumer here needs a range.
    ///
    /// # Errors
    ///
    /// Fails if workspace symbol search is not advertised, or on any
    /// transport/protocol/timeout error.
    #[allow(deprecated)] // SymbolInformation.deprecated must be populated to construct it
    pub fn workspace_symbols(&self, query: &str) -> Result<Vec<SymbolInformation>> {
        self.require(
            oneof_enabled(&self.capabilities.workspace_symbol_provider),
            "workspace/symbol",
        )?;

        let params = WorkspaceSymbolParams {
            query: query.to_string(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let response = self.request::<WorkspaceSymbolRequest>(params)?;
        let symbols = match response {
            None => Vec::new(),
            Some(WorkspaceSymbolResponse::Flat(symbols)) => symbols,
            Some(WorkspaceSymbolResponse::Nested(symbols)) => symbols
                .into_iter()
                .filter_map(|s| match s.location {
                    OneOf::Left(location) => Some(SymbolInformation {
                        name: s.name,
                        kind: s.kind,
                        tags: s.tags,
                        deprecated: None,
                        location,
                        container_name: s.container_name,
                    }),
                    OneOf::Right(_) => None,
                })
                .collect(),
        };
        Ok(symbols)
    }

    /// Resolve the callable symbol(s) at a document position.
    ///
    /// Zero items means the position does not resolve to a callable symbol —
    /// that is a valid answer, not an error. Each item's `data` field may
    /// carry server-private state and is round-tripped unmodified.
    ///
    /// # Errors
    ///
    /// Fails if call hierarchy is not advertised, or on any
    /// transport/protocol/timeout error.
    pub fn prepare_call_hierarchy(
        &self,
        file: &Path,
        line: u32,
        character: u32,
    ) -> Result<Vec<CallHierarchyItem>> {
        self.require(
            call_hierarchy_enabled(&self.capabilities.call_hierarchy_provider),
            "textDocument/prepareCallHierarchy",
        )?;

        let params = CallHierarchyPrepareParams {
            text_document_position_params: self.position_params(file, line, character)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };

        let response = self.request::<CallHierarchyPrepare>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// [`Client::prepare_call_hierarchy`] addressed by a resolved [`Location`].
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Client::prepare_call_hierarchy`].
    pub fn prepare_call_hierarchy_at(&self, location: &Location) -> Result<Vec<CallHierarchyItem>> {
        self.require(
            call_hierarchy_enabled(&self.capabilities.call_hierarchy_provider),
            "textDocument/prepareCallHierarchy",
        )?;

        let params = CallHierarchyPrepareParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier::new(location.uri.clone()),
                position: location.range.start,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
        };

        let response = self.request::<CallHierarchyPrepare>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Direct callers of a call-hierarchy item.
    ///
    /// # Errors
    ///
    /// Fails on any transport/protocol/timeout error.
    pub fn incoming_calls(
        &self,
        item: &CallHierarchyItem,
    ) -> Result<Vec<CallHierarchyIncomingCall>> {
        let params = CallHierarchyIncomingCallsParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response = self.request::<CallHierarchyIncomingCalls>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Direct callees of a call-hierarchy item.
    ///
    /// # Errors
    ///
    /// Fails on any transport/protocol/timeout error.
    pub fn outgoing_calls(
        &self,
        item: &CallHierarchyItem,
    ) -> Result<Vec<CallHierarchyOutgoingCall>> {
        let params = CallHierarchyOutgoingCallsParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response = self.request::<CallHierarchyOutgoingCalls>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// All references to the symbol at a position.
    ///
    /// # Errors
    ///
    /// Fails if references are not advertised, or on any
    /// transport/protocol/timeout error.
    pub fn references(
        &self,
        file: &Path,
        line: u32,
        character: u32,
        include_declaration: bool,
    ) -> Result<Vec<Location>> {
        self.require(
            oneof_enabled(&self.capabilities.references_provider),
            "textDocument/references",
        )?;

        let params = ReferenceParams {
            text_document_position: self.position_params(file, line, character)?,
            context: ReferenceContext {
                include_declaration,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let response = self.request::<References>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Implementations of the interface or abstract symbol at a position.
    ///
    /// # Errors
    ///
    /// Fails if implementation lookup is not advertised, or on any
    /// transport/protocol/timeout error.
    pub fn implementations(
        &self,
        file: &Path,
        line: u32,
        character: u32,
    ) -> Result<Vec<Location>> {
        self.require(
            implementation_enabled(&self.capabilities.implementation_provider),
            "textDocument/implementation",
        )?;

        let params = GotoImplementationParams {
            text_document_position_params: self.position_params(file, line, character)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let response = self.request::<GotoImplementation>(params)?;
        Ok(response.map(flatten_goto_response).unwrap_or_default())
    }

    /// Resolve the type at a position into a type-hierarchy item.
    ///
    /// # Errors
    ///
    /// Fails if type hierarchy is not advertised, or on any
    /// transport/protocol/timeout error.
    pub fn prepare_type_hierarchy(
        &self,
        file: &Path,
        line: u32,
        character: u32,
    ) -> Result<Vec<TypeHierarchyItem>> {
        self.require(
            type_hierarchy_enabled(&self.capabilities.type_hierarchy_provider),
            "textDocument/prepareTypeHierarchy",
        )?;

        let params = TypeHierarchyPrepareParams {
            text_document_position_params: self.position_params(file, line, character)?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };

        let response = self.request::<TypeHierarchyPrepare>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Supertypes of a type-hierarchy item.
    ///
    /// # Errors
    ///
    /// Fails on any transport/protocol/timeout error.
    pub fn supertypes(&self, item: &TypeHierarchyItem) -> Result<Vec<TypeHierarchyItem>> {
        let params = TypeHierarchySupertypesParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response = self.request::<TypeHierarchySupertypes>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Subtypes of a type-hierarchy item.
    ///
    /// # Errors
    ///
    /// Fails on any transport/protocol/timeout error.
    pub fn subtypes(&self, item: &TypeHierarchyItem) -> Result<Vec<TypeHierarchyItem>> {
        let params = TypeHierarchySubtypesParams {
            item: item.clone(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response = self.request::<TypeHierarchySubtypes>(params)?;
        Ok(response.unwrap_or_default())
    }

    /// Symbols declared in a single document.
    ///
    /// # Errors
    ///
    /// Fails if document symbols are not advertised, or on any
    /// transport/protocol/timeout error.
    pub fn document_symbols(&self, file: &Path) -> Result<DocumentSymbolResponse> {
        self.require(
            oneof_enabled(&self.capabilities.document_symbol_provider),
            "textDocument/documentSymbol",
        )?;

        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier::new(path_to_uri(file)?),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let response = self.request::<DocumentSymbolRequest>(params)?;
        Ok(response.unwrap_or(DocumentSymbolResponse::Nested(Vec::new())))
    }

    /// Tell the server a document is open, making the file visible without a
    /// full workspace scan. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Fails only on the write path; no response is awaited.
    pub fn did_open(&self, file: &Path, content: &str, language_id: &str) -> Result<()> {
        let uri = path_to_uri(file)?;
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri,
                language_id: language_id.to_string(),
                version: 1,
                text: content.to_string(),
            },
        };
        let params = serde_json::to_value(params).map_err(LspError::Serialize)?;
        self.conn.notify(DidOpenTextDocument::METHOD, &params)?;
        trace!(file = %file.display(), "sent didOpen notification");
        Ok(())
    }

    /// Tell the server a previously opened document is closed.
    ///
    /// # Errors
    ///
    /// Fails only on the write path; no response is awaited.
    pub fn did_close(&self, file: &Path) -> Result<()> {
        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier::new(path_to_uri(file)?),
        };
        let params = serde_json::to_value(params).map_err(LspError::Serialize)?;
        self.conn.notify(DidCloseTextDocument::METHOD, &params)?;
        trace!(file = %file.display(), "sent didClose notification");
        Ok(())
    }

    /// Gracefully shut the session down.
    ///
    /// Sends the `shutdown` request and `exit` notification, then stops the
    /// process, killing it only if it outlives the grace period.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown request itself fails; the process is
    /// stopped regardless.
    pub fn shutdown(mut self) -> Result<()> {
        debug!("shutting down language server");

        let result = self.request::<Shutdown>(());
        let _ = self.conn.notify(Exit::METHOD, &Value::Null);
        self.conn.close();
        self.server.stop(SHUTDOWN_GRACE);
        result
    }

    /// Forceful stop without the protocol-level shutdown handshake.
    pub fn close(mut self) {
        self.conn.close();
        self.server.kill();
    }
}

/// Presence check for `OneOf<bool, Options>`-shaped capability fields.
fn oneof_enabled<T>(capability: &Option<OneOf<bool, T>>) -> bool {
    match capability {
        Some(OneOf::Left(enabled)) => *enabled,
        Some(OneOf::Right(_)) => true,
        None => false,
    }
}

fn call_hierarchy_enabled(capability: &Option<CallHierarchyServerCapability>) -> bool {
    match capability {
        Some(CallHierarchyServerCapability::Simple(enabled)) => *enabled,
        Some(_) => true,
        None => false,
    }
}

fn implementation_enabled(capability: &Option<ImplementationProviderCapability>) -> bool {
    match capability {
        Some(ImplementationProviderCapability::Simple(enabled)) => *enabled,
        Some(_) => true,
        None => false,
    }
}

fn type_hierarchy_enabled(capability: &Option<TypeHierarchyServerCapability>) -> bool {
    match capability {
        Some(TypeHierarchyServerCapability::Simple(enabled)) => *enabled,
        Some(_) => true,
        None => false,
    }
}

/// Flatten the scalar/array/link shapes of a goto-style response.
fn flatten_goto_response(response: GotoImplementationResponse) -> Vec<Location> {
    match response {
        GotoImplementationResponse::Scalar(location) => vec![location],
        GotoImplementationResponse::Array(locations) => locations,
        GotoImplementationResponse::Link(links) => links
            .into_iter()
            .map(|link| Location {
                uri: link.target_uri,
                range: link.target_selection_range,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::GoplsProvider;

    #[test]
    fn start_rejects_a_missing_workspace_before_spawning() {
        let result = Client::start(&GoplsProvider, Path::new("/no/such/workspace"));
        assert!(matches!(result, Err(LspError::InvalidPath(_))));
    }

    fn progress(token: &str, kind: &str) -> Value {
        json!({ "token": token, "value": { "kind": kind } })
    }

    #[test]
    fn gate_fires_when_all_begun_progress_ends() {
        let gate = ReadyGate::new();
        gate.observe(&progress("rustAnalyzer/indexing", "begin"));
        gate.observe(&progress("rustAnalyzer/indexing", "end"));

        assert!(gate.wait(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn gate_times_out_when_progress_never_ends() {
        let gate = ReadyGate::new();
        gate.observe(&progress("indexing", "begin"));

        let result = gate.wait(Duration::from_millis(20));
        assert!(matches!(result, Err(LspError::Timeout { .. })));
    }

    #[test]
    fn gate_presumes_ready_when_no_progress_is_ever_observed() {
        let gate = ReadyGate::new();
        assert!(gate.wait(Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn gate_waits_for_every_active_token() {
        let gate = ReadyGate::new();
        gate.observe(&progress("a", "begin"));
        gate.observe(&progress("b", "begin"));
        gate.observe(&progress("a", "end"));

        // "b" is still active
        assert!(matches!(
            gate.wait(Duration::from_millis(20)),
            Err(LspError::Timeout { .. })
        ));

        gate.observe(&progress("b", "end"));
        assert!(gate.wait(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn gate_accepts_numeric_tokens() {
        let gate = ReadyGate::new();
        gate.observe(&json!({ "token": 1, "value": { "kind": "begin" } }));
        gate.observe(&json!({ "token": 1, "value": { "kind": "end" } }));

        assert!(gate.wait(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn gate_ignores_report_and_malformed_payloads() {
        let gate = ReadyGate::new();
        gate.observe(&progress("t", "begin"));
        gate.observe(&progress("t", "report"));
        gate.observe(&json!({ "value": { "kind": "end" } })); // no token
        gate.observe(&progress("t", "end"));

        assert!(gate.wait(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn flatten_goto_response_handles_all_shapes() {
        let location = Location {
            uri: "file:///impl.go".parse().expect("valid URI"),
            range: lsp_types::Range::default(),
        };

        let scalar = flatten_goto_response(GotoImplementationResponse::Scalar(location.clone()));
        assert_eq!(scalar.len(), 1);

        let array =
            flatten_goto_response(GotoImplementationResponse::Array(vec![location.clone(); 3]));
        assert_eq!(array.len(), 3);

        let empty = flatten_goto_response(GotoImplementationResponse::Array(vec![]));
        assert!(empty.is_empty());
    }

    #[test]
    fn oneof_capability_presence() {
        assert!(!oneof_enabled::<()>(&None));
        assert!(!oneof_enabled::<()>(&Some(OneOf::Left(false))));
        assert!(oneof_enabled::<()>(&Some(OneOf::Left(true))));
        assert!(oneof_enabled(&Some(OneOf::<bool, ()>::Right(()))));
    }

    #[test]
    fn call_hierarchy_capability_presence() {
        assert!(!call_hierarchy_enabled(&None));
        assert!(!call_hierarchy_enabled(&Some(
            CallHierarchyServerCapability::Simple(false)
        )));
        assert!(call_hierarchy_enabled(&Some(
            CallHierarchyServerCapability::Simple(true)
        )));
    }
}
