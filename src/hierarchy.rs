//! Bounded, cycle-safe call-graph walks over single-hop hierarchy queries.
//!
//! The language server answers one hop at a time (who calls X, what does X
//! call); the [`Traverser`] turns that into multi-hop answers in two shapes: a
//! flat list of every call relationship reachable from a root, or the full
//! set of root-to-leaf paths rendered as strings. Both walks are depth-first,
//! depth-bounded, and terminate on cycles, but they use their visited sets
//! differently: the flat walk never re-expands a node (a diamond is reported
//! once), while path building only excludes a node from the path it is
//! already on (a diamond yields one path per route).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use lsp_types::{CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, Range};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lsp::{self, Client, LspError, uri_to_path};

/// Error from a call-hierarchy traversal.
///
/// Only the root fetch is fatal; a failed fetch for a descendant degrades
/// that branch to a leaf instead. Both flat walks and path building depend on
/// this asymmetry to return partial results from a flaky server.
#[derive(Debug, Error)]
pub enum TraverseError {
    /// Fetching edges for the traversal root failed.
    #[error("failed to fetch {method} for traversal root")]
    Root {
        /// The RPC method that failed.
        method: &'static str,
        /// The underlying protocol or transport error.
        #[source]
        source: LspError,
    },
}

/// Which way to walk the call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Direction {
    /// Toward callers (who calls this).
    #[default]
    Up,
    /// Toward callees (what does this call).
    Down,
}

impl Direction {
    /// The RPC method that fetches one hop in this direction.
    #[must_use]
    pub fn method(self) -> &'static str {
        match self {
            Self::Up => "callHierarchy/incomingCalls",
            Self::Down => "callHierarchy/outgoingCalls",
        }
    }
}

/// Post-filter for which discovered edges a caller wants to keep.
///
/// Scope is not a traversal concern: apply [`in_scope`] to results after the
/// walk, relative to a known project root and the start node's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Keep everything.
    #[default]
    All,
    /// Keep edges inside the project root.
    Project,
    /// Keep edges in the same directory as the start node.
    Package,
}

/// Options shared by flat walks and path building.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Walk direction; used by [`Traverser::build_tree`], while
    /// [`Traverser::callers`]/[`Traverser::callees`] fix their own.
    pub direction: Direction,
    /// Maximum recursion depth; `0` means unbounded (the visited set alone
    /// terminates the walk).
    pub max_depth: u32,
    /// Keep edges whose file looks like a test file.
    pub include_tests: bool,
    /// Keep edges whose file lives in a standard-library tree.
    pub include_std: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Up,
            max_depth: 0,
            include_tests: true,
            include_std: false,
        }
    }
}

/// One discovered call relationship.
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    /// Name of the symbol at the far end of the edge.
    pub symbol: String,
    /// File the symbol is defined in.
    pub file: PathBuf,
    /// 1-based line of the symbol's definition.
    pub line: u32,
    /// 1-based line where the symbol's definition ends.
    pub line_end: u32,
    /// Ranges of the individual call sites for this edge.
    pub call_sites: Vec<Range>,
    /// Whether the symbol's file looks like a test file.
    pub is_test: bool,
}

/// Definition info for one symbol encountered during path building.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolEntry {
    /// File the symbol is defined in.
    pub file: PathBuf,
    /// 1-based line of the definition.
    pub line: u32,
    /// Human-readable signature, when a signature provider is attached.
    pub signature: Option<String>,
}

/// The output of [`Traverser::build_tree`].
#[derive(Debug, Clone, Serialize)]
pub struct TreeResult {
    /// Root-to-leaf path strings. Elements that invoke their successor are
    /// tagged with the 1-based call-site line, e.g. `main:14 -> run`.
    pub paths: Vec<String>,
    /// Every symbol encountered, keyed by name, deduplicated.
    pub symbols: BTreeMap<String, SymbolEntry>,
    /// Number of paths.
    pub path_count: usize,
    /// Maximum depth the walk actually reached.
    pub max_depth: u32,
    /// Whether the depth bound cut off at least one branch.
    pub truncated: bool,
}

/// Single-hop edge fetch, the seam between the traverser and the protocol.
///
/// [`Client`] implements this over the wire; tests implement it over a
/// canned graph.
pub trait HierarchyProvider {
    /// Direct callers of an item.
    ///
    /// # Errors
    ///
    /// Propagates the underlying protocol or transport error.
    fn incoming(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyIncomingCall>>;

    /// Direct callees of an item.
    ///
    /// # Errors
    ///
    /// Propagates the underlying protocol or transport error.
    fn outgoing(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyOutgoingCall>>;
}

impl HierarchyProvider for Client {
    fn incoming(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyIncomingCall>> {
        self.incoming_calls(item)
    }

    fn outgoing(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyOutgoingCall>> {
        self.outgoing_calls(item)
    }
}

/// Best-effort signature lookup used only to label tree nodes.
///
/// Absence degrades to the bare symbol name; it never fails a traversal.
pub trait SignatureProvider {
    /// A human-readable signature for the definition at `file:line`, if one
    /// can be produced.
    fn signature(&self, file: &Path, line: u32) -> Option<String>;
}

/// An edge plus the far endpoint it leads to, direction-agnostic.
struct Edge {
    item: CallHierarchyItem,
    call_sites: Vec<Range>,
}

/// One element of the path currently being grown.
struct PathNode {
    label: String,
    /// 1-based line at which this element invokes its successor.
    call_line: Option<u32>,
}

/// Accumulator for one `build_tree` invocation.
#[derive(Default)]
struct TreeAcc {
    paths: Vec<String>,
    symbols: BTreeMap<String, SymbolEntry>,
    max_depth: u32,
    truncated: bool,
}

/// Walks the call graph through a [`HierarchyProvider`].
pub struct Traverser<'a, P: HierarchyProvider> {
    provider: &'a P,
    signatures: Option<&'a dyn SignatureProvider>,
}

impl<'a, P: HierarchyProvider> Traverser<'a, P> {
    /// Create a traverser over a hierarchy provider.
    #[must_use]
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            signatures: None,
        }
    }

    /// Attach a signature provider for tree-node labels.
    #[must_use]
    pub fn with_signatures(mut self, signatures: &'a dyn SignatureProvider) -> Self {
        self.signatures = Some(signatures);
        self
    }

    /// Every call relationship reachable by walking toward callers.
    ///
    /// Each node is reported at most once, so a diamond in the graph appears
    /// a single time regardless of how many routes reach it.
    ///
    /// # Errors
    ///
    /// Returns [`TraverseError::Root`] if the root's edges cannot be fetched;
    /// descendant fetch failures degrade their branch instead.
    pub fn callers(
        &self,
        root: &CallHierarchyItem,
        opts: &TraversalOptions,
    ) -> Result<Vec<CallInfo>, TraverseError> {
        self.collect(root, Direction::Up, opts)
    }

    /// Every call relationship reachable by walking toward callees.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Traverser::callers`].
    pub fn callees(
        &self,
        root: &CallHierarchyItem,
        opts: &TraversalOptions,
    ) -> Result<Vec<CallInfo>, TraverseError> {
        self.collect(root, Direction::Down, opts)
    }

    fn collect(
        &self,
        root: &CallHierarchyItem,
        direction: Direction,
        opts: &TraversalOptions,
    ) -> Result<Vec<CallInfo>, TraverseError> {
        let edges = self.fetch(root, direction).map_err(|source| TraverseError::Root {
            method: direction.method(),
            source,
        })?;

        let mut visited = HashSet::new();
        visited.insert(node_key(root));
        let mut results = Vec::new();
        self.expand(edges, direction, opts, 1, &mut visited, &mut results);

        debug!(
            root = %root.name,
            direction = ?direction,
            results = results.len(),
            "flat traversal complete"
        );
        Ok(results)
    }

    /// DFS for the flat walk: filter, record, mark visited, recurse.
    fn expand(
        &self,
        edges: Vec<Edge>,
        direction: Direction,
        opts: &TraversalOptions,
        depth: u32,
        visited: &mut HashSet<(String, String)>,
        results: &mut Vec<CallInfo>,
    ) {
        for edge in edges {
            let info = call_info(&edge);
            if !opts.include_tests && info.is_test {
                continue;
            }
            if !opts.include_std && is_std_library(&info.file) {
                continue;
            }
            if !visited.insert(node_key(&edge.item)) {
                continue;
            }
            results.push(info);

            if opts.max_depth != 0 && depth >= opts.max_depth {
                continue;
            }
            match self.fetch(&edge.item, direction) {
                Ok(next) => self.expand(next, direction, opts, depth + 1, visited, results),
                Err(e) => {
                    // Non-fatal below the root: this branch just stops here.
                    warn!(symbol = %edge.item.name, error = %e, "edge fetch failed, leaving branch as leaf");
                }
            }
        }
    }

    /// Enumerate every root-to-leaf path from `root` in `opts.direction`.
    ///
    /// Unlike the flat walk, a node may appear on several different paths;
    /// only a cycle within the current path closes it. Paths read in call
    /// order for both directions: outermost caller first when walking up,
    /// root first when walking down.
    ///
    /// # Errors
    ///
    /// Returns [`TraverseError::Root`] if the root's edges cannot be fetched.
    pub fn build_tree(
        &self,
        root: &CallHierarchyItem,
        opts: &TraversalOptions,
    ) -> Result<TreeResult, TraverseError> {
        let direction = opts.direction;
        let edges = self.fetch(root, direction).map_err(|source| TraverseError::Root {
            method: direction.method(),
            source,
        })?;

        let mut acc = TreeAcc::default();
        self.note_symbol(&mut acc, root);

        let mut visited = HashSet::new();
        visited.insert(node_key(root));
        let mut path = vec![PathNode {
            label: root.name.clone(),
            call_line: None,
        }];

        if edges.is_empty() {
            acc.paths.push(render_path(&path, direction));
        } else {
            self.grow(edges, direction, opts, 1, &mut visited, &mut path, &mut acc);
        }

        debug!(
            root = %root.name,
            paths = acc.paths.len(),
            max_depth = acc.max_depth,
            truncated = acc.truncated,
            "tree traversal complete"
        );
        Ok(TreeResult {
            path_count: acc.paths.len(),
            paths: acc.paths,
            symbols: acc.symbols,
            max_depth: acc.max_depth,
            truncated: acc.truncated,
        })
    }

    /// DFS for path building with a per-path visited set.
    #[allow(clippy::too_many_arguments)]
    fn grow(
        &self,
        edges: Vec<Edge>,
        direction: Direction,
        opts: &TraversalOptions,
        depth: u32,
        visited: &mut HashSet<(String, String)>,
        path: &mut Vec<PathNode>,
        acc: &mut TreeAcc,
    ) {
        acc.max_depth = acc.max_depth.max(depth);
        let mut extended = false;

        for edge in edges {
            let info = call_info(&edge);
            if !opts.include_tests && info.is_test {
                continue;
            }
            if !opts.include_std && is_std_library(&info.file) {
                continue;
            }
            let key = node_key(&edge.item);
            if visited.contains(&key) {
                continue;
            }
            extended = true;

            let call_line = edge.call_sites.first().map(|r| r.start.line + 1);
            match direction {
                // Down: the current element invokes the new one
                Direction::Down => {
                    if let Some(last) = path.last_mut() {
                        last.call_line = call_line;
                    }
                    path.push(PathNode {
                        label: edge.item.name.clone(),
                        call_line: None,
                    });
                }
                // Up: the new caller invokes the current element
                Direction::Up => path.push(PathNode {
                    label: edge.item.name.clone(),
                    call_line,
                }),
            }
            self.note_symbol(acc, &edge.item);
            visited.insert(key.clone());

            if opts.max_depth != 0 && depth >= opts.max_depth {
                acc.truncated = true;
                acc.paths.push(render_path(path, direction));
            } else {
                match self.fetch(&edge.item, direction) {
                    Ok(next) if !next.is_empty() => {
                        self.grow(next, direction, opts, depth + 1, visited, path, acc);
                    }
                    Ok(_) => acc.paths.push(render_path(path, direction)),
                    Err(e) => {
                        warn!(symbol = %edge.item.name, error = %e, "edge fetch failed, closing path as leaf");
                        acc.paths.push(render_path(path, direction));
                    }
                }
            }

            // Allow this node on other paths
            visited.remove(&key);
            path.pop();
            if direction == Direction::Down
                && let Some(last) = path.last_mut()
            {
                last.call_line = None;
            }
        }

        // Every edge was filtered or would close a cycle
        if !extended {
            acc.paths.push(render_path(path, direction));
        }
    }

    fn fetch(&self, item: &CallHierarchyItem, direction: Direction) -> lsp::Result<Vec<Edge>> {
        match direction {
            Direction::Up => Ok(self
                .provider
                .incoming(item)?
                .into_iter()
                .map(|call| Edge {
                    item: call.from,
                    call_sites: call.from_ranges,
                })
                .collect()),
            Direction::Down => Ok(self
                .provider
                .outgoing(item)?
                .into_iter()
                .map(|call| Edge {
                    item: call.to,
                    call_sites: call.from_ranges,
                })
                .collect()),
        }
    }

    fn note_symbol(&self, acc: &mut TreeAcc, item: &CallHierarchyItem) {
        if acc.symbols.contains_key(&item.name) {
            return;
        }
        let file = uri_to_path(&item.uri);
        let line = item.range.start.line + 1;
        let signature = self
            .signatures
            .and_then(|provider| provider.signature(&file, line));
        acc.symbols.insert(
            item.name.clone(),
            SymbolEntry {
                file,
                line,
                signature,
            },
        );
    }
}

fn node_key(item: &CallHierarchyItem) -> (String, String) {
    (item.uri.to_string(), item.name.clone())
}

fn call_info(edge: &Edge) -> CallInfo {
    let file = uri_to_path(&edge.item.uri);
    let is_test = is_test_file(&file);
    CallInfo {
        symbol: edge.item.name.clone(),
        line: edge.item.range.start.line + 1,
        line_end: edge.item.range.end.line + 1,
        call_sites: edge.call_sites.clone(),
        is_test,
        file,
    }
}

fn render_path(path: &[PathNode], direction: Direction) -> String {
    let element = |node: &PathNode| match node.call_line {
        Some(line) => format!("{}:{line}", node.label),
        None => node.label.clone(),
    };
    let rendered: Vec<String> = match direction {
        Direction::Down => path.iter().map(element).collect(),
        // Walk order is target-outward; paths read outermost caller first
        Direction::Up => path.iter().rev().map(element).collect(),
    };
    rendered.join(" -> ")
}

/// Heuristic: does this path look like a test file?
#[must_use]
pub fn is_test_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.ends_with("_test.go")
        || name.starts_with("test_")
        || path
            .components()
            .any(|c| c.as_os_str() == "tests" || c.as_os_str() == "testdata")
}

/// Heuristic: does this path live in a standard-library source tree?
#[must_use]
pub fn is_std_library(path: &Path) -> bool {
    let path = path.to_string_lossy();
    path.contains("/go/src/")
        || path.contains("/libexec/src/")
        || path.contains("/.rustup/toolchains/")
        || path.contains("/lib/rustlib/src/")
}

/// Scope post-filter for discovered edges.
///
/// `origin` is the file of the node the traversal started from.
#[must_use]
pub fn in_scope(file: &Path, scope: Scope, project_root: &Path, origin: &Path) -> bool {
    match scope {
        Scope::All => true,
        Scope::Project => file.starts_with(project_root),
        Scope::Package => file.parent() == origin.parent(),
    }
}
