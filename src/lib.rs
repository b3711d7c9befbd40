//! # Capstan: call-graph queries over a language server
//!
//! Capstan orchestrates a Language Server Protocol implementation (spawned as
//! a subprocess, spoken to over JSON-RPC 2.0 on its standard streams) to
//! answer structured questions about a codebase's call graph and symbol
//! relationships: who calls this, what does this call, what implements this
//! interface. It is built for programmatic consumers — CLI tools, MCP
//! servers, AI agents — rather than an interactive editor.
//!
//! ## Design Philosophy
//!
//! - **Protocol, not parser** - capstan never inspects target source itself;
//!   the language server does the semantic work and capstan walks the graph
//!   it reports
//! - **Bounded walks** - traversals are depth-bounded and cycle-safe; a cycle
//!   closes a path, it never loops
//! - **Partial results over uniform failure** - a failed edge fetch degrades
//!   one branch to a leaf instead of aborting the whole query
//! - **Embeddable** - library only; argument parsing and output rendering
//!   belong to the caller
//!
//! ## Quick Start
//!
//! ```no_run
//! use capstan::lsp::{Client, GoplsProvider};
//! use capstan::hierarchy::{Traverser, TraversalOptions};
//! use capstan::resolver::{Resolver, SymbolQuery};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let client = Client::start(&GoplsProvider, Path::new("/path/to/workspace"))?;
//! client.wait_until_ready(Duration::from_secs(60))?;
//!
//! // Resolve a textual query to exactly one symbol
//! let query = SymbolQuery::parse("config.Load");
//! let symbol = Resolver::new(&client).resolve(&query)?;
//!
//! // Walk its callers
//! let items = client.prepare_call_hierarchy_at(&symbol.location)?;
//! if let Some(item) = items.first() {
//!     let traverser = Traverser::new(&client);
//!     let callers = traverser.callers(item, &TraversalOptions::default())?;
//!     println!("{} call sites", callers.len());
//! }
//!
//! client.shutdown()?;
//! # Ok::<(), capstan::Error>(())
//! ```

pub mod hierarchy;
pub mod lsp;
pub mod resolver;

mod error;

pub use error::{Error, Result};
pub use hierarchy::{
    CallInfo, Direction, Scope, SymbolEntry, TraversalOptions, TraverseError, Traverser,
    TreeResult,
};
pub use resolver::{ResolveError, ResolvedSymbol, Resolver, SymbolQuery};

// Protocol types (Position, Range, Location, SymbolKind, CallHierarchyItem...)
// are used throughout the public API; re-export the crate so consumers do not
// need to pin a matching version themselves.
pub use lsp_types;
