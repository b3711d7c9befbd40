//! Traversal behavior over canned call graphs: cycle safety, the diamond
//! property, filters, depth bounds, and partial-failure semantics.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use capstan::hierarchy::{
    Direction, HierarchyProvider, SignatureProvider, TraversalOptions, TraverseError, Traverser,
};
use capstan::lsp::{self, LspError};
use lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, Position, Range,
    SymbolKind,
};

fn item(name: &str, file: &str, line: u32) -> CallHierarchyItem {
    CallHierarchyItem {
        name: name.to_string(),
        kind: SymbolKind::FUNCTION,
        tags: None,
        detail: None,
        uri: format!("file://{file}").parse().expect("valid URI"),
        range: Range::new(Position::new(line - 1, 0), Position::new(line + 3, 1)),
        selection_range: Range::new(Position::new(line - 1, 5), Position::new(line - 1, 9)),
        data: None,
    }
}

/// A call site on a 1-based line.
fn site(line: u32) -> Range {
    Range::new(Position::new(line - 1, 4), Position::new(line - 1, 12))
}

/// Canned call graph keyed by symbol name, same edges both directions.
#[derive(Default)]
struct MockGraph {
    /// name -> (far endpoint, call-site line)
    edges: HashMap<String, Vec<(CallHierarchyItem, u32)>>,
    /// Names whose edge fetch fails.
    failing: HashSet<String>,
}

impl MockGraph {
    fn edge(&mut self, from: &str, to: CallHierarchyItem, call_line: u32) {
        self.edges.entry(from.to_string()).or_default().push((to, call_line));
    }

    fn fail(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }

    fn lookup(&self, item: &CallHierarchyItem) -> lsp::Result<&[(CallHierarchyItem, u32)]> {
        if self.failing.contains(&item.name) {
            return Err(LspError::server_error(-32603, "edge fetch failed"));
        }
        Ok(self.edges.get(&item.name).map_or(&[], Vec::as_slice))
    }
}

impl HierarchyProvider for MockGraph {
    fn incoming(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyIncomingCall>> {
        Ok(self
            .lookup(item)?
            .iter()
            .map(|(far, line)| CallHierarchyIncomingCall {
                from: far.clone(),
                from_ranges: vec![site(*line)],
            })
            .collect())
    }

    fn outgoing(&self, item: &CallHierarchyItem) -> lsp::Result<Vec<CallHierarchyOutgoingCall>> {
        Ok(self
            .lookup(item)?
            .iter()
            .map(|(far, line)| CallHierarchyOutgoingCall {
                to: far.clone(),
                from_ranges: vec![site(*line)],
            })
            .collect())
    }
}

fn down(max_depth: u32) -> TraversalOptions {
    TraversalOptions {
        direction: Direction::Down,
        max_depth,
        ..TraversalOptions::default()
    }
}

#[test]
fn cycle_terminates_and_reports_each_node_at_most_once() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    graph.edge("a", b.clone(), 11);
    graph.edge("b", a.clone(), 21);

    let traverser = Traverser::new(&graph);
    let results = traverser
        .callees(&a, &down(0))
        .expect("cyclic walk terminates");

    let names: Vec<&str> = results.iter().map(|info| info.symbol.as_str()).collect();
    // a is the (visited) root; b is reported once; the back-edge to a closes
    assert_eq!(names, vec!["b"]);
}

#[test]
fn cycle_in_tree_building_closes_the_path() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    graph.edge("a", b.clone(), 12);
    graph.edge("b", a, 22);

    let traverser = Traverser::new(&graph);
    let tree = traverser
        .build_tree(&item("a", "/proj/a.go", 10), &down(0))
        .expect("cyclic tree terminates");

    assert_eq!(tree.paths, vec!["a:12 -> b"]);
    assert_eq!(tree.path_count, 1);
    assert!(!tree.truncated);
}

#[test]
fn diamond_is_flat_collected_once_but_yields_two_paths() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    let c = item("c", "/proj/c.go", 30);
    let d = item("d", "/proj/d.go", 40);
    graph.edge("a", b.clone(), 11);
    graph.edge("a", c.clone(), 12);
    graph.edge("b", d.clone(), 21);
    graph.edge("c", d.clone(), 31);

    let traverser = Traverser::new(&graph);

    let flat = traverser.callees(&a, &down(0)).expect("flat walk");
    let d_count = flat.iter().filter(|info| info.symbol == "d").count();
    assert_eq!(d_count, 1, "flat collection reports the shared node once");

    let tree = traverser.build_tree(&a, &down(0)).expect("tree walk");
    assert_eq!(tree.path_count, 2, "one path per route to the shared node");
    assert!(tree.paths.contains(&"a:11 -> b:21 -> d".to_string()));
    assert!(tree.paths.contains(&"a:12 -> c:31 -> d".to_string()));
}

#[test]
fn upward_paths_read_outermost_caller_first() {
    let mut graph = MockGraph::default();
    // main calls run at line 14, run calls load at line 30
    let load = item("load", "/proj/config/load.go", 8);
    let run = item("run", "/proj/run.go", 25);
    let main = item("main", "/proj/main.go", 10);
    graph.edge("load", run.clone(), 30);
    graph.edge("run", main, 14);

    let traverser = Traverser::new(&graph);
    let tree = traverser
        .build_tree(&load, &TraversalOptions::default())
        .expect("upward tree");

    assert_eq!(tree.paths, vec!["main:14 -> run:30 -> load"]);
    assert_eq!(tree.max_depth, 2);
}

#[test]
fn depth_bound_truncates_and_is_reported() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    let c = item("c", "/proj/c.go", 30);
    let d = item("d", "/proj/d.go", 40);
    graph.edge("a", b.clone(), 11);
    graph.edge("b", c.clone(), 21);
    graph.edge("c", d, 31);

    let traverser = Traverser::new(&graph);

    let flat = traverser.callees(&a, &down(2)).expect("bounded walk");
    let names: Vec<&str> = flat.iter().map(|info| info.symbol.as_str()).collect();
    assert_eq!(names, vec!["b", "c"], "d lies beyond the bound");

    let tree = traverser.build_tree(&a, &down(2)).expect("bounded tree");
    assert_eq!(tree.paths, vec!["a:11 -> b:21 -> c"]);
    assert!(tree.truncated);
    assert_eq!(tree.max_depth, 2);
}

#[test]
fn test_file_edges_are_dropped_when_excluded() {
    let mut graph = MockGraph::default();
    let load = item("load", "/proj/config/load.go", 8);
    let helper = item("helper", "/proj/config/load_test.go", 50);
    let run = item("run", "/proj/run.go", 25);
    graph.edge("load", helper, 52);
    graph.edge("load", run, 30);

    let traverser = Traverser::new(&graph);

    let all = traverser
        .callers(&load, &TraversalOptions::default())
        .expect("walk with tests");
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|info| info.is_test));

    let filtered = traverser
        .callers(
            &load,
            &TraversalOptions {
                include_tests: false,
                ..TraversalOptions::default()
            },
        )
        .expect("walk without tests");
    let names: Vec<&str> = filtered.iter().map(|info| info.symbol.as_str()).collect();
    assert_eq!(names, vec!["run"]);
}

#[test]
fn std_library_edges_are_dropped_by_default() {
    let mut graph = MockGraph::default();
    let run = item("run", "/proj/run.go", 25);
    let printf = item("Printf", "/usr/local/go/src/fmt/print.go", 200);
    graph.edge("run", printf, 26);

    let traverser = Traverser::new(&graph);
    let callees = traverser.callees(&run, &down(0)).expect("walk");
    assert!(callees.is_empty());

    let with_std = traverser
        .callees(
            &run,
            &TraversalOptions {
                include_std: true,
                ..down(0)
            },
        )
        .expect("walk with std");
    assert_eq!(with_std.len(), 1);
}

#[test]
fn root_fetch_failure_is_fatal() {
    let mut graph = MockGraph::default();
    graph.fail("a");

    let traverser = Traverser::new(&graph);
    let result = traverser.callees(&item("a", "/proj/a.go", 10), &down(0));

    match result {
        Err(TraverseError::Root { method, .. }) => {
            assert_eq!(method, "callHierarchy/outgoingCalls");
        }
        Ok(_) => panic!("root failure must surface"),
    }
}

#[test]
fn descendant_fetch_failure_degrades_to_a_leaf() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    graph.edge("a", b, 11);
    graph.fail("b");

    let traverser = Traverser::new(&graph);

    let flat = traverser.callees(&a, &down(0)).expect("partial result");
    assert_eq!(flat.len(), 1, "b itself is still reported");

    let tree = traverser.build_tree(&a, &down(0)).expect("partial tree");
    assert_eq!(tree.paths, vec!["a:11 -> b"]);
}

#[test]
fn line_numbers_are_one_based() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    // Defined on 1-based line 20, i.e. zero-based 19 on the wire
    let b = item("b", "/proj/b.go", 20);
    graph.edge("a", b, 11);

    let traverser = Traverser::new(&graph);
    let flat = traverser.callees(&a, &down(0)).expect("walk");

    assert_eq!(flat[0].line, 20);
    assert_eq!(flat[0].file, Path::new("/proj/b.go"));
}

struct CannedSignatures;

impl SignatureProvider for CannedSignatures {
    fn signature(&self, file: &Path, _line: u32) -> Option<String> {
        file.ends_with("b.go").then(|| "func b(n int) error".to_string())
    }
}

#[test]
fn signature_provider_labels_symbols_and_absence_degrades() {
    let mut graph = MockGraph::default();
    let a = item("a", "/proj/a.go", 10);
    let b = item("b", "/proj/b.go", 20);
    graph.edge("a", b, 11);

    let bare = Traverser::new(&graph)
        .build_tree(&a, &down(0))
        .expect("tree without signatures");
    assert!(bare.symbols["b"].signature.is_none());

    let signatures = CannedSignatures;
    let labeled = Traverser::new(&graph)
        .with_signatures(&signatures)
        .build_tree(&a, &down(0))
        .expect("tree with signatures");
    assert_eq!(
        labeled.symbols["b"].signature.as_deref(),
        Some("func b(n int) error")
    );
    // The provider knows nothing about a.go; the entry stays bare
    assert!(labeled.symbols["a"].signature.is_none());
}
