//! Textual symbol queries resolved to exactly one workspace location.
//!
//! A query like `config.Load` or `(*Server).Start` is parsed into a name plus
//! optional qualifier, searched via the server's workspace-symbol index, and
//! filtered down to one unambiguous hit. Zero hits fail with fuzzy
//! suggestions; several hits fail with the full candidate list rather than a
//! silent first-pick.

use lsp_types::{Location, SymbolInformation, SymbolKind};
use thiserror::Error;
use tracing::debug;

use crate::lsp::{self, Client, LspError};

/// Default cap on fuzzy suggestions in a not-found error.
const MAX_SUGGESTIONS: usize = 5;

/// Error from symbol resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No workspace symbol matched the query.
    #[error("symbol '{query}' not found{}", format_suggestions(.suggestions))]
    NotFound {
        /// The original query text.
        query: String,
        /// Near-miss candidates ranked by edit distance, possibly empty.
        suggestions: Vec<String>,
    },

    /// More than one workspace symbol matched after filtering.
    #[error("symbol '{query}' is ambiguous: {}", .candidates.join(", "))]
    Ambiguous {
        /// The original query text.
        query: String,
        /// Qualified name of every match, one entry per match.
        candidates: Vec<String>,
    },

    /// The workspace-symbol search itself failed.
    #[error("workspace search for '{query}' failed ({method})")]
    Search {
        /// The original query text.
        query: String,
        /// The RPC method that failed.
        method: &'static str,
        /// The underlying protocol or transport error.
        #[source]
        source: LspError,
    },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}", suggestions.join(", "))
    }
}

/// A parsed textual symbol query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolQuery {
    /// The query exactly as written.
    pub raw: String,
    /// Package or receiver-type qualifier, when present. For the
    /// pointer-receiver form this is the receiver type name.
    pub qualifier: Option<String>,
    /// The bare symbol name to search for.
    pub name: String,
    /// Whether the query used the `(*Type).Method` form.
    pub pointer_receiver: bool,
}

impl SymbolQuery {
    /// Parse a query string.
    ///
    /// Accepted forms: `Name`, `qualifier.Name`, `(*Type).Method`, and
    /// `pkg.(*Type).Method` (the package prefix narrows nothing further than
    /// the receiver type does, so it is accepted and folded away).
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let raw = input.trim().to_string();

        if let Some(open) = raw.find("(*")
            && let Some(close) = raw[open..].find(')').map(|i| open + i)
        {
            let qualifier = raw[open + 2..close].to_string();
            let name = raw[close + 1..].trim_start_matches('.').to_string();
            return Self {
                raw,
                qualifier: Some(qualifier),
                name,
                pointer_receiver: true,
            };
        }

        match raw.rsplit_once('.') {
            Some((qualifier, name)) => {
                let (qualifier, name) = (qualifier.to_string(), name.to_string());
                Self {
                    raw,
                    qualifier: Some(qualifier),
                    name,
                    pointer_receiver: false,
                }
            }
            None => Self {
                name: raw.clone(),
                raw,
                qualifier: None,
                pointer_receiver: false,
            },
        }
    }

    /// Whether a workspace-symbol hit satisfies this query.
    fn matches(&self, hit: &SymbolInformation) -> bool {
        if !name_matches(&hit.name, &self.name) {
            return false;
        }
        if self.pointer_receiver && hit.kind != SymbolKind::METHOD {
            return false;
        }
        match &self.qualifier {
            Some(qualifier) => {
                qualifier_matches(qualifier, hit.container_name.as_deref(), &hit.name)
            }
            None => true,
        }
    }
}

/// The symbol at the end of a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    /// Bare symbol name.
    pub name: String,
    /// Container-qualified name, e.g. `config.Load`.
    pub qualified: String,
    /// The symbol's kind as reported by the server.
    pub kind: SymbolKind,
    /// Definition location.
    pub location: Location,
}

/// Workspace-symbol search, the seam between the resolver and the protocol.
pub trait SymbolSearch {
    /// Free-text workspace symbol search.
    ///
    /// # Errors
    ///
    /// Propagates the underlying protocol or transport error.
    fn workspace_symbols(&self, query: &str) -> lsp::Result<Vec<SymbolInformation>>;
}

impl SymbolSearch for Client {
    fn workspace_symbols(&self, query: &str) -> lsp::Result<Vec<SymbolInformation>> {
        Client::workspace_symbols(self, query)
    }
}

/// Resolves parsed queries through a [`SymbolSearch`].
pub struct Resolver<'a, S: SymbolSearch> {
    search: &'a S,
    max_suggestions: usize,
}

impl<'a, S: SymbolSearch> Resolver<'a, S> {
    /// Create a resolver over a symbol search.
    #[must_use]
    pub fn new(search: &'a S) -> Self {
        Self {
            search,
            max_suggestions: MAX_SUGGESTIONS,
        }
    }

    /// Override the suggestion cap for not-found errors.
    #[must_use]
    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    /// Resolve a query to exactly one symbol.
    ///
    /// Searches by bare name (broad servers fuzzy-match the full string
    /// otherwise) and filters the hits by exact name, qualifier, and kind
    /// expectation.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NotFound`] with ranked suggestions on zero matches,
    /// [`ResolveError::Ambiguous`] with every candidate on several, and
    /// [`ResolveError::Search`] when the search RPC itself fails.
    pub fn resolve(&self, query: &SymbolQuery) -> Result<ResolvedSymbol, ResolveError> {
        let hits = self
            .search
            .workspace_symbols(&query.name)
            .map_err(|source| ResolveError::Search {
                query: query.raw.clone(),
                method: "workspace/symbol",
                source,
            })?;

        debug!(query = %query.raw, hits = hits.len(), "workspace symbol search");

        let mut matches: Vec<&SymbolInformation> =
            hits.iter().filter(|hit| query.matches(hit)).collect();

        match matches.len() {
            1 => {
                let hit = matches.remove(0);
                Ok(ResolvedSymbol {
                    name: hit.name.clone(),
                    qualified: qualified_name(hit),
                    kind: hit.kind,
                    location: hit.location.clone(),
                })
            }
            0 => Err(ResolveError::NotFound {
                query: query.raw.clone(),
                suggestions: self.suggest(&query.raw, &hits),
            }),
            _ => Err(ResolveError::Ambiguous {
                query: query.raw.clone(),
                candidates: matches.iter().map(|hit| qualified_name(hit)).collect(),
            }),
        }
    }

    /// Rank every search hit by edit distance against the raw query.
    ///
    /// Candidates farther than `query_len / 2 + 1` are dropped; the rest are
    /// sorted ascending by distance (name as tiebreak) and capped.
    fn suggest(&self, query: &str, hits: &[SymbolInformation]) -> Vec<String> {
        let threshold = query.chars().count() / 2 + 1;

        let mut ranked: Vec<(usize, String)> = hits
            .iter()
            .map(qualified_name)
            .map(|candidate| (levenshtein(query, &candidate), candidate))
            .filter(|(distance, _)| *distance <= threshold)
            .collect();

        ranked.sort();
        ranked.dedup_by(|a, b| a.1 == b.1);
        ranked.truncate(self.max_suggestions);
        ranked.into_iter().map(|(_, candidate)| candidate).collect()
    }
}

fn qualified_name(hit: &SymbolInformation) -> String {
    match hit.container_name.as_deref() {
        // Container paths like "example.com/proj/config" qualify by their
        // last segment
        Some(container) => {
            let short = container.rsplit('/').next().unwrap_or(container);
            if hit.name.contains('.') {
                hit.name.clone()
            } else {
                format!("{short}.{}", hit.name)
            }
        }
        None => hit.name.clone(),
    }
}

fn name_matches(hit_name: &str, want: &str) -> bool {
    // Servers report methods either bare ("Load") or receiver-qualified
    // ("Config.Load", "(*Config).Load")
    hit_name == want || hit_name.rsplit('.').next() == Some(want)
}

fn qualifier_matches(qualifier: &str, container: Option<&str>, hit_name: &str) -> bool {
    let qualifier = qualifier.rsplit('.').next().unwrap_or(qualifier);

    if let Some(container) = container {
        if container == qualifier {
            return true;
        }
        if container.rsplit(['/', '.']).next() == Some(qualifier) {
            return true;
        }
    }

    // Receiver type folded into the symbol name, e.g. "(*Config).Load"
    let mut segments = hit_name.rsplit('.');
    let _name = segments.next();
    segments
        .next()
        .map(|receiver| receiver.trim_start_matches("(*").trim_end_matches(')'))
        == Some(qualifier)
}

/// Classic two-row dynamic-programming Levenshtein distance, in characters.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Load", None, "Load", false)]
    #[case("config.Load", Some("config"), "Load", false)]
    #[case("(*Config).Load", Some("Config"), "Load", true)]
    #[case("config.(*Config).Load", Some("Config"), "Load", true)]
    #[case("a.b.Name", Some("a.b"), "Name", false)]
    fn query_parsing(
        #[case] input: &str,
        #[case] qualifier: Option<&str>,
        #[case] name: &str,
        #[case] pointer_receiver: bool,
    ) {
        let query = SymbolQuery::parse(input);
        assert_eq!(query.raw, input);
        assert_eq!(query.qualifier.as_deref(), qualifier);
        assert_eq!(query.name, name);
        assert_eq!(query.pointer_receiver, pointer_receiver);
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        assert_eq!(SymbolQuery::parse("  Load "), SymbolQuery::parse("Load"));
    }

    #[rstest]
    #[case("kitten", "sitting", 3)]
    #[case("Load", "Load", 0)]
    #[case("config.Laod", "config.Load", 2)]
    #[case("config.Laod", "config.LoadFile", 6)]
    #[case("", "abc", 3)]
    fn edit_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein(a, b), expected);
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a in ".{0,24}", b in ".{0,24}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn distance_is_zero_only_on_equality(a in ".{0,24}", b in ".{0,24}") {
            prop_assert_eq!(levenshtein(&a, &b) == 0, a == b);
        }

        #[test]
        fn distance_is_bounded_by_longer_input(a in ".{0,24}", b in ".{0,24}") {
            let chars = |s: &str| s.chars().count();
            prop_assert!(levenshtein(&a, &b) <= chars(&a).max(chars(&b)));
        }
    }
}
