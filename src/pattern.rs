//! Compiled patterns and where they are tried.

use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace};

use crate::budget::Budget;
use crate::env::Env;
use crate::equiv::EquivalenceTable;
use crate::matcher::{FirstSuccess, MatchConfig, Matcher, Siblings};
use crate::repr;
use crate::tree::{Node, Shape, Span, Tree};
use crate::PatternSyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// A single expression; matches any subtree at any depth.
    Expr,
    /// Statements or items; matches a contiguous window of any statement sequence.
    StmtSeq,
}

/// One way a pattern matched.
#[derive(Debug, Clone)]
pub struct Match<'t> {
    pub span: Span,
    pub env: Env<'t>,
}

/// A compiled pattern. Immutable once built; shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Pattern {
    language: String,
    text: String,
    kind: PatternKind,
    root: Node,
    /// Sibling range of a `StmtSeq` root that takes part in matching: unnamed ellipses at the
    /// edges are redundant under window semantics.
    window: (usize, usize),
    equivalences: Arc<EquivalenceTable>,
}

fn syntax_error(language: &str, message: impl Into<String>) -> PatternSyntaxError {
    PatternSyntaxError {
        language: language.to_owned(),
        message: message.into(),
    }
}

impl Pattern {
    /// Build a pattern from a tree a frontend (or a caller's own parser) produced. A
    /// `StmtSeq` pattern's root must be a `Seq` of its statements.
    pub fn new(
        language: impl Into<String>,
        text: impl Into<String>,
        kind: PatternKind,
        root: Node,
        equivalences: Arc<EquivalenceTable>,
    ) -> Result<Pattern, PatternSyntaxError> {
        let language = language.into();
        let window = match kind {
            PatternKind::Expr => {
                if root.is_ellipsis() {
                    return Err(syntax_error(&language, "a pattern cannot be a lone ellipsis"));
                }
                (0, 0)
            }
            PatternKind::StmtSeq => {
                let items = match &root.shape {
                    Shape::Seq(items) => items,
                    _ => return Err(syntax_error(&language, "statement pattern without a sequence root")),
                };
                let edge = |n: &Node| matches!(n.shape, Shape::Ellipsis(None));
                let start = items.iter().take_while(|n| edge(n)).count();
                let end = items.len() - items[start..].iter().rev().take_while(|n| edge(n)).count();
                if start == end {
                    let message = if items.is_empty() {
                        "empty pattern"
                    } else {
                        "a pattern cannot consist only of ellipses"
                    };
                    return Err(syntax_error(&language, message));
                }
                (start, end)
            }
        };
        let pattern = Pattern {
            language,
            text: text.into(),
            kind,
            root,
            window,
            equivalences,
        };
        trace!("compiled pattern {:?}: {}", pattern.text, pattern.debug_flat_repr());
        Ok(pattern)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn equivalences(&self) -> &EquivalenceTable {
        &self.equivalences
    }

    fn siblings(&self) -> &[Node] {
        &self.root.children()[self.window.0..self.window.1]
    }

    /// Every match of this pattern within `root`, in pre-order of the matched node, then
    /// in the matcher's branch order. Lazy: stop early to only test for existence.
    pub fn matches<'a, 't: 'a>(
        &'a self,
        matcher: &'a Matcher<'a>,
        root: &'t Node,
    ) -> Box<dyn Iterator<Item = Match<'t>> + 'a> {
        match self.kind {
            PatternKind::Expr => Box::new(root.subtrees().flat_map(move |code| {
                matcher
                    .match_node(&self.root, code, Env::new())
                    .map(move |env| Match { span: code.span, env })
            })),
            PatternKind::StmtSeq => {
                let pats: Siblings<'a> = self.siblings().iter().collect();
                Box::new(
                    root.subtrees()
                        .filter_map(|node| match &node.shape {
                            Shape::Seq(xs) => Some(&xs[..]),
                            _ => None,
                        })
                        .flat_map(move |codes| {
                            let pats = pats.clone();
                            (0..codes.len()).flat_map(move |start| {
                                self.windows_from(matcher, pats.clone(), &codes[start..])
                            })
                        }),
                )
            }
        }
    }

    /// Matches of a statement window beginning at `codes[0]`: window ends are tried shortest
    /// first and only the first window that matches at all is reported.
    fn windows_from<'a, 't: 'a>(
        &'a self,
        matcher: &'a Matcher<'a>,
        pats: Siblings<'a>,
        codes: &'t [Node],
    ) -> impl Iterator<Item = Match<'t>> + 'a {
        let rejected = match (pats.first(), codes.first()) {
            (Some(pat), Some(code)) => self.quick_reject(pat, code),
            _ => true,
        };
        let ends = if rejected { 0..0 } else { 1..codes.len() + 1 };
        FirstSuccess::new(ends.map(move |end| {
            let window = &codes[..end];
            let span = window[0].span.join(&window[end - 1].span);
            matcher
                .match_seq(Rc::clone(&pats), 0, window, Env::new())
                .map(move |env| Match { span, env })
        }))
    }

    /// Cheap test that `pat` cannot match `code`, to skip windows without entering the matcher.
    fn quick_reject(&self, pat: &Node, code: &Node) -> bool {
        match (&pat.shape, &code.shape) {
            (Shape::Meta(_), _) | (Shape::Ellipsis(_), _) => false,
            (Shape::Op(a, _), Shape::Op(b, _)) => {
                !self.equivalences.is_equivalent_operator(&a.tag, &b.tag)
            }
            (Shape::Ident(a), Shape::Ident(b)) => a != b,
            (a, b) => std::mem::discriminant(a) != std::mem::discriminant(b),
        }
    }

    /// All matches within `tree`, with an unlimited budget and the default configuration.
    pub fn find<'t>(&self, tree: &'t Tree) -> Vec<Match<'t>> {
        let budget = Budget::unlimited();
        let config = MatchConfig::default();
        let matcher = Matcher::new(&self.equivalences, &budget, &config);
        let found: Vec<_> = self.matches(&matcher, tree.root()).collect();
        debug!("{:?}: {} matches", self.text, found.len());
        found
    }

    pub fn debug_tree_repr(&self) -> String {
        match self.kind {
            PatternKind::Expr => repr::json(&self.root),
            PatternKind::StmtSeq => repr::json_seq(self.root.children()),
        }
    }

    pub fn debug_flat_repr(&self) -> String {
        match self.kind {
            PatternKind::Expr => repr::flat(&self.root),
            PatternKind::StmtSeq => repr::flat_seq(self.root.children()),
        }
    }
}
