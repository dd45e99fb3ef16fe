//! Structural code search.
//!
//! Patterns are written in the concrete syntax of the target language, extended with
//! metavariables (`$X`, `$_`), ellipsis (`...`) and named ellipsis (`$...ARGS`). Both patterns
//! and code are lowered into one language-agnostic tree ([`Node`]); the matcher unifies the two,
//! producing a lazy stream of binding environments. Rules combine patterns with boolean
//! connectives and metavariable constraints, and the [`Scanner`] runs rules over many files in
//! parallel, each (rule, file) evaluation under its own step/time budget.
//!
//! ```ignore
//! let pattern = genmatch::compile("$X == $X", "rust")?;
//! let tree = genmatch::parse("fn f(a: u8) -> bool { a == a }", "rust")?;
//! assert_eq!(pattern.find(&tree).len(), 1);
//! ```

mod budget;
mod cache;
mod env;
mod equiv;
mod matcher;
mod pattern;
mod repr;
mod rule;
mod scan;
mod tree;

#[cfg(feature = "syn")]
mod ast;
#[cfg(feature = "syn")]
mod tokens;

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use crate::budget::Budget;
pub use crate::cache::PatternCache;
pub use crate::env::{Bound, Env};
pub use crate::equiv::{EquivalenceTable, Unordered};
pub use crate::matcher::{MatchConfig, Matcher};
pub use crate::pattern::{Match, Pattern, PatternKind};
pub use crate::rule::{Comparison, Constraint, Evaluation, Formula, Rule, RuleConfig, Severity};
pub use crate::scan::{BoundValue, FileReport, Finding, Scanner, Target};
pub use crate::tree::{
    generic_equal, Arity, ContainerKind, Escape, Kind, LitKind, Literal, MetaVar, Node, Op,
    Position, Shape, Span, Tree,
};

#[cfg(feature = "syn")]
pub use crate::ast::Rust;

/// Pattern text that is not valid in the language's grammar extended with pattern syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {language} pattern: {message}")]
pub struct PatternSyntaxError {
    pub language: String,
    pub message: String,
}

/// Source text the frontend could not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{language} parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub language: String,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// The search budget ran out before the evaluation finished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("match timed out after {steps} steps ({elapsed:?})")]
pub struct MatchTimeout {
    pub steps: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{tag}` has {permutations} alternative orders, over the limit of {limit}; matching in source order only")]
pub struct PermutationLimitExceeded {
    pub tag: String,
    pub permutations: usize,
    pub limit: usize,
}

/// A binding was attempted over an existing one. Indicates a matcher bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal inconsistency: {metavar} bound twice in one match attempt")]
pub struct InternalInconsistency {
    pub metavar: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    PatternSyntax(#[from] PatternSyntaxError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Timeout(#[from] MatchTimeout),
    #[error(transparent)]
    PermutationLimit(#[from] PermutationLimitExceeded),
    #[error(transparent)]
    Inconsistency(#[from] InternalInconsistency),
    #[error("no frontend for language `{0}`")]
    UnknownLanguage(String),
    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable problem met while evaluating one rule against one file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("{0}")]
    Timeout(MatchTimeout),
    #[error("{0}")]
    PermutationFallback(PermutationLimitExceeded),
    #[error("{0}")]
    Inconsistency(InternalInconsistency),
    #[error("more than {limit} matches; the rest were dropped")]
    MatchLimit { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rule_id: String,
    pub kind: DiagnosticKind,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.rule_id, self.kind)
    }
}

/// A language: its parser, its pattern compiler and its equivalence table.
pub trait Frontend: Send + Sync {
    /// Canonical language identifier, as stored in trees and patterns.
    fn language(&self) -> &'static str;
    fn parse(&self, source: &str) -> std::result::Result<Tree, ParseError>;
    fn compile_pattern(&self, text: &str) -> std::result::Result<Pattern, PatternSyntaxError>;
    fn equivalences(&self) -> Arc<EquivalenceTable>;
}

/// Look up the frontend for a language identifier.
pub fn frontend(language: &str) -> Result<&'static dyn Frontend> {
    match language {
        #[cfg(feature = "syn")]
        "rust" | "rs" => Ok(&ast::Rust),
        _ => Err(Error::UnknownLanguage(language.to_owned())),
    }
}

/// Compile pattern text for `language`.
pub fn compile(text: &str, language: &str) -> Result<Pattern> {
    Ok(frontend(language)?.compile_pattern(text)?)
}

/// Parse source text for `language`.
pub fn parse(source: &str, language: &str) -> Result<Tree> {
    Ok(frontend(language)?.parse(source)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_language() {
        match compile("f(...)", "cobol") {
            Err(Error::UnknownLanguage(lang)) => assert_eq!(lang, "cobol"),
            other => panic!("unexpected: {:?}", other.map(|p| p.text().to_owned())),
        }
    }

    #[test]
    fn diagnostics_display() {
        let d = Diagnostic {
            rule_id: "r1".into(),
            kind: DiagnosticKind::MatchLimit { limit: 3 },
        };
        assert_eq!(d.to_string(), "r1: more than 3 matches; the rest were dropped");
    }

    #[cfg(feature = "syn")]
    #[test]
    fn language_aliases() {
        assert_eq!(frontend("rs").unwrap().language(), "rust");
        assert!(compile("$X + 1", "rs").is_ok());
    }
}
