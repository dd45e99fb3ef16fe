//! Running rules over files and collecting findings.

use std::path::PathBuf;

use log::{debug, trace};
use rayon::prelude::*;

use crate::env::Bound;
use crate::matcher::MatchConfig;
use crate::pattern::Match;
use crate::rule::{Rule, Severity};
use crate::tree::{Span, Tree};
use crate::{Diagnostic, DiagnosticKind};

/// A parsed file to scan.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub tree: Tree,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>, tree: Tree) -> Self {
        Target { path: path.into(), tree }
    }
}

/// What a metavariable was bound to, as reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundValue {
    pub name: String,
    pub snippet: String,
    /// `None` for an empty sequence.
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: String,
    pub path: PathBuf,
    pub span: Span,
    pub severity: Severity,
    /// The rule's message, with metavariable names replaced by their bound text.
    pub message: String,
    pub bindings: Vec<BoundValue>,
}

impl Finding {
    pub fn binding(&self, name: &str) -> Option<&BoundValue> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub path: PathBuf,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
}

fn bound_text(tree: &Tree, value: Bound) -> String {
    match value {
        Bound::Node(n) => tree.node_text(n).into_owned(),
        Bound::Seq(xs) => {
            match value.span().filter(|s| *s != Span::default()).and_then(|s| tree.snippet(s)) {
                Some(s) => s.to_owned(),
                None => xs
                    .iter()
                    .map(|x| tree.node_text(x).into_owned())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        }
    }
}

/// Substitute bound text for metavariable names, longest names first so `$X` does not
/// clobber `$XS`.
fn interpolate(message: &str, bindings: &[BoundValue]) -> String {
    let mut by_length: Vec<&BoundValue> = bindings.iter().collect();
    by_length.sort_by(|a, b| b.name.len().cmp(&a.name.len()));
    by_length
        .into_iter()
        .fold(message.to_owned(), |msg, b| msg.replace(&b.name, &b.snippet))
}

fn finding(rule: &Rule, target: &Target, m: &Match) -> Finding {
    let bindings: Vec<BoundValue> = m
        .env
        .iter()
        .map(|(name, value)| BoundValue {
            name: name.to_owned(),
            snippet: bound_text(&target.tree, value),
            span: value.span(),
        })
        .collect();
    Finding {
        rule_id: rule.id.clone(),
        path: target.path.clone(),
        span: m.span,
        severity: rule.config.severity,
        message: interpolate(&rule.message, &bindings),
        bindings,
    }
}

/// Evaluates rules against targets. Holds no per-scan state, so one scanner may serve any number
/// of scans.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: MatchConfig,
}

impl Scanner {
    pub fn new(config: MatchConfig) -> Self {
        Scanner { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Evaluate every applicable rule against one file. A rule's timeout or limit only affects
    /// that rule's findings.
    pub fn scan_file(&self, target: &Target, rules: &[Rule]) -> FileReport {
        let mut report = FileReport {
            path: target.path.clone(),
            ..FileReport::default()
        };
        for rule in rules {
            if rule.language != target.tree.language() {
                trace!("{}: skipping {} rule for {} file", rule.id, rule.language, target.tree.language());
                continue;
            }
            let eval = rule.evaluate(&target.tree, &self.config);
            let mut kinds = eval.diagnostics;
            let mut matches = eval.matches;
            let limit = rule.config.max_match_count;
            if limit > 0 && matches.len() > limit {
                matches.truncate(limit);
                kinds.push(DiagnosticKind::MatchLimit { limit });
            }
            report
                .findings
                .extend(matches.iter().map(|m| finding(rule, target, m)));
            report.diagnostics.extend(kinds.into_iter().map(|kind| Diagnostic {
                rule_id: rule.id.clone(),
                kind,
            }));
        }
        debug!(
            "{}: {} findings, {} diagnostics",
            target.path.display(),
            report.findings.len(),
            report.diagnostics.len()
        );
        report
    }

    /// Scan files in parallel. Reports come back in the order of `targets`.
    pub fn scan(&self, targets: &[Target], rules: &[Rule]) -> Vec<FileReport> {
        targets
            .par_iter()
            .map(|target| self.scan_file(target, rules))
            .collect()
    }
}
