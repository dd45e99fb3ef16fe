//! Rules: boolean formulas over patterns, evaluated against one tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;

use crate::budget::Budget;
use crate::env::{Bound, Env};
use crate::matcher::{MatchConfig, Matcher};
use crate::pattern::{Match, Pattern};
use crate::tree::{LitKind, Node, Shape, Span, Tree};
use crate::{DiagnosticKind, Error, MatchTimeout, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Warning
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Wall-clock budget of one (rule, file) evaluation; 0 disables it.
    pub timeout_seconds: f64,
    pub max_steps: Option<u64>,
    /// Findings kept per file; 0 keeps all.
    pub max_match_count: usize,
    pub severity: Severity,
}

impl Default for RuleConfig {
    fn default() -> Self {
        RuleConfig {
            timeout_seconds: 5.0,
            max_steps: None,
            max_match_count: 0,
            severity: Severity::Warning,
        }
    }
}

impl RuleConfig {
    pub(crate) fn budget(&self) -> Budget {
        let timeout = if self.timeout_seconds > 0.0 && self.timeout_seconds.is_finite() {
            Some(Duration::from_secs_f64(self.timeout_seconds))
        } else {
            None
        };
        Budget::new(self.max_steps, timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
        }
    }
}

/// A side condition on what a metavariable is bound to.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The bound text contains a match of `regex`.
    Regex { metavar: String, regex: Regex },
    /// The bound node is an integer literal and compares true against `value`.
    Compare {
        metavar: String,
        op: Comparison,
        value: i64,
    },
    /// `formula` matches somewhere within the bound code.
    Pattern { metavar: String, formula: Box<Formula> },
}

impl Constraint {
    fn metavar(&self) -> &str {
        match self {
            Constraint::Regex { metavar, .. }
            | Constraint::Compare { metavar, .. }
            | Constraint::Pattern { metavar, .. } => metavar,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Formula {
    Pattern(Arc<Pattern>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Not(Box<Formula>),
    /// Matches of the first formula that lie within a match of the second.
    Inside(Box<Formula>, Box<Formula>),
    NotInside(Box<Formula>, Box<Formula>),
    Where(Box<Formula>, Vec<Constraint>),
}

impl Formula {
    pub fn pattern(pattern: impl Into<Arc<Pattern>>) -> Self {
        Formula::Pattern(pattern.into())
    }

    pub fn not(f: Formula) -> Self {
        Formula::Not(Box::new(f))
    }

    pub fn inside(a: Formula, b: Formula) -> Self {
        Formula::Inside(Box::new(a), Box::new(b))
    }

    pub fn not_inside(a: Formula, b: Formula) -> Self {
        Formula::NotInside(Box::new(a), Box::new(b))
    }

    pub fn when(f: Formula, constraints: Vec<Constraint>) -> Self {
        Formula::Where(Box::new(f), constraints)
    }

    fn patterns<'a>(&'a self, out: &mut Vec<&'a Pattern>) {
        match self {
            Formula::Pattern(p) => out.push(p),
            Formula::And(fs) | Formula::Or(fs) => fs.iter().for_each(|f| f.patterns(out)),
            Formula::Not(f) => f.patterns(out),
            Formula::Inside(a, b) | Formula::NotInside(a, b) => {
                a.patterns(out);
                b.patterns(out);
            }
            Formula::Where(f, cs) => {
                f.patterns(out);
                for c in cs {
                    if let Constraint::Pattern { formula, .. } = c {
                        formula.patterns(out);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub language: String,
    pub message: String,
    pub formula: Formula,
    pub config: RuleConfig,
}

/// Result of evaluating one rule against one tree.
#[derive(Debug)]
pub struct Evaluation<'t> {
    pub matches: Vec<Match<'t>>,
    pub diagnostics: Vec<DiagnosticKind>,
    /// Budget steps spent, matching and combining results alike.
    pub steps: u64,
}

impl Rule {
    /// Every pattern of `formula` must have been compiled for `language`.
    pub fn new(
        id: impl Into<String>,
        language: impl Into<String>,
        message: impl Into<String>,
        formula: Formula,
        config: RuleConfig,
    ) -> Result<Rule> {
        let rule = Rule {
            id: id.into(),
            language: language.into(),
            message: message.into(),
            formula,
            config,
        };
        let mut patterns = Vec::new();
        rule.formula.patterns(&mut patterns);
        if let Some(p) = patterns.iter().find(|p| p.language() != rule.language) {
            let reason = format!(
                "pattern {:?} is for {}, not {}",
                p.text(),
                p.language(),
                rule.language
            );
            return Err(Error::InvalidRule { rule: rule.id.clone(), reason });
        }
        Ok(rule)
    }

    /// Evaluate against `tree` under a fresh budget. A timeout discards every match and is
    /// reported as a diagnostic.
    pub fn evaluate<'t>(&self, tree: &'t Tree, config: &MatchConfig) -> Evaluation<'t> {
        let budget = self.config.budget();
        let mut eval = Evaluator {
            tree,
            config,
            budget: &budget,
            diagnostics: Vec::new(),
        };
        let result = eval.formula(&self.formula, tree.root());
        let mut diagnostics = eval.diagnostics;
        let matches = match result {
            Ok(matches) => matches,
            Err(timeout) => {
                warn!("{}: {}", self.id, timeout);
                diagnostics.push(DiagnosticKind::Timeout(timeout));
                Vec::new()
            }
        };
        let steps = budget.steps();
        debug!("{}: {} matches in {} steps", self.id, matches.len(), steps);
        Evaluation {
            matches,
            diagnostics,
            steps,
        }
    }
}

type Matches<'t> = std::result::Result<Vec<Match<'t>>, MatchTimeout>;

struct Evaluator<'e, 't> {
    tree: &'t Tree,
    config: &'e MatchConfig,
    budget: &'e Budget,
    diagnostics: Vec<DiagnosticKind>,
}

fn by_span<'m, 't>(matches: &'m [Match<'t>]) -> HashMap<Span, Vec<&'m Match<'t>>> {
    let mut index: HashMap<Span, Vec<&Match>> = HashMap::new();
    for m in matches {
        index.entry(m.span).or_default().push(m);
    }
    index
}

impl<'e, 't> Evaluator<'e, 't> {
    /// One unit of work spent combining results; fails once the budget is gone.
    fn step(&self) -> std::result::Result<(), MatchTimeout> {
        self.budget.tick();
        self.budget.check()
    }

    /// Drop later entries with the same span and bindings as an earlier one.
    fn dedup(&self, matches: Vec<Match<'t>>) -> Matches<'t> {
        let mut seen: HashMap<Span, Vec<usize>> = HashMap::new();
        let mut out: Vec<Match<'t>> = Vec::with_capacity(matches.len());
        for m in matches {
            self.step()?;
            let same_span = seen.entry(m.span).or_default();
            let mut duplicate = false;
            for &i in same_span.iter() {
                self.step()?;
                if out[i].env.same_bindings(&m.env) {
                    duplicate = true;
                    break;
                }
            }
            if !duplicate {
                same_span.push(out.len());
                out.push(m);
            }
        }
        Ok(out)
    }

    fn formula(&mut self, f: &Formula, scope: &'t Node) -> Matches<'t> {
        let matches = match f {
            Formula::Pattern(p) => self.pattern(p, scope)?,
            Formula::And(fs) => self.and(fs, scope)?,
            Formula::Not(_) => self.and(std::slice::from_ref(f), scope)?,
            Formula::Or(fs) => {
                let mut all = Vec::new();
                for f in fs {
                    all.extend(self.formula(f, scope)?);
                }
                all
            }
            Formula::Inside(a, b) => {
                let outer = self.formula(b, scope)?;
                let mut kept = Vec::new();
                for m in self.formula(a, scope)? {
                    for o in &outer {
                        self.step()?;
                        if !o.span.contains(&m.span) {
                            continue;
                        }
                        if let Some(env) = m.env.merge(&o.env) {
                            kept.push(Match { span: m.span, env });
                            break;
                        }
                    }
                }
                kept
            }
            Formula::NotInside(a, b) => {
                let outer = self.formula(b, scope)?;
                let mut kept = Vec::new();
                for m in self.formula(a, scope)? {
                    if !self.contains_compatible(&outer, &m)? {
                        kept.push(m);
                    }
                }
                kept
            }
            Formula::Where(f, constraints) => {
                let mut kept = Vec::new();
                for m in self.formula(f, scope)? {
                    if self.satisfies(constraints, &m)? {
                        kept.push(m);
                    }
                }
                kept
            }
        };
        self.dedup(matches)
    }

    fn pattern(&mut self, p: &Pattern, scope: &'t Node) -> Matches<'t> {
        let matcher = Matcher::new(p.equivalences(), self.budget, self.config);
        let found: Vec<_> = p.matches(&matcher, scope).collect();
        for d in matcher.take_diagnostics() {
            if !self.diagnostics.contains(&d) {
                self.diagnostics.push(d);
            }
        }
        self.budget.check()?;
        Ok(found)
    }

    /// Join positive terms on equal spans; negative terms veto candidates containing a
    /// compatible match.
    fn and(&mut self, fs: &[Formula], scope: &'t Node) -> Matches<'t> {
        let (negative, positive): (Vec<&Formula>, Vec<&Formula>) =
            fs.iter().partition(|f| matches!(f, Formula::Not(_)));
        let mut candidates = match positive.split_first() {
            None => vec![Match { span: scope.span, env: Env::new() }],
            Some((first, rest)) => {
                let mut candidates = self.formula(first, scope)?;
                for f in rest {
                    let other = self.formula(f, scope)?;
                    let other = by_span(&other);
                    let mut joined = Vec::new();
                    for c in &candidates {
                        for o in other.get(&c.span).into_iter().flatten() {
                            self.step()?;
                            if let Some(env) = c.env.merge(&o.env) {
                                joined.push(Match { span: c.span, env });
                            }
                        }
                    }
                    candidates = joined;
                }
                candidates
            }
        };
        for f in negative {
            let inner = match f {
                Formula::Not(inner) => inner,
                _ => continue,
            };
            let mut vetoes = self.formula(inner, scope)?;
            vetoes.sort_by_key(|v| v.span.start);
            let mut kept = Vec::with_capacity(candidates.len());
            for c in candidates {
                if !self.vetoed(&vetoes, &c)? {
                    kept.push(c);
                }
            }
            candidates = kept;
        }
        Ok(candidates)
    }

    /// Whether some entry of `vetoes` (sorted by start) lies within `c` and agrees with its
    /// bindings.
    fn vetoed(
        &self,
        vetoes: &[Match<'t>],
        c: &Match<'t>,
    ) -> std::result::Result<bool, MatchTimeout> {
        let from = vetoes.partition_point(|v| v.span.start < c.span.start);
        for v in vetoes[from..].iter().take_while(|v| v.span.start <= c.span.end) {
            self.step()?;
            if v.span.end <= c.span.end && c.env.compatible(&v.env) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `m` lies within some compatible entry of `outer`.
    fn contains_compatible(
        &self,
        outer: &[Match<'t>],
        m: &Match<'t>,
    ) -> std::result::Result<bool, MatchTimeout> {
        for o in outer {
            self.step()?;
            if o.span.contains(&m.span) && m.env.compatible(&o.env) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn satisfies(&mut self, constraints: &[Constraint], m: &Match<'t>) -> std::result::Result<bool, MatchTimeout> {
        for c in constraints {
            let bound = match m.env.get(c.metavar()) {
                Some(bound) => bound,
                None => {
                    warn!("constraint on unbound metavariable {}", c.metavar());
                    return Ok(false);
                }
            };
            let ok = match c {
                Constraint::Regex { regex, .. } => regex.is_match(&self.text(bound)),
                Constraint::Compare { op, value, .. } => match bound {
                    Bound::Node(n) => int_value(n).map_or(false, |v| op.holds(v, *value)),
                    Bound::Seq(_) => false,
                },
                Constraint::Pattern { formula, .. } => {
                    let nodes = match bound {
                        Bound::Node(n) => std::slice::from_ref(n),
                        Bound::Seq(xs) => xs,
                    };
                    let mut found = false;
                    for n in nodes {
                        if !self.formula(formula, n)?.is_empty() {
                            found = true;
                            break;
                        }
                    }
                    found
                }
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn text(&self, bound: Bound<'t>) -> String {
        match bound {
            Bound::Node(n) => self.tree.node_text(n).into_owned(),
            Bound::Seq(xs) => match bound.span().and_then(|s| self.tree.snippet(s)) {
                Some(s) => s.to_owned(),
                None => crate::repr::flat_seq(xs),
            },
        }
    }
}

fn int_value(node: &Node) -> Option<i64> {
    match &node.shape {
        Shape::Literal(lit) if lit.kind == LitKind::Int => lit.text.parse().ok(),
        Shape::Op(op, xs) if op.tag == "unary:-" && xs.len() == 1 => int_value(&xs[0]).map(|v| -v),
        _ => None,
    }
}
