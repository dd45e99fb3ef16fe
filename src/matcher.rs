//! The structural unifier.
//!
//! `match_node` produces a lazy stream of extended environments, one per way the pattern
//! matches. Branches are explored left to right, shortest ellipsis skip first, so the stream
//! is deterministic: consumers that only need to know whether a match exists stop after the
//! first item, everyone else drains it.

use std::cell::RefCell;
use std::iter;
use std::rc::Rc;

use log::{trace, warn};
use serde::Deserialize;

use crate::budget::Budget;
use crate::env::{Bound, Env};
use crate::equiv::EquivalenceTable;
use crate::tree::{MetaVar, Node, Op, Shape};
use crate::DiagnosticKind;

/// Search configuration shared by every rule of a scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Largest number of alternative orders tried for one unordered node; beyond it the node is
    /// matched in source order only.
    pub max_permutations: usize,
    /// Yield the matches of every successful order of an unordered node rather than only those
    /// of the first.
    pub enumerate_permutations: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            max_permutations: 120,
            enumerate_permutations: false,
        }
    }
}

pub type Envs<'a, 't> = Box<dyn Iterator<Item = Env<'t>> + 'a>;

fn none<'a, 't: 'a>() -> Envs<'a, 't> {
    Box::new(iter::empty())
}

fn one<'a, 't: 'a>(env: Env<'t>) -> Envs<'a, 't> {
    Box::new(iter::once(env))
}

fn when<'a, 't: 'a>(ok: bool, env: Env<'t>) -> Envs<'a, 't> {
    if ok {
        one(env)
    } else {
        none()
    }
}

/// Pattern siblings in the order they are being tried.
pub(crate) type Siblings<'a> = Rc<[&'a Node]>;

pub struct Matcher<'m> {
    equiv: &'m EquivalenceTable,
    budget: &'m Budget,
    config: &'m MatchConfig,
    diagnostics: RefCell<Vec<DiagnosticKind>>,
}

impl<'m> Matcher<'m> {
    pub fn new(equiv: &'m EquivalenceTable, budget: &'m Budget, config: &'m MatchConfig) -> Self {
        Matcher {
            equiv,
            budget,
            config,
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub fn budget(&self) -> &Budget {
        self.budget
    }

    /// Diagnostics recorded so far, each reported once.
    pub fn take_diagnostics(&self) -> Vec<DiagnosticKind> {
        self.diagnostics.replace(Vec::new())
    }

    fn report(&self, kind: DiagnosticKind) {
        let mut diagnostics = self.diagnostics.borrow_mut();
        if !diagnostics.contains(&kind) {
            warn!("{}", kind);
            diagnostics.push(kind);
        }
    }

    /// All the ways `pat` matches `code` given the bindings in `env`.
    pub fn match_node<'a, 't: 'a>(
        &'a self,
        pat: &'a Node,
        code: &'t Node,
        env: Env<'t>,
    ) -> Envs<'a, 't> {
        if !self.budget.tick() {
            return none();
        }
        match (&pat.shape, &code.shape) {
            (Shape::Meta(mv), _) => self.match_meta(mv, code, env),
            // outside of a sibling list an ellipsis stands in for exactly one node
            (Shape::Ellipsis(None), _) => one(env),
            (Shape::Ellipsis(Some(name)), _) => {
                match self.bind_seq(name, std::slice::from_ref(code), &env) {
                    Some(env) => one(env),
                    None => none(),
                }
            }
            (Shape::Literal(a), Shape::Literal(b)) => when(a == b, env),
            (Shape::Ident(a), Shape::Ident(b)) => when(a == b, env),
            (Shape::Escape(a), Shape::Escape(b)) => when(a == b, env),
            (Shape::Op(pop, ps), Shape::Op(cop, cs)) => self.match_op(pop, ps, cop, cs, env),
            (Shape::Seq(ps), Shape::Seq(cs)) => self.match_seq(ps.iter().collect(), 0, cs, env),
            (Shape::Container(pk, ps), Shape::Container(ck, cs)) if pk == ck => {
                self.match_children(pk.name(), ps, cs, env)
            }
            _ => none(),
        }
    }

    fn match_meta<'a, 't: 'a>(&'a self, mv: &'a MetaVar, code: &'t Node, env: Env<'t>) -> Envs<'a, 't> {
        if let Shape::Escape(_) = code.shape {
            return none();
        }
        let name = match mv {
            MetaVar::Anonymous => return one(env),
            MetaVar::Named(name) => name,
        };
        match env.get(name) {
            Some(bound) => {
                let same = bound.equal(&Bound::Node(code));
                if !same {
                    trace!("match_meta: {} already bound to a different subtree", name);
                }
                when(same, env)
            }
            None => match env.bind(name, Bound::Node(code)) {
                Ok(env) => one(env),
                Err(e) => {
                    self.report(DiagnosticKind::Inconsistency(e));
                    none()
                }
            },
        }
    }

    fn bind_seq<'t>(&self, name: &str, seq: &'t [Node], env: &Env<'t>) -> Option<Env<'t>> {
        match env.get(name) {
            Some(bound) if bound.equal(&Bound::Seq(seq)) => Some(env.clone()),
            Some(_) => None,
            None => match env.bind(name, Bound::Seq(seq)) {
                Ok(env) => Some(env),
                Err(e) => {
                    self.report(DiagnosticKind::Inconsistency(e));
                    None
                }
            },
        }
    }

    fn match_op<'a, 't: 'a>(
        &'a self,
        pop: &'a Op,
        pats: &'a [Node],
        cop: &'t Op,
        codes: &'t [Node],
        env: Env<'t>,
    ) -> Envs<'a, 't> {
        if !self.equiv.is_equivalent_operator(&pop.tag, &cop.tag) {
            return none();
        }
        self.match_children(&pop.tag, pats, codes, env)
    }

    /// Children of an operator or container, in source order and then in each alternative
    /// order the table declares for `key`.
    fn match_children<'a, 't: 'a>(
        &'a self,
        key: &str,
        pats: &'a [Node],
        codes: &'t [Node],
        env: Env<'t>,
    ) -> Envs<'a, 't> {
        if !pats.iter().any(Node::is_ellipsis) && pats.len() != codes.len() {
            return none();
        }
        let identity: Siblings<'a> = pats.iter().collect();
        let alternatives =
            match self
                .equiv
                .reorder_candidates(key, pats, self.config.max_permutations)
            {
                Ok(perms) => perms,
                Err(e) => {
                    self.report(DiagnosticKind::PermutationFallback(e));
                    Vec::new()
                }
            };
        if alternatives.is_empty() {
            return self.match_seq(identity, 0, codes, env);
        }
        let orders: Vec<Siblings<'a>> = iter::once(identity)
            .chain(
                alternatives
                    .into_iter()
                    .map(|perm| perm.into_iter().map(|i| &pats[i]).collect()),
            )
            .collect();
        let branches = orders
            .into_iter()
            .map(move |order| self.match_seq(order, 0, codes, env.clone()));
        if self.config.enumerate_permutations {
            Box::new(branches.flatten())
        } else {
            Box::new(FirstSuccess::new(branches))
        }
    }

    /// Match `pats[at..]` against all of `codes`.
    pub(crate) fn match_seq<'a, 't: 'a>(
        &'a self,
        pats: Siblings<'a>,
        at: usize,
        codes: &'t [Node],
        env: Env<'t>,
    ) -> Envs<'a, 't> {
        if !self.budget.tick() {
            return none();
        }
        let pat = match pats.get(at) {
            Some(&pat) => pat,
            None => return when(codes.is_empty(), env),
        };
        let rest = &pats[at + 1..];
        let floating = rest.iter().any(|p| p.is_ellipsis());
        if let Shape::Ellipsis(name) = &pat.shape {
            // with no ellipsis downstream, only one skip length can line up
            let skips: Box<dyn Iterator<Item = usize>> = if floating {
                Box::new(0..=codes.len())
            } else {
                match codes.len().checked_sub(rest.len()) {
                    Some(k) => Box::new(iter::once(k)),
                    None => return none(),
                }
            };
            return Box::new(skips.flat_map(move |skip| {
                let env = match name {
                    Some(name) => match self.bind_seq(name, &codes[..skip], &env) {
                        Some(env) => env,
                        None => return none(),
                    },
                    None => env.clone(),
                };
                self.match_seq(pats.clone(), at + 1, &codes[skip..], env)
            }));
        }
        if !floating && rest.len() + 1 != codes.len() {
            return none();
        }
        let (first, tail) = match codes.split_first() {
            Some(x) => x,
            None => return none(),
        };
        Box::new(
            self.match_node(pat, first, env)
                .flat_map(move |env| self.match_seq(pats.clone(), at + 1, tail, env)),
        )
    }
}

/// Yields the items of the first branch that yields anything, and nothing from later branches.
pub(crate) struct FirstSuccess<I: Iterator> {
    branches: I,
    current: Option<I::Item>,
    committed: bool,
}

impl<I: Iterator> FirstSuccess<I> {
    pub fn new(branches: I) -> Self {
        FirstSuccess {
            branches,
            current: None,
            committed: false,
        }
    }
}

impl<I> Iterator for FirstSuccess<I>
where
    I: Iterator,
    I::Item: Iterator,
{
    type Item = <I::Item as Iterator>::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(x) = current.next() {
                    self.committed = true;
                    return Some(x);
                }
                self.current = None;
                if self.committed {
                    return None;
                }
            } else if self.committed {
                return None;
            }
            self.current = Some(self.branches.next()?);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::equiv::Unordered;
    use crate::tree::{ContainerKind, LitKind};

    fn int(v: &str) -> Node {
        Node::literal(LitKind::Int, v)
    }

    fn call(f: &str, args: Vec<Node>) -> Node {
        let mut xs = vec![Node::ident(f)];
        xs.extend(args);
        Node::variadic("call", xs)
    }

    fn kwarg(k: &str, v: &str) -> Node {
        Node::op("kwarg", vec![Node::ident(k), int(v)])
    }

    fn all<'t>(table: &EquivalenceTable, config: &MatchConfig, pat: &Node, code: &'t Node) -> Vec<Env<'t>> {
        let budget = Budget::unlimited();
        let matcher = Matcher::new(table, &budget, config);
        let out: Vec<_> = matcher.match_node(pat, code, Env::new()).collect();
        out
    }

    fn count(pat: &Node, code: &Node) -> usize {
        all(&EquivalenceTable::new(), &MatchConfig::default(), pat, code).len()
    }

    #[test]
    fn ellipsis_matches_any_argument_count() {
        let pat = call("f", vec![Node::ellipsis()]);
        for n in 0..5 {
            let code = call("f", (0..n).map(|i| int(&i.to_string())).collect());
            assert_eq!(count(&pat, &code), 1, "{} arguments", n);
        }
        assert_eq!(count(&pat, &call("g", vec![])), 0);
    }

    #[test]
    fn ellipsis_skips_shortest_first() {
        let pat = call("f", vec![Node::ellipsis(), Node::meta("$X"), Node::ellipsis()]);
        let code = call("f", vec![int("1"), int("2"), int("3")]);
        let envs = all(&EquivalenceTable::new(), &MatchConfig::default(), &pat, &code);
        let bound: Vec<_> = envs
            .iter()
            .map(|e| match e.get("$X") {
                Some(Bound::Node(n)) => crate::repr::flat(n),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(bound, vec!["1", "2", "3"]);
    }

    #[test]
    fn repeated_metavariable_must_agree() {
        let pat = Node::op("binary:==", vec![Node::meta("$X"), Node::meta("$X")]);
        let same = Node::op("binary:==", vec![Node::ident("a"), Node::ident("a")]);
        let diff = Node::op("binary:==", vec![Node::ident("a"), Node::ident("b")]);
        assert_eq!(count(&pat, &same), 1);
        assert_eq!(count(&pat, &diff), 0);
    }

    #[test]
    fn anonymous_metavariable_does_not_bind() {
        let pat = Node::op("binary:==", vec![Node::anonymous(), Node::anonymous()]);
        let diff = Node::op("binary:==", vec![Node::ident("a"), Node::ident("b")]);
        let envs = all(&EquivalenceTable::new(), &MatchConfig::default(), &pat, &diff);
        assert_eq!(envs.len(), 1);
        assert!(envs[0].is_empty());
    }

    #[test]
    fn named_ellipsis_binds_sequences() {
        let pat = call("f", vec![Node::named_ellipsis("$...A"), int("3")]);
        let code = call("f", vec![int("1"), int("2"), int("3")]);
        let envs = all(&EquivalenceTable::new(), &MatchConfig::default(), &pat, &code);
        assert_eq!(envs.len(), 1);
        match envs[0].get("$...A") {
            Some(Bound::Seq(xs)) => assert_eq!(xs.len(), 2),
            _ => panic!("expected a sequence binding"),
        }
    }

    #[test]
    fn escapes_are_opaque() {
        let esc = Node::escape("Type", "Vec < u8 >");
        assert_eq!(count(&Node::meta("$T"), &esc), 0);
        assert_eq!(count(&esc.clone(), &esc), 1);
        assert_eq!(count(&Node::escape("Type", "Vec < u16 >"), &esc), 0);
    }

    #[test]
    fn unordered_keyword_arguments() {
        let pat = call("f", vec![kwarg("a", "1"), kwarg("b", "2")]);
        let code = call("f", vec![kwarg("b", "2"), kwarg("a", "1")]);
        let ordered = EquivalenceTable::new();
        let unordered =
            EquivalenceTable::new().unordered("call", Unordered::after(1).only("kwarg"));
        let config = MatchConfig::default();
        assert_eq!(all(&ordered, &config, &pat, &code).len(), 0);
        assert_eq!(all(&unordered, &config, &pat, &code).len(), 1);
    }

    #[test]
    fn permutation_limit_falls_back_to_source_order() {
        let table = EquivalenceTable::new().unordered("call", Unordered::after(1));
        let config = MatchConfig { max_permutations: 1, ..MatchConfig::default() };
        let pat = call("f", vec![int("1"), int("2"), int("3")]);
        let swapped = call("f", vec![int("2"), int("1"), int("3")]);
        let budget = Budget::unlimited();
        let matcher = Matcher::new(&table, &budget, &config);
        assert_eq!(matcher.match_node(&pat, &swapped, Env::new()).count(), 0);
        assert_eq!(matcher.match_node(&pat, &pat, Env::new()).count(), 1);
        let diagnostics = matcher.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], DiagnosticKind::PermutationFallback(_)));
    }

    #[test]
    fn first_successful_order_wins_unless_enumerating() {
        let table = EquivalenceTable::new().unordered("set", Unordered::all());
        let pat = Node::variadic("set", vec![Node::meta("$A"), Node::meta("$B")]);
        let code = Node::variadic("set", vec![int("1"), int("2")]);
        let first = all(&table, &MatchConfig::default(), &pat, &code);
        assert_eq!(first.len(), 1);
        let config = MatchConfig { enumerate_permutations: true, ..MatchConfig::default() };
        assert_eq!(all(&table, &config, &pat, &code).len(), 2);
    }

    #[test]
    fn unordered_containers() {
        let table = EquivalenceTable::new().unordered("set", Unordered::all());
        let config = MatchConfig::default();
        let set = |xs: &[&str]| Node::container(ContainerKind::Set, xs.iter().map(|x| Node::ident(*x)).collect());
        let list = |xs: &[&str]| Node::container(ContainerKind::List, xs.iter().map(|x| Node::ident(*x)).collect());
        assert_eq!(all(&table, &config, &set(&["a", "b"]), &set(&["b", "a"])).len(), 1);
        assert_eq!(all(&table, &config, &list(&["a", "b"]), &list(&["b", "a"])).len(), 0);
        assert_eq!(all(&EquivalenceTable::new(), &config, &set(&["a", "b"]), &set(&["b", "a"])).len(), 0);
    }

    #[test]
    fn budget_stops_the_search() {
        let pat = call(
            "f",
            vec![
                Node::ellipsis(),
                Node::ident("a"),
                Node::ellipsis(),
                Node::ident("a"),
                Node::ellipsis(),
                Node::ident("b"),
            ],
        );
        let code = call("f", (0..40).map(|_| Node::ident("a")).collect());
        let table = EquivalenceTable::new();
        let config = MatchConfig::default();
        let budget = Budget::new(Some(500), None);
        let matcher = Matcher::new(&table, &budget, &config);
        assert_eq!(matcher.match_node(&pat, &code, Env::new()).count(), 0);
        assert!(budget.check().is_err());
    }

    #[test]
    fn first_success_commits() {
        let branches = vec![vec![], vec![1, 2], vec![3]];
        let out: Vec<i32> = FirstSuccess::new(branches.into_iter().map(|b| b.into_iter())).collect();
        assert_eq!(out, vec![1, 2]);
    }
}
