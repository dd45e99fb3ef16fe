//! Declarative equivalences consulted by the matcher.
//!
//! A table is plain data keyed by operator tag, or by `ContainerKind::name` for container
//! literals; adding a language means declaring its table.

use std::collections::HashMap;

use log::trace;

use crate::tree::{Node, Shape};
use crate::PermutationLimitExceeded;

/// Which children of an operator or container may be matched in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unordered {
    /// Leading children that never move (e.g. the callee of a call).
    pub fixed_prefix: usize,
    /// Only children that are applications of this operator move; `None` lets every child move.
    /// Unnamed ellipses past the prefix always move.
    pub movable: Option<String>,
}

impl Unordered {
    pub fn all() -> Self {
        Unordered { fixed_prefix: 0, movable: None }
    }

    pub fn after(fixed_prefix: usize) -> Self {
        Unordered { fixed_prefix, movable: None }
    }

    pub fn only(mut self, tag: impl Into<String>) -> Self {
        self.movable = Some(tag.into());
        self
    }

    fn moves(&self, index: usize, child: &Node) -> bool {
        if index < self.fixed_prefix {
            return false;
        }
        match (&child.shape, &self.movable) {
            (Shape::Ellipsis(None), _) => true,
            (Shape::Ellipsis(Some(_)), _) => false,
            (_, None) => true,
            (Shape::Op(op, _), Some(tag)) => &op.tag == tag,
            (_, Some(_)) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EquivalenceTable {
    unordered: HashMap<String, Unordered>,
    /// operator tag -> canonical tag
    aliases: HashMap<String, String>,
}

impl EquivalenceTable {
    /// The empty table: every construct is ordered and operators are only equal to themselves.
    pub fn new() -> Self {
        EquivalenceTable::default()
    }

    pub fn unordered(mut self, tag: impl Into<String>, rule: Unordered) -> Self {
        self.unordered.insert(tag.into(), rule);
        self
    }

    /// Declare `a` and `b` interchangeable. Aliases chain to a single canonical tag.
    pub fn alias(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        let canon = self.canonical(&b).to_owned();
        for v in self.aliases.values_mut() {
            if *v == a {
                *v = canon.clone();
            }
        }
        if a != canon {
            self.aliases.insert(a, canon);
        }
        self
    }

    fn canonical<'a>(&'a self, tag: &'a str) -> &'a str {
        self.aliases.get(tag).map_or(tag, String::as_str)
    }

    pub fn is_equivalent_operator(&self, a: &str, b: &str) -> bool {
        a == b || self.canonical(a) == self.canonical(b)
    }

    pub fn is_unordered(&self, tag: &str) -> bool {
        self.unordered.contains_key(tag)
    }

    /// Alternative child orders to try for an application of `tag`, as index permutations of
    /// `children`, excluding the identity and in lexicographic order. Empty for ordered
    /// constructs.
    pub fn reorder_candidates(
        &self,
        tag: &str,
        children: &[Node],
        limit: usize,
    ) -> Result<Vec<Vec<usize>>, PermutationLimitExceeded> {
        let rule = match self.unordered.get(tag) {
            Some(rule) => rule,
            None => return Ok(Vec::new()),
        };
        let slots: Vec<usize> = (0..children.len())
            .filter(|&i| rule.moves(i, &children[i]))
            .collect();
        if slots.len() < 2 {
            return Ok(Vec::new());
        }
        let alternatives = (1..=slots.len())
            .try_fold(1usize, |acc, k| acc.checked_mul(k))
            .map(|n| n - 1);
        match alternatives {
            Some(n) if n <= limit => (),
            _ => {
                return Err(PermutationLimitExceeded {
                    tag: tag.to_owned(),
                    permutations: alternatives.unwrap_or(usize::MAX),
                    limit,
                })
            }
        }
        let mut out = Vec::new();
        let mut order = slots.clone();
        while next_permutation(&mut order) {
            let mut perm: Vec<usize> = (0..children.len()).collect();
            for (slot, &src) in slots.iter().zip(&order) {
                perm[*slot] = src;
            }
            out.push(perm);
        }
        trace!("reorder_candidates: {}: {} alternatives", tag, out.len());
        Ok(out)
    }
}

/// Advance to the next lexicographic permutation; false once the last has been reached.
fn next_permutation(xs: &mut [usize]) -> bool {
    let i = match (1..xs.len()).rev().find(|&i| xs[i - 1] < xs[i]) {
        Some(i) => i,
        None => return false,
    };
    let j = (i..xs.len()).rev().find(|&j| xs[j] > xs[i - 1]).unwrap_or(i);
    xs.swap(i - 1, j);
    xs[i..].reverse();
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::LitKind;

    fn kwarg(k: &str, v: &str) -> Node {
        Node::op("kwarg", vec![Node::ident(k), Node::literal(LitKind::Int, v)])
    }

    #[test]
    fn ordered_by_default() {
        let table = EquivalenceTable::new();
        let xs = vec![Node::ident("f"), kwarg("a", "1"), kwarg("b", "2")];
        assert!(table.reorder_candidates("call", &xs, 100).unwrap().is_empty());
    }

    #[test]
    fn only_movable_children_permute() {
        let table = EquivalenceTable::new().unordered("call", Unordered::after(1).only("kwarg"));
        let xs = vec![
            Node::ident("f"),
            Node::ident("pos"),
            kwarg("a", "1"),
            kwarg("b", "2"),
            kwarg("c", "3"),
        ];
        let perms = table.reorder_candidates("call", &xs, 100).unwrap();
        assert_eq!(perms.len(), 5);
        assert_eq!(perms[0], vec![0, 1, 2, 4, 3]);
        for p in &perms {
            assert_eq!(&p[..2], &[0, 1]);
        }
    }

    #[test]
    fn unnamed_ellipsis_floats() {
        let table = EquivalenceTable::new().unordered("fields", Unordered::all().only("kwarg"));
        let xs = vec![kwarg("b", "2"), Node::ellipsis()];
        let perms = table.reorder_candidates("fields", &xs, 100).unwrap();
        assert_eq!(perms, vec![vec![1, 0]]);
        let named = vec![kwarg("b", "2"), Node::named_ellipsis("$...R")];
        assert!(table.reorder_candidates("fields", &named, 100).unwrap().is_empty());
    }

    #[test]
    fn limit_is_enforced() {
        let table = EquivalenceTable::new().unordered("set", Unordered::all());
        let xs: Vec<_> = (0..6).map(|i| Node::ident(format!("x{}", i))).collect();
        let err = table.reorder_candidates("set", &xs, 100).unwrap_err();
        assert_eq!(err.permutations, 719);
        assert_eq!(err.limit, 100);
    }

    #[test]
    fn aliases_are_symmetric() {
        let table = EquivalenceTable::new().alias("!=", "<>").alias("ne", "!=");
        assert!(table.is_equivalent_operator("<>", "!="));
        assert!(table.is_equivalent_operator("ne", "<>"));
        assert!(!table.is_equivalent_operator("==", "!="));
    }
}
