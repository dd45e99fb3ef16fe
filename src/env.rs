//! Metavariable binding environments.
//!
//! An `Env` is a persistent list: extending it shares the existing bindings, so every branch of
//! the backtracking search owns an independent snapshot for the price of one allocation.

use std::sync::Arc;

use crate::tree::{all_equal, generic_equal, Node, Span};
use crate::InternalInconsistency;

/// What a metavariable is bound to.
#[derive(Debug, Clone, Copy)]
pub enum Bound<'t> {
    Node(&'t Node),
    /// Bound by a named ellipsis; may be empty.
    Seq(&'t [Node]),
}

impl<'t> Bound<'t> {
    pub fn equal(&self, other: &Bound<'_>) -> bool {
        match (self, other) {
            (Bound::Node(a), Bound::Node(b)) => generic_equal(a, b),
            (Bound::Seq(a), Bound::Seq(b)) => all_equal(a, b),
            _ => false,
        }
    }

    /// Source range of the binding; `None` for an empty sequence.
    pub fn span(&self) -> Option<Span> {
        match self {
            Bound::Node(n) => Some(n.span),
            Bound::Seq(xs) => match (xs.first(), xs.last()) {
                (Some(a), Some(b)) => Some(a.span.join(&b.span)),
                _ => None,
            },
        }
    }
}

struct Entry<'t> {
    name: Arc<str>,
    value: Bound<'t>,
    next: Option<Arc<Entry<'t>>>,
}

#[derive(Clone, Default)]
pub struct Env<'t> {
    head: Option<Arc<Entry<'t>>>,
    len: usize,
}

impl<'t> Env<'t> {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entries(&self) -> impl Iterator<Item = &Entry<'t>> {
        std::iter::successors(self.head.as_deref(), |e| e.next.as_deref())
    }

    pub fn get(&self, name: &str) -> Option<Bound<'t>> {
        self.entries().find(|e| &*e.name == name).map(|e| e.value)
    }

    /// A new environment with `name` bound. Rebinding a bound name is a matcher bug.
    pub fn bind(&self, name: &str, value: Bound<'t>) -> Result<Env<'t>, InternalInconsistency> {
        if self.get(name).is_some() {
            return Err(InternalInconsistency { metavar: name.to_owned() });
        }
        let entry = Entry {
            name: Arc::from(name),
            value,
            next: self.head.clone(),
        };
        Ok(Env { head: Some(Arc::new(entry)), len: self.len + 1 })
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Bound<'t>)> {
        let mut xs: Vec<_> = self.entries().map(|e| (&*e.name, e.value)).collect();
        xs.reverse();
        xs.into_iter()
    }

    /// Whether every name bound in both environments is bound to equal values.
    pub fn compatible(&self, other: &Env<'_>) -> bool {
        self.entries()
            .all(|e| other.get(&e.name).map_or(true, |v| e.value.equal(&v)))
    }

    /// Union of two compatible environments; `None` when they disagree.
    pub fn merge(&self, other: &Env<'t>) -> Option<Env<'t>> {
        let mut env = self.clone();
        for (name, value) in other.iter() {
            match env.get(name) {
                Some(bound) if bound.equal(&value) => (),
                Some(_) => return None,
                None => env = env.bind(name, value).ok()?,
            }
        }
        Some(env)
    }

    /// Same names bound to equal values, irrespective of binding order.
    pub fn same_bindings(&self, other: &Env<'_>) -> bool {
        self.len == other.len && self.compatible(other)
    }
}

impl std::fmt::Debug for Env<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            match value {
                Bound::Node(n) => map.entry(&name, &crate::repr::flat(n)),
                Bound::Seq(xs) => map.entry(&name, &crate::repr::flat_seq(xs)),
            };
        }
        map.finish()
    }
}
