//! Text renderings of generic trees, for debugging patterns and for bindings without source.

use std::fmt::{Display, Write};

use crate::tree::{LitKind, MetaVar, Node, Shape};

pub(crate) trait Emitter {
    fn meta(&mut self, name: &str);
    fn ident(&mut self, name: &str) {
        self.meta(name)
    }
    fn item(&mut self, s: impl Display);
    fn text_item(&mut self, s: impl Display);
    fn opener(&mut self, s: impl Display);
    fn closer(&mut self);
    fn maybe_break(&mut self) {}
    fn finish(self) -> String;
}

/// Space-separated s-expression-like rendering: `call{ f 1 }`.
pub(crate) struct ReprEmitter {
    buf: String,
    sibling: bool,
}

impl ReprEmitter {
    pub fn new() -> Self {
        ReprEmitter {
            buf: String::new(),
            sibling: false,
        }
    }

    fn maybe_comma(&mut self) {
        if self.sibling {
            self.buf.push(' ');
        }
    }
}

impl Emitter for ReprEmitter {
    fn meta(&mut self, name: &str) {
        self.maybe_comma();
        self.buf.push_str(name);
        self.sibling = true;
    }

    fn item(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "{}", s);
        self.sibling = true;
    }

    fn text_item(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "{:?}", s.to_string());
        self.sibling = true;
    }

    fn opener(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "{}{{", s);
        self.sibling = true;
    }

    fn closer(&mut self) {
        self.maybe_comma();
        self.buf.push('}');
        self.sibling = true;
    }

    fn maybe_break(&mut self) {
        if !self.buf.is_empty() {
            self.buf.push('\n');
            self.sibling = false;
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Nested-array rendering: `["call","f",1]`.
pub(crate) struct JsonEmitter {
    buf: String,
    sibling: bool,
    scalar_context: bool,
}

impl JsonEmitter {
    pub fn new() -> Self {
        JsonEmitter {
            buf: "[".to_owned(),
            sibling: false,
            scalar_context: false,
        }
    }

    pub fn new_scalar() -> Self {
        JsonEmitter {
            buf: String::new(),
            sibling: false,
            scalar_context: true,
        }
    }

    fn maybe_comma(&mut self) {
        if self.sibling {
            self.buf.push(',');
        }
    }
}

impl Emitter for JsonEmitter {
    fn meta(&mut self, name: &str) {
        self.maybe_comma();
        let _ = write!(self.buf, "{:?}", name);
        self.sibling = true;
    }

    fn item(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "{}", s);
        self.sibling = true;
    }

    fn text_item(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "{:?}", s.to_string());
        self.sibling = true;
    }

    fn opener(&mut self, s: impl Display) {
        self.maybe_comma();
        let _ = write!(self.buf, "[{:?}", s.to_string());
        self.sibling = true;
    }

    fn closer(&mut self) {
        self.buf.push(']');
        self.sibling = true;
    }

    fn finish(mut self) -> String {
        if !self.scalar_context {
            self.buf.push(']');
        }
        self.buf
    }
}

pub(crate) fn emit<E: Emitter>(e: &mut E, node: &Node) {
    match &node.shape {
        Shape::Ident(name) => e.ident(name),
        Shape::Literal(lit) => match lit.kind {
            LitKind::Str | LitKind::Char | LitKind::Other => e.text_item(&lit.text),
            _ => e.item(&lit.text),
        },
        Shape::Escape(esc) => {
            e.opener(&esc.tag);
            e.text_item(&esc.text);
            e.closer();
        }
        Shape::Meta(MetaVar::Named(name)) => e.meta(name),
        Shape::Meta(MetaVar::Anonymous) => e.meta("$_"),
        Shape::Ellipsis(None) => e.meta("..."),
        Shape::Ellipsis(Some(name)) => e.meta(name),
        Shape::Op(op, xs) => {
            e.opener(&op.tag);
            xs.iter().for_each(|x| emit(e, x));
            e.closer();
        }
        Shape::Container(kind, xs) => {
            e.opener(kind.name());
            xs.iter().for_each(|x| emit(e, x));
            e.closer();
        }
        Shape::Seq(xs) => {
            e.opener("seq");
            xs.iter().for_each(|x| emit(e, x));
            e.closer();
        }
    }
}

pub fn flat(node: &Node) -> String {
    let mut e = ReprEmitter::new();
    emit(&mut e, node);
    e.finish()
}

/// One line per node.
pub fn flat_seq(nodes: &[Node]) -> String {
    let mut e = ReprEmitter::new();
    for x in nodes {
        e.maybe_break();
        emit(&mut e, x);
    }
    e.finish()
}

pub fn json(node: &Node) -> String {
    let mut e = JsonEmitter::new_scalar();
    emit(&mut e, node);
    e.finish()
}

pub fn json_seq(nodes: &[Node]) -> String {
    let mut e = JsonEmitter::new();
    nodes.iter().for_each(|x| emit(&mut e, x));
    e.finish()
}
