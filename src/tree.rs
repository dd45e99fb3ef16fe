//! The language-agnostic syntax tree shared by parsed code and compiled patterns.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A source location. Lines are 1-based, columns count chars from 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

/// Half-open source range. Pattern nodes carry the default (empty) span.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Whether `other` lies within `self` (inclusive on both ends).
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The smallest span covering both.
    pub fn join(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Str,
    Char,
    Bool,
    Other,
}

/// A literal, normalized by the frontend: `text` is the literal's value, not its spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub kind: LitKind,
    pub text: String,
}

/// Arity class of an operator application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Op {
    pub tag: String,
    pub arity: Arity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Tuple,
    Map,
    Set,
}

impl ContainerKind {
    /// Lowercase name; also the key under which an equivalence table declares the container.
    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::List => "list",
            ContainerKind::Tuple => "tuple",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        }
    }
}

/// Opaque passthrough for constructs without a generic shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Escape {
    pub tag: String,
    pub text: String,
}

/// Pattern-only placeholder that matches one subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaVar {
    /// `$X`
    Named(String),
    /// `$_`
    Anonymous,
}

#[derive(Debug, Clone)]
pub enum Shape {
    Literal(Literal),
    Ident(String),
    Op(Op, Vec<Node>),
    Seq(Vec<Node>),
    Container(ContainerKind, Vec<Node>),
    Escape(Escape),
    // pattern-only
    Meta(MetaVar),
    /// `...`, or `$...X` when named
    Ellipsis(Option<String>),
}

/// Closed set of node kinds, as reported by `Node::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Literal,
    Ident,
    Op,
    Seq,
    Container,
    Escape,
    Meta,
    Ellipsis,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub shape: Shape,
    pub span: Span,
}

impl Node {
    pub fn new(shape: Shape) -> Self {
        Node { shape, span: Span::default() }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Node::new(Shape::Ident(name.into()))
    }

    pub fn literal(kind: LitKind, text: impl Into<String>) -> Self {
        Node::new(Shape::Literal(Literal { kind, text: text.into() }))
    }

    /// Fixed-arity operator application; the arity is the number of children given.
    pub fn op(tag: impl Into<String>, children: Vec<Node>) -> Self {
        let arity = Arity::Fixed(children.len());
        Node::new(Shape::Op(Op { tag: tag.into(), arity }, children))
    }

    pub fn variadic(tag: impl Into<String>, children: Vec<Node>) -> Self {
        let op = Op { tag: tag.into(), arity: Arity::Variadic };
        Node::new(Shape::Op(op, children))
    }

    pub fn seq(children: Vec<Node>) -> Self {
        Node::new(Shape::Seq(children))
    }

    pub fn container(kind: ContainerKind, children: Vec<Node>) -> Self {
        Node::new(Shape::Container(kind, children))
    }

    pub fn escape(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Node::new(Shape::Escape(Escape { tag: tag.into(), text: text.into() }))
    }

    /// `$NAME`; the name is stored with its sigil.
    pub fn meta(name: impl Into<String>) -> Self {
        Node::new(Shape::Meta(MetaVar::Named(name.into())))
    }

    pub fn anonymous() -> Self {
        Node::new(Shape::Meta(MetaVar::Anonymous))
    }

    pub fn ellipsis() -> Self {
        Node::new(Shape::Ellipsis(None))
    }

    pub fn named_ellipsis(name: impl Into<String>) -> Self {
        Node::new(Shape::Ellipsis(Some(name.into())))
    }

    pub fn kind(&self) -> Kind {
        match self.shape {
            Shape::Literal(_) => Kind::Literal,
            Shape::Ident(_) => Kind::Ident,
            Shape::Op(..) => Kind::Op,
            Shape::Seq(_) => Kind::Seq,
            Shape::Container(..) => Kind::Container,
            Shape::Escape(_) => Kind::Escape,
            Shape::Meta(_) => Kind::Meta,
            Shape::Ellipsis(_) => Kind::Ellipsis,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.shape {
            Shape::Op(_, xs) | Shape::Seq(xs) | Shape::Container(_, xs) => xs,
            _ => &[],
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_ellipsis(&self) -> bool {
        matches!(self.shape, Shape::Ellipsis(_))
    }

    /// Whether this tree contains pattern-only nodes.
    pub fn is_pattern(&self) -> bool {
        matches!(self.shape, Shape::Meta(_) | Shape::Ellipsis(_))
            || self.children().iter().any(Node::is_pattern)
    }

    /// Pre-order walk over this node and all its descendants.
    pub fn subtrees(&self) -> Subtrees<'_> {
        Subtrees { stack: vec![self] }
    }
}

pub struct Subtrees<'t> {
    stack: Vec<&'t Node>,
}

impl<'t> Iterator for Subtrees<'t> {
    type Item = &'t Node;
    fn next(&mut self) -> Option<&'t Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Structural equality that ignores spans.
pub fn generic_equal(a: &Node, b: &Node) -> bool {
    match (&a.shape, &b.shape) {
        (Shape::Literal(x), Shape::Literal(y)) => x == y,
        (Shape::Ident(x), Shape::Ident(y)) => x == y,
        (Shape::Escape(x), Shape::Escape(y)) => x == y,
        (Shape::Meta(x), Shape::Meta(y)) => x == y,
        (Shape::Ellipsis(x), Shape::Ellipsis(y)) => x == y,
        (Shape::Op(x, xs), Shape::Op(y, ys)) => x == y && all_equal(xs, ys),
        (Shape::Seq(xs), Shape::Seq(ys)) => all_equal(xs, ys),
        (Shape::Container(x, xs), Shape::Container(y, ys)) => x == y && all_equal(xs, ys),
        _ => false,
    }
}

/// `generic_equal` over sibling sequences.
pub fn all_equal(xs: &[Node], ys: &[Node]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| generic_equal(x, y))
}

/// A parsed file: the root node plus the text it came from.
#[derive(Debug, Clone)]
pub struct Tree {
    language: String,
    source: Option<Arc<str>>,
    line_starts: Vec<usize>,
    root: Node,
}

impl Tree {
    /// A root without a span is taken to cover the whole source.
    pub fn new(language: impl Into<String>, source: impl Into<Arc<str>>, root: Node) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let mut tree = Tree {
            language: language.into(),
            source: Some(source),
            line_starts,
            root,
        };
        if tree.root.span == Span::default() {
            tree.root.span = tree.extent();
        }
        tree
    }

    /// A tree handed over without source text; snippets are rendered from the nodes.
    pub fn from_root(language: impl Into<String>, root: Node) -> Self {
        Tree {
            language: language.into(),
            source: None,
            line_starts: Vec::new(),
            root,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn offset(&self, pos: Position) -> Option<usize> {
        let source = self.source.as_deref()?;
        let start = *self.line_starts.get(pos.line.checked_sub(1)?)?;
        let line = &source[start..];
        match line.char_indices().nth(pos.column) {
            Some((i, _)) => Some(start + i),
            None if line.chars().count() == pos.column => Some(source.len()),
            None => None,
        }
    }

    /// Source text covered by `span`, if the tree has source and the span lies within it.
    pub fn snippet(&self, span: Span) -> Option<&str> {
        let (start, end) = (self.offset(span.start)?, self.offset(span.end)?);
        self.source.as_deref()?.get(start..end)
    }

    /// Text of a node: its source snippet when available, its flat rendering otherwise.
    pub fn node_text<'a>(&'a self, node: &'a Node) -> Cow<'a, str> {
        if node.span != Span::default() {
            if let Some(s) = self.snippet(node.span) {
                return Cow::Borrowed(s);
            }
        }
        match &node.shape {
            Shape::Ident(name) => Cow::Borrowed(name),
            Shape::Literal(lit) => Cow::Borrowed(&lit.text),
            _ => Cow::Owned(crate::repr::flat(node)),
        }
    }

    /// Span of the whole source, or of the root node for trees without source.
    pub fn extent(&self) -> Span {
        match self.source.as_deref() {
            Some(source) => {
                let last = self.line_starts.len();
                let tail = &source[self.line_starts[last - 1]..];
                Span::new(Position::new(1, 0), Position::new(last, tail.chars().count()))
            }
            None => self.root.span,
        }
    }
}
