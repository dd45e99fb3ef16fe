//! `syn` syntax to generic tree.

use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::Token;

use super::names::Discrim;
use crate::tokens::{placeholder, Placeholder};
use crate::tree::{ContainerKind, LitKind, Node, Position, Span};

/// Lowers either code or pattern syntax. Pattern nodes get no spans, and reserved identifiers
/// in them become metavariables and ellipses.
pub(crate) struct Lower {
    pattern: bool,
}

fn tokens(x: &impl ToTokens) -> String {
    x.to_token_stream().to_string()
}

impl Lower {
    pub fn code() -> Self {
        Lower { pattern: false }
    }

    pub fn pattern() -> Self {
        Lower { pattern: true }
    }

    fn span<T: Spanned + ?Sized>(&self, x: &T) -> Span {
        if self.pattern {
            return Span::default();
        }
        let span = x.span();
        let (start, end) = (span.start(), span.end());
        Span::new(
            Position::new(start.line, start.column),
            Position::new(end.line, end.column),
        )
    }

    fn at<T: Spanned + ?Sized>(&self, node: Node, x: &T) -> Node {
        node.with_span(self.span(x))
    }

    fn escape<T: ToTokens + ?Sized>(&self, tag: &str, x: &T) -> Node {
        self.at(Node::escape(tag, x.to_token_stream().to_string()), x)
    }

    pub fn file(&self, file: &syn::File) -> Node {
        Node::seq(file.items.iter().map(|item| self.item(item)).collect())
    }

    pub fn ident(&self, id: &syn::Ident) -> Node {
        let name = id.to_string();
        if self.pattern {
            match placeholder(&name) {
                Some(Placeholder::Meta(name)) => return Node::meta(name),
                Some(Placeholder::Anonymous) => return Node::anonymous(),
                Some(Placeholder::Ellipsis(None)) => return Node::ellipsis(),
                Some(Placeholder::Ellipsis(Some(name))) => return Node::named_ellipsis(name),
                None => (),
            }
        }
        self.at(Node::ident(name), id)
    }

    fn path(&self, path: &syn::Path) -> Node {
        if let Some(id) = path.get_ident() {
            return self.ident(id);
        }
        if path.segments.iter().any(|seg| !seg.arguments.is_none()) {
            return self.escape("Path", path);
        }
        let segments = path.segments.iter().map(|seg| self.ident(&seg.ident)).collect();
        let tag = if path.leading_colon.is_some() { "global_path" } else { "path" };
        self.at(Node::variadic(tag, segments), path)
    }

    fn lit(&self, lit: &syn::Lit) -> Node {
        let (kind, text) = match lit {
            syn::Lit::Str(s) => (LitKind::Str, s.value()),
            syn::Lit::Char(c) => (LitKind::Char, c.value().to_string()),
            syn::Lit::Int(i) => (LitKind::Int, i.base10_digits().to_owned()),
            syn::Lit::Float(f) => (LitKind::Float, f.base10_digits().to_owned()),
            syn::Lit::Bool(b) => (LitKind::Bool, b.value.to_string()),
            other => (LitKind::Other, tokens(other)),
        };
        self.at(Node::literal(kind, text), lit)
    }

    fn member(&self, member: &syn::Member) -> Node {
        match member {
            syn::Member::Named(id) => self.ident(id),
            syn::Member::Unnamed(index) => {
                self.at(Node::literal(LitKind::Int, index.index.to_string()), index)
            }
        }
    }

    fn exprs<'e>(&self, xs: impl IntoIterator<Item = &'e syn::Expr>) -> Vec<Node> {
        xs.into_iter().map(|x| self.expr(x)).collect()
    }

    fn opt_expr(&self, x: &Option<Box<syn::Expr>>) -> Node {
        match x {
            Some(x) => self.expr(x),
            None => Node::escape("Empty", ""),
        }
    }

    pub fn expr(&self, e: &syn::Expr) -> Node {
        use syn::Expr;
        let node = match e {
            // transparent
            Expr::Paren(x) => return self.expr(&x.expr),
            Expr::Group(x) => return self.expr(&x.expr),
            Expr::Path(x) if x.qself.is_none() => return self.path(&x.path),
            Expr::Lit(x) => return self.lit(&x.lit),
            Expr::Macro(x) => return self.mac(&x.mac),

            Expr::Array(x) => Node::container(ContainerKind::List, self.exprs(&x.elems)),
            Expr::Tuple(x) => Node::container(ContainerKind::Tuple, self.exprs(&x.elems)),
            Expr::Assign(x) => Node::op("assign", vec![self.expr(&x.left), self.expr(&x.right)]),
            Expr::Binary(x) => Node::op(
                format!("binary:{}", tokens(&x.op)),
                vec![self.expr(&x.left), self.expr(&x.right)],
            ),
            Expr::Unary(x) => Node::op(format!("unary:{}", tokens(&x.op)), vec![self.expr(&x.expr)]),
            Expr::Call(x) => {
                let mut xs = vec![self.expr(&x.func)];
                xs.extend(self.exprs(&x.args));
                Node::variadic("call", xs)
            }
            Expr::MethodCall(x) => {
                let mut xs = vec![self.expr(&x.receiver), self.ident(&x.method)];
                if let Some(turbofish) = &x.turbofish {
                    xs.push(self.escape("Turbofish", turbofish));
                }
                xs.extend(self.exprs(&x.args));
                Node::variadic("method_call", xs)
            }
            Expr::Cast(x) => Node::op("cast", vec![self.expr(&x.expr), self.escape("Type", &x.ty)]),
            Expr::Field(x) => Node::op("field", vec![self.expr(&x.base), self.member(&x.member)]),
            Expr::Index(x) => Node::op("index", vec![self.expr(&x.expr), self.expr(&x.index)]),
            Expr::Reference(x) => {
                let tag = if x.mutability.is_some() { "ref_mut" } else { "ref" };
                Node::op(tag, vec![self.expr(&x.expr)])
            }
            Expr::Try(x) => Node::op("try", vec![self.expr(&x.expr)]),
            Expr::Await(x) => Node::op("await", vec![self.expr(&x.base)]),
            Expr::Return(x) => Node::op("return", x.expr.iter().map(|x| self.expr(x)).collect()),
            Expr::Break(x) => Node::op("break", x.expr.iter().map(|x| self.expr(x)).collect()),
            Expr::Continue(_) => Node::op("continue", vec![]),
            Expr::Range(x) => {
                let tag = match x.limits {
                    syn::RangeLimits::HalfOpen(_) => "range",
                    syn::RangeLimits::Closed(_) => "range_inclusive",
                };
                Node::op(tag, vec![self.opt_expr(&x.start), self.opt_expr(&x.end)])
            }
            Expr::Repeat(x) => Node::op("repeat", vec![self.expr(&x.expr), self.expr(&x.len)]),
            Expr::Block(x) => Node::op("block", vec![self.block(&x.block)]),
            Expr::Unsafe(x) => Node::op("unsafe", vec![self.block(&x.block)]),
            Expr::Async(x) => Node::op("async", vec![self.block(&x.block)]),
            Expr::Loop(x) => Node::op("loop", vec![self.block(&x.body)]),
            Expr::While(x) => Node::op("while", vec![self.expr(&x.cond), self.block(&x.body)]),
            Expr::ForLoop(x) => Node::op(
                "for",
                vec![self.pat(&x.pat), self.expr(&x.expr), self.block(&x.body)],
            ),
            Expr::If(x) => {
                let mut xs = vec![self.expr(&x.cond), self.block(&x.then_branch)];
                if let Some((_, otherwise)) = &x.else_branch {
                    xs.push(self.expr(otherwise));
                }
                Node::op("if", xs)
            }
            Expr::Let(x) => Node::op("let_cond", vec![self.pat(&x.pat), self.expr(&x.expr)]),
            Expr::Match(x) => {
                let mut xs = vec![self.expr(&x.expr)];
                xs.extend(x.arms.iter().map(|arm| self.arm(arm)));
                Node::variadic("match", xs)
            }
            Expr::Closure(x) => {
                let params = x.inputs.iter().map(|p| self.pat(p)).collect();
                Node::op(
                    "closure",
                    vec![Node::container(ContainerKind::Tuple, params), self.expr(&x.body)],
                )
            }
            Expr::Struct(x) if x.qself.is_none() => self.struct_expr(x),
            _ => return self.escape(e.discrim(), e),
        };
        self.at(node, e)
    }

    fn struct_expr(&self, x: &syn::ExprStruct) -> Node {
        let fields = x.fields.iter().map(|f| self.field_value(f)).collect();
        let mut xs = vec![self.path(&x.path), Node::variadic("struct_fields", fields)];
        if let Some(base) = &x.rest {
            xs.push(Node::op("struct_base", vec![self.expr(base)]));
        }
        Node::op("struct", xs)
    }

    fn field_value(&self, f: &syn::FieldValue) -> Node {
        let member = self.member(&f.member);
        // shorthand `$X` or `...` stands for a whole field
        if f.colon_token.is_none() && member.is_pattern() {
            return member;
        }
        self.at(Node::op("field_value", vec![member, self.expr(&f.expr)]), f)
    }

    fn arm(&self, arm: &syn::Arm) -> Node {
        let mut xs = vec![self.pat(&arm.pat)];
        if let Some((_, guard)) = &arm.guard {
            xs.push(self.expr(guard));
        }
        xs.push(self.expr(&arm.body));
        self.at(Node::op("arm", xs), arm)
    }

    /// A macro whose body is a comma-separated expression list lowers like a call; any other
    /// body is opaque.
    fn mac(&self, mac: &syn::Macro) -> Node {
        let args = mac.parse_body_with(Punctuated::<syn::Expr, Token![,]>::parse_terminated);
        let node = match args {
            Ok(args) => {
                let mut xs = vec![self.path(&mac.path)];
                xs.extend(self.exprs(&args));
                Node::variadic("macro", xs)
            }
            Err(_) => Node::escape("Macro", tokens(mac)),
        };
        self.at(node, mac)
    }

    pub fn block(&self, block: &syn::Block) -> Node {
        self.at(Node::seq(self.stmts(&block.stmts)), block)
    }

    pub fn stmts(&self, stmts: &[syn::Stmt]) -> Vec<Node> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    #[allow(unreachable_patterns)]
    fn stmt(&self, stmt: &syn::Stmt) -> Node {
        match stmt {
            syn::Stmt::Local(local) => self.local(local),
            syn::Stmt::Item(item) => self.item(item),
            // with or without the semicolon
            syn::Stmt::Expr(e, _) => self.expr(e),
            syn::Stmt::Macro(m) => self.at(self.mac(&m.mac), m),
            _ => self.escape("Stmt", stmt),
        }
    }

    fn local(&self, local: &syn::Local) -> Node {
        let mut xs = vec![self.pat(&local.pat)];
        if let Some(init) = &local.init {
            xs.push(self.expr(&init.expr));
            if let Some((_, diverge)) = &init.diverge {
                xs.push(self.expr(diverge));
            }
        }
        self.at(Node::op("let", xs), local)
    }

    pub fn pat(&self, p: &syn::Pat) -> Node {
        use syn::Pat;
        let node = match p {
            Pat::Paren(x) => return self.pat(&x.pat),
            Pat::Lit(x) => return self.lit(&x.lit),
            Pat::Path(x) if x.qself.is_none() => return self.path(&x.path),
            Pat::Macro(x) => return self.mac(&x.mac),
            Pat::Ident(x) if x.subpat.is_none() => {
                let tag = match (x.by_ref.is_some(), x.mutability.is_some()) {
                    (false, false) => return self.ident(&x.ident),
                    (false, true) => "bind_mut",
                    (true, false) => "bind_ref",
                    (true, true) => "bind_ref_mut",
                };
                Node::op(tag, vec![self.ident(&x.ident)])
            }
            Pat::Wild(_) => Node::ident("_"),
            Pat::Tuple(x) => {
                Node::container(ContainerKind::Tuple, x.elems.iter().map(|p| self.pat(p)).collect())
            }
            Pat::Slice(x) => {
                Node::container(ContainerKind::List, x.elems.iter().map(|p| self.pat(p)).collect())
            }
            Pat::TupleStruct(x) if x.qself.is_none() => {
                let mut xs = vec![self.path(&x.path)];
                xs.extend(x.elems.iter().map(|p| self.pat(p)));
                Node::variadic("tuple_struct", xs)
            }
            Pat::Struct(x) if x.qself.is_none() => self.struct_pat(x),
            Pat::Reference(x) => {
                let tag = if x.mutability.is_some() { "ref_mut" } else { "ref" };
                Node::op(tag, vec![self.pat(&x.pat)])
            }
            Pat::Or(x) => Node::variadic("or", x.cases.iter().map(|p| self.pat(p)).collect()),
            Pat::Type(x) => Node::op("typed", vec![self.pat(&x.pat), self.escape("Type", &x.ty)]),
            _ => return self.escape(p.discrim(), p),
        };
        self.at(node, p)
    }

    fn struct_pat(&self, x: &syn::PatStruct) -> Node {
        let fields = x
            .fields
            .iter()
            .map(|f| {
                let member = self.member(&f.member);
                if f.colon_token.is_none() && member.is_pattern() {
                    member
                } else {
                    self.at(Node::op("field_pat", vec![member, self.pat(&f.pat)]), f)
                }
            })
            .collect();
        let mut xs = vec![self.path(&x.path), Node::variadic("pat_struct_fields", fields)];
        if let Some(rest) = &x.rest {
            xs.push(self.escape("Rest", rest));
        }
        Node::op("pat_struct", xs)
    }

    pub fn item(&self, item: &syn::Item) -> Node {
        use syn::Item;
        let node = match item {
            Item::Fn(x) => self.function(&x.sig, &x.block),
            Item::Impl(x) => {
                let of_trait = match &x.trait_ {
                    Some((_, path, _)) => self.path(path),
                    None => Node::escape("Trait", ""),
                };
                let items = x.items.iter().map(|i| self.impl_item(i)).collect();
                Node::op(
                    "impl",
                    vec![self.escape("Type", &x.self_ty), of_trait, Node::seq(items)],
                )
            }
            Item::Mod(x) => {
                let mut xs = vec![self.ident(&x.ident)];
                if let Some((_, items)) = &x.content {
                    xs.push(Node::seq(items.iter().map(|i| self.item(i)).collect()));
                }
                Node::op("mod", xs)
            }
            Item::Use(x) => Node::op("use", vec![self.use_tree(&x.tree)]),
            Item::Const(x) => Node::op(
                "const",
                vec![self.ident(&x.ident), self.escape("Type", &x.ty), self.expr(&x.expr)],
            ),
            Item::Static(x) => Node::op(
                "static",
                vec![self.ident(&x.ident), self.escape("Type", &x.ty), self.expr(&x.expr)],
            ),
            Item::Macro(x) if x.ident.is_none() => return self.at(self.mac(&x.mac), x),
            _ => return self.escape(item.discrim(), item),
        };
        self.at(node, item)
    }

    fn impl_item(&self, item: &syn::ImplItem) -> Node {
        match item {
            syn::ImplItem::Fn(f) => self.at(self.function(&f.sig, &f.block), f),
            syn::ImplItem::Macro(m) => self.at(self.mac(&m.mac), m),
            _ => self.escape(item.discrim(), item),
        }
    }

    /// `fn{ name (params) ret body }`. A pattern that omits the return type accepts any.
    fn function(&self, sig: &syn::Signature, body: &syn::Block) -> Node {
        let params = sig
            .inputs
            .iter()
            .map(|arg| match arg {
                syn::FnArg::Receiver(r) => self.at(Node::ident("self"), r),
                syn::FnArg::Typed(t) => self.at(
                    Node::op("param", vec![self.pat(&t.pat), self.escape("Type", &t.ty)]),
                    t,
                ),
            })
            .collect();
        let ret = match &sig.output {
            syn::ReturnType::Type(_, ty) => self.escape("Type", ty),
            syn::ReturnType::Default if self.pattern => Node::ellipsis(),
            syn::ReturnType::Default => Node::escape("Type", "()"),
        };
        Node::op(
            "fn",
            vec![
                self.ident(&sig.ident),
                Node::container(ContainerKind::Tuple, params),
                ret,
                self.block(body),
            ],
        )
    }

    #[allow(unreachable_patterns)]
    fn use_tree(&self, tree: &syn::UseTree) -> Node {
        use syn::UseTree;
        let node = match tree {
            UseTree::Name(x) => return self.ident(&x.ident),
            UseTree::Path(x) => {
                Node::op("use_path", vec![self.ident(&x.ident), self.use_tree(&x.tree)])
            }
            UseTree::Rename(x) => {
                Node::op("use_rename", vec![self.ident(&x.ident), self.ident(&x.rename)])
            }
            UseTree::Glob(_) => Node::ident("*"),
            UseTree::Group(x) => {
                Node::variadic("use_group", x.items.iter().map(|t| self.use_tree(t)).collect())
            }
            _ => return self.escape("UseTree", tree),
        };
        self.at(node, tree)
    }
}
