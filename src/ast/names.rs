/// Variant names, used as the tag of escape nodes.
pub(crate) trait Discrim {
    fn discrim(&self) -> &'static str;
}

impl Discrim for syn::Expr {
    fn discrim(&self) -> &'static str {
        use syn::Expr::*;
        match self {
            Array(..) => "Array",
            Assign(..) => "Assign",
            Async(..) => "Async",
            Await(..) => "Await",
            Binary(..) => "Binary",
            Block(..) => "Block",
            Break(..) => "Break",
            Call(..) => "Call",
            Cast(..) => "Cast",
            Closure(..) => "Closure",
            Const(..) => "Const",
            Continue(..) => "Continue",
            Field(..) => "Field",
            ForLoop(..) => "ForLoop",
            Group(..) => "Group",
            If(..) => "If",
            Index(..) => "Index",
            Infer(..) => "Infer",
            Let(..) => "Let",
            Lit(..) => "Lit",
            Loop(..) => "Loop",
            Macro(..) => "Macro",
            Match(..) => "Match",
            MethodCall(..) => "MethodCall",
            Paren(..) => "Paren",
            Path(..) => "Path",
            Range(..) => "Range",
            Reference(..) => "Reference",
            Repeat(..) => "Repeat",
            Return(..) => "Return",
            Struct(..) => "Struct",
            Try(..) => "Try",
            TryBlock(..) => "TryBlock",
            Tuple(..) => "Tuple",
            Unary(..) => "Unary",
            Unsafe(..) => "Unsafe",
            Verbatim(..) => "Verbatim",
            While(..) => "While",
            Yield(..) => "Yield",
            _ => "Expr",
        }
    }
}

impl Discrim for syn::Pat {
    fn discrim(&self) -> &'static str {
        use syn::Pat::*;
        match self {
            Const(..) => "Const",
            Ident(..) => "Ident",
            Lit(..) => "Lit",
            Macro(..) => "Macro",
            Or(..) => "Or",
            Paren(..) => "Paren",
            Path(..) => "Path",
            Range(..) => "Range",
            Reference(..) => "Reference",
            Rest(..) => "Rest",
            Slice(..) => "Slice",
            Struct(..) => "Struct",
            Tuple(..) => "Tuple",
            TupleStruct(..) => "TupleStruct",
            Type(..) => "Type",
            Verbatim(..) => "Verbatim",
            Wild(..) => "Wild",
            _ => "Pat",
        }
    }
}

impl Discrim for syn::Item {
    fn discrim(&self) -> &'static str {
        use syn::Item::*;
        match self {
            Const(..) => "Const",
            Enum(..) => "Enum",
            ExternCrate(..) => "ExternCrate",
            Fn(..) => "Fn",
            ForeignMod(..) => "ForeignMod",
            Impl(..) => "Impl",
            Macro(..) => "Macro",
            Mod(..) => "Mod",
            Static(..) => "Static",
            Struct(..) => "Struct",
            Trait(..) => "Trait",
            TraitAlias(..) => "TraitAlias",
            Type(..) => "Type",
            Union(..) => "Union",
            Use(..) => "Use",
            Verbatim(..) => "Verbatim",
            _ => "Item",
        }
    }
}

impl Discrim for syn::ImplItem {
    fn discrim(&self) -> &'static str {
        use syn::ImplItem::*;
        match self {
            Const(..) => "Const",
            Fn(..) => "Fn",
            Type(..) => "Type",
            Macro(..) => "Macro",
            Verbatim(..) => "Verbatim",
            _ => "ImplItem",
        }
    }
}
