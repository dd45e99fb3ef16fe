//! The Rust frontend, on `syn`

mod lower;
mod names;

use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use syn::parse::Parser;

use self::lower::Lower;
use crate::equiv::{EquivalenceTable, Unordered};
use crate::pattern::{Pattern, PatternKind};
use crate::tree::{Node, Tree};
use crate::{tokens, Frontend, ParseError, PatternSyntaxError};

const LANGUAGE: &str = "rust";

static EQUIVALENCES: Lazy<Arc<EquivalenceTable>> = Lazy::new(|| {
    Arc::new(
        EquivalenceTable::new()
            .unordered("struct_fields", Unordered::all().only("field_value"))
            .unordered("pat_struct_fields", Unordered::all().only("field_pat"))
            .unordered("use_group", Unordered::all()),
    )
});

/// Empty this thread's source map. Lowered nodes hold plain positions; no `proc_macro2` span may
/// be used after this.
fn release_spans() {
    proc_macro2::extra::invalidate_current_thread_spans();
}

fn lower_pattern(text: &str) -> Result<(PatternKind, Node), PatternSyntaxError> {
    let tokens = tokens::lex(text).map_err(syntax_error)?;
    let stmts = syn::Block::parse_within
        .parse2(tokens)
        .map_err(|e| syntax_error(e.to_string()))?;
    let lower = Lower::pattern();
    Ok(match &stmts[..] {
        [syn::Stmt::Expr(e, None)] => (PatternKind::Expr, lower.expr(e)),
        _ => (PatternKind::StmtSeq, Node::seq(lower.stmts(&stmts))),
    })
}

/// Rust source and Rust-syntax patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rust;

fn syntax_error(message: String) -> PatternSyntaxError {
    PatternSyntaxError {
        language: LANGUAGE.to_owned(),
        message,
    }
}

impl Frontend for Rust {
    fn language(&self) -> &'static str {
        LANGUAGE
    }

    fn parse(&self, source: &str) -> Result<Tree, ParseError> {
        // spans are computed past the BOM, so snippets must be taken past it too
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let root = match syn::parse_file(source) {
            Ok(file) => Ok(Lower::code().file(&file)),
            Err(e) => {
                let start = e.span().start();
                Err(ParseError {
                    language: LANGUAGE.to_owned(),
                    message: e.to_string(),
                    line: start.line,
                    column: start.column,
                })
            }
        };
        release_spans();
        let root = root?;
        debug!("parsed {} items", root.children().len());
        Ok(Tree::new(LANGUAGE, source, root))
    }

    /// A single expression without a trailing `;` compiles to an expression pattern;
    /// anything else is a statement sequence.
    fn compile_pattern(&self, text: &str) -> Result<Pattern, PatternSyntaxError> {
        let lowered = lower_pattern(text);
        release_spans();
        let (kind, root) = lowered?;
        Pattern::new(LANGUAGE, text, kind, root, self.equivalences())
    }

    fn equivalences(&self) -> Arc<EquivalenceTable> {
        Arc::clone(&EQUIVALENCES)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::Bound;
    use crate::repr;

    fn flat(pattern: &str) -> String {
        Rust.compile_pattern(pattern).unwrap().debug_flat_repr()
    }

    fn count(pattern: &str, source: &str) -> usize {
        let tree = Rust.parse(source).unwrap();
        Rust.compile_pattern(pattern).unwrap().find(&tree).len()
    }

    #[test]
    fn pattern_kinds() {
        assert_eq!(Rust.compile_pattern("f($X)").unwrap().kind(), PatternKind::Expr);
        assert_eq!(Rust.compile_pattern("f($X);").unwrap().kind(), PatternKind::StmtSeq);
        assert_eq!(Rust.compile_pattern("let $X = 1; g($X)").unwrap().kind(), PatternKind::StmtSeq);
    }

    #[test]
    fn lowering() {
        assert_eq!(flat("$X + 1"), "binary:+{ $X 1 }");
        assert_eq!(flat("(($X))"), "$X");
        assert_eq!(flat("f(...)"), "call{ f ... }");
        assert_eq!(flat("$O.$M($_)"), "method_call{ $O $M $_ }");
        assert_eq!(flat("println!(\"{}\", $...A)"), "macro{ println \"{}\" $...A }");
        assert_eq!(flat("x as u8"), "cast{ x Type{ \"u8\" } }");
        assert_eq!(flat("std::mem::swap"), "path{ std mem swap }");
    }

    #[test]
    fn lone_ellipsis() {
        assert!(Rust.compile_pattern("...").is_err());
        assert!(Rust.compile_pattern("...; ...").is_err());
        assert!(Rust.compile_pattern("$").is_err());
        assert!(Rust.compile_pattern("f(").is_err());
    }

    #[test]
    fn parse_errors_carry_a_location() {
        let err = Rust.parse("fn main() {\n    let = ;\n}\n").unwrap_err();
        assert_eq!(err.language, "rust");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn spans_and_snippets() {
        let src = "fn main() {\n    let y = 2;\n    let z = y + 1;\n}\n";
        let tree = Rust.parse(src).unwrap();
        let pattern = Rust.compile_pattern("$X + 1").unwrap();
        let found = pattern.find(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(tree.snippet(found[0].span), Some("y + 1"));
        match found[0].env.get("$X") {
            Some(Bound::Node(n)) => {
                assert_eq!(repr::flat(n), "y");
                assert_eq!(n.span.start.line, 3);
                assert_eq!(n.span.start.column, 12);
            }
            _ => panic!("$X unbound"),
        }
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let src = "\u{feff}fn main() { f(1); }\n";
        let tree = Rust.parse(src).unwrap();
        let found = Rust.compile_pattern("f($X)").unwrap().find(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(tree.snippet(found[0].span), Some("f(1)"));
    }

    #[test]
    fn positions_survive_repeated_parses() {
        let big: String = (0..200).map(|i| format!("fn f{}() {{ g({}); }}\n", i, i)).collect();
        for _ in 0..3 {
            assert!(Rust.parse(&big).is_ok());
            Rust.compile_pattern("g($X)").unwrap();
        }
        assert!(Rust.parse("fn broken( {").is_err());
        let src = "fn a() {}\nfn b() {\n    h(7);\n}\n";
        let tree = Rust.parse(src).unwrap();
        let found = Rust.compile_pattern("h($X)").unwrap().find(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.start, crate::tree::Position::new(3, 4));
        assert_eq!(tree.snippet(found[0].span), Some("h(7)"));
    }

    #[test]
    fn semicolons_and_parens_are_insignificant() {
        assert_eq!(count("f((1))", "fn a() { f(1); }"), 1);
        assert_eq!(count("f(1);", "fn a() { f(1) }"), 1);
    }

    #[test]
    fn statement_sequences() {
        let src = "fn a() {\n    let x = open();\n    use_it(x);\n    close(x);\n}\n";
        assert_eq!(count("let $F = open(); ... close($F);", src), 1);
        assert_eq!(count("let $F = open(); close($G); ...", src), 0);
        assert_eq!(count("let $F = open(); ... close($F);", "fn a() { let x = open(); }"), 0);
    }

    #[test]
    fn function_patterns() {
        let src = "fn helper(a: u8) -> u8 { a }\nfn other() {}\n";
        assert_eq!(count("fn $F(a: u8) { ... }", src), 1);
        assert_eq!(count("fn other() { ... }", src), 1);
    }

    #[test]
    fn struct_fields_are_unordered() {
        let src = "fn a() { let p = Point { x: 1, y: 2 }; }";
        assert_eq!(count("Point { y: 2, x: 1 }", src), 1);
        assert_eq!(count("Point { y: $Y, ... }", src), 1);
        assert_eq!(count("Point { x: 2, ... }", src), 0);
    }

    #[test]
    fn use_groups_are_unordered() {
        let src = "use std::{fs, io};\n";
        assert_eq!(count("use std::{io, fs};", src), 1);
    }

    #[test]
    fn macros() {
        let src = "fn a() { let v = vec![1, 2, 3]; println!(\"{}\", v.len()); }";
        assert_eq!(count("vec![...]", src), 1);
        assert_eq!(count("println!(\"{}\", $X.len())", src), 1);
        assert_eq!(count("println!($...ARGS)", src), 1);
    }
}
