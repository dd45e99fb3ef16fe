use std::sync::Arc;

use genmatch::{
    compile, parse, Bound, ContainerKind, DiagnosticKind, EquivalenceTable, Formula, LitKind,
    MatchConfig, Node, Pattern, PatternCache, PatternKind, Rule, RuleConfig, Scanner, Severity,
    Target, Tree, Unordered,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn target(path: &str, source: &str) -> Target {
    Target::new(path, parse(source, "rust").unwrap())
}

fn rule(id: &str, formula: Formula) -> Rule {
    Rule::new(id, "rust", format!("{} matched", id), formula, RuleConfig::default()).unwrap()
}

fn pattern(text: &str) -> Formula {
    Formula::pattern(compile(text, "rust").unwrap())
}

#[test]
fn ellipsis_matches_any_number_of_arguments() {
    init();
    let p = compile("f(...)", "rust").unwrap();
    for src in &["f()", "f(1)", "f(1, 2, 3)"] {
        let tree = parse(&format!("fn main() {{ {}; }}", src), "rust").unwrap();
        assert_eq!(p.find(&tree).len(), 1, "{}", src);
    }
    let tree = parse("fn main() { g(1); }", "rust").unwrap();
    assert!(p.find(&tree).is_empty());
}

#[test]
fn metavariable_consistency() {
    init();
    let p = compile("$X == $X", "rust").unwrap();
    let same = parse("fn t(a: u8) -> bool { a == a }", "rust").unwrap();
    let diff = parse("fn t(a: u8, b: u8) -> bool { a == b }", "rust").unwrap();
    let found = p.find(&same);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].env.len(), 1);
    assert!(p.find(&diff).is_empty());
}

#[test]
fn unbound_metavariable_capture() {
    init();
    let src = "fn t(y: u32) -> u32 { y + 1 }";
    let report = Scanner::default().scan_file(&target("t.rs", src), &[rule("plus-one", pattern("$X + 1"))]);
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.bindings.len(), 1);
    let x = finding.binding("$X").unwrap();
    assert_eq!(x.snippet, "y");
    assert_eq!(x.span.unwrap().start.line, 1);
    assert_eq!(finding.severity, Severity::Warning);
}

fn kwarg(name: &str, value: &str) -> Node {
    Node::op("kwarg", vec![Node::ident(name), Node::literal(LitKind::Int, value)])
}

fn call(args: Vec<Node>) -> Node {
    let mut xs = vec![Node::ident("f")];
    xs.extend(args);
    Node::variadic("call", xs)
}

#[test]
fn unordered_keyword_arguments() {
    init();
    let pat = call(vec![kwarg("a", "1"), kwarg("b", "2")]);
    let tree = Tree::from_root("py", Node::seq(vec![call(vec![kwarg("b", "2"), kwarg("a", "1")])]));
    let unordered = EquivalenceTable::new().unordered("call", Unordered::after(1).only("kwarg"));
    let p = Pattern::new("py", "f(a=1, b=2)", PatternKind::Expr, pat.clone(), Arc::new(unordered)).unwrap();
    assert_eq!(p.find(&tree).len(), 1);
    let ordered = Pattern::new("py", "f(a=1, b=2)", PatternKind::Expr, pat, Arc::default()).unwrap();
    assert!(ordered.find(&tree).is_empty());
}

#[test]
fn and_not_suppresses() {
    init();
    let formula = || {
        Formula::And(vec![
            pattern("unsafe { ... }"),
            Formula::not(pattern("audited()")),
        ])
    };
    let clean = "fn a() { unsafe { danger(); } }";
    let audited = "fn a() { unsafe { audited(); danger(); } }";
    let scanner = Scanner::default();
    let rules = [rule("unsafe-block", formula())];
    let reports = scanner.scan(&[target("clean.rs", clean), target("audited.rs", audited)], &rules);
    assert_eq!(reports[0].findings.len(), 1);
    assert!(reports[1].findings.is_empty());
}

#[test]
fn and_joins_on_shared_metavariables() {
    init();
    let formula = Formula::And(vec![pattern("g($A, $_)"), pattern("g($_, $A)")]);
    let src = "fn a() { g(x, x); g(x, y); }";
    let report = Scanner::default().scan_file(&target("g.rs", src), &[rule("same-args", formula)]);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].binding("$A").unwrap().snippet, "x");
    assert_eq!(report.findings[0].span.start.column, 9);
}

#[test]
fn unordered_set_literals() {
    init();
    let set = |xs: &[&str]| Node::container(ContainerKind::Set, xs.iter().map(|x| Node::ident(*x)).collect());
    let tree = Tree::from_root("py", Node::seq(vec![set(&["b", "a"])]));
    let table = Arc::new(EquivalenceTable::new().unordered("set", Unordered::all()));
    let p = Pattern::new("py", "{a, b}", PatternKind::Expr, set(&["a", "b"]), table).unwrap();
    assert_eq!(p.find(&tree).len(), 1);
}

#[test]
fn many_findings_in_one_file() {
    init();
    let calls: String = (0..5_000).map(|i| format!("    f({});\n", i % 7)).collect();
    let src = format!("fn main() {{\n{}}}\n", calls);
    let report = Scanner::default().scan_file(&target("big.rs", &src), &[rule("calls", pattern("f($X)"))]);
    assert_eq!(report.findings.len(), 5_000);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn inside_and_not_inside() {
    init();
    let src = "fn a() { loop { step(); } step(); }";
    let t = target("a.rs", src);
    let inside = rule("in-loop", Formula::inside(pattern("step()"), pattern("loop { ... }")));
    let outside = rule("outside", Formula::not_inside(pattern("step()"), pattern("loop { ... }")));
    let report = Scanner::default().scan_file(&t, &[inside, outside]);
    let ids: Vec<_> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["in-loop", "outside"]);
    assert!(report.findings[0].span.start < report.findings[1].span.start);
}

#[test]
fn timeout_is_contained() {
    init();
    let args: Vec<String> = (0..60).map(|_| "a".to_owned()).collect();
    let src = format!("fn main() {{ f({}); g(1); }}", args.join(", "));
    let explosive = Rule::new(
        "explosive",
        "rust",
        "",
        pattern("f(..., a, ..., a, ..., a, ..., b)"),
        RuleConfig {
            max_steps: Some(1_000),
            ..RuleConfig::default()
        },
    )
    .unwrap();
    let sibling = rule("sibling", pattern("g($X)"));
    let report = Scanner::default().scan_file(&target("m.rs", &src), &[explosive, sibling]);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].rule_id, "sibling");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].rule_id, "explosive");
    assert!(matches!(report.diagnostics[0].kind, DiagnosticKind::Timeout(_)));
}

#[test]
fn matching_is_deterministic() {
    init();
    let src = "fn a() { f(1, 2, 3); f(4); let x = f(f(5)); }";
    let tree = parse(src, "rust").unwrap();
    let p = compile("f(..., $X, ...)", "rust").unwrap();
    let render = |tree: &Tree| -> Vec<String> {
        p.find(tree)
            .iter()
            .map(|m| match m.env.get("$X") {
                Some(Bound::Node(n)) => tree.node_text(n).into_owned(),
                _ => String::new(),
            })
            .collect()
    };
    let first = render(&tree);
    assert_eq!(first, vec!["1", "2", "3", "4", "f(5)", "5"]);
    assert_eq!(render(&tree), first);
}

#[test]
fn match_limit_truncates() {
    init();
    let src = "fn a() { f(1); f(2); f(3); }";
    let limited = Rule::new(
        "limited",
        "rust",
        "call with $X",
        pattern("f($X)"),
        RuleConfig {
            max_match_count: 2,
            ..RuleConfig::default()
        },
    )
    .unwrap();
    let report = Scanner::default().scan_file(&target("a.rs", src), &[limited]);
    assert_eq!(report.findings.len(), 2);
    assert_eq!(report.findings[1].message, "call with 2");
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::MatchLimit { limit: 2 });
}

#[test]
fn rules_for_other_languages_are_skipped() {
    init();
    let foreign = Rule::new(
        "py-rule",
        "py",
        "",
        Formula::Or(vec![]),
        RuleConfig::default(),
    )
    .unwrap();
    let report = Scanner::new(MatchConfig::default()).scan_file(&target("a.rs", "fn a() {}"), &[foreign]);
    assert!(report.findings.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[test]
fn cached_patterns_build_rules() {
    init();
    let cache = PatternCache::new();
    let p = cache.get_or_compile("drop($X)", "rust").unwrap();
    let r = Rule::new("drop", "rust", "", Formula::Pattern(p), RuleConfig::default()).unwrap();
    let report = Scanner::default().scan_file(&target("a.rs", "fn a(v: Vec<u8>) { drop(v); }"), &[r]);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn configs_deserialize_with_defaults() {
    let config: RuleConfig =
        serde_json::from_str(r#"{"timeout_seconds": 0.5, "severity": "error"}"#).unwrap();
    assert_eq!(config.timeout_seconds, 0.5);
    assert_eq!(config.severity, Severity::Error);
    assert_eq!(config.max_match_count, 0);
    assert_eq!(config.max_steps, None);
    let config: MatchConfig = serde_json::from_str(r#"{"enumerate_permutations": true}"#).unwrap();
    assert_eq!(config.max_permutations, 120);
    assert!(config.enumerate_permutations);
}
