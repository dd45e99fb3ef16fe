use log::*;

use genmatch::{Formula, MatchConfig, PatternCache, Rule, RuleConfig, Scanner, Target};

fn main() {
    env_logger::init();

    use std::env;
    use std::fs;
    use std::process;

    let mut args = env::args();
    let _ = args.next(); // executable name
    let pattern = match args.next() {
        Some(pattern) => pattern,
        None => {
            error!("Usage: scan '<pattern>' file.rs...");
            process::exit(1);
        }
    };
    let paths: Vec<String> = args.collect();

    let cache = PatternCache::new();
    let compiled = match cache.get_or_compile(&pattern, "rust") {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    trace!("debug_tree_repr: {}", compiled.debug_tree_repr());
    trace!("debug_flat_repr:\n{}", compiled.debug_flat_repr());
    let rule = match Rule::new(
        "cli",
        "rust",
        "matched",
        Formula::Pattern(compiled),
        RuleConfig::default(),
    ) {
        Ok(rule) => rule,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let mut targets = Vec::new();
    for path in paths {
        let src = match fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                warn!("{}: {}", path, e);
                continue;
            }
        };
        match genmatch::parse(&src, "rust") {
            Ok(tree) => targets.push(Target::new(path, tree)),
            Err(e) => warn!("{}: {}", path, e),
        }
    }

    let scanner = Scanner::new(MatchConfig::default());
    for report in scanner.scan(&targets, &[rule]) {
        for finding in &report.findings {
            let bindings: Vec<String> = finding
                .bindings
                .iter()
                .map(|b| format!("{} = {}", b.name, b.snippet))
                .collect();
            println!(
                "{}:{}: {}",
                finding.path.display(),
                finding.span,
                bindings.join(", ")
            );
        }
        for diagnostic in &report.diagnostics {
            warn!("{}: {}", report.path.display(), diagnostic);
        }
    }
}
