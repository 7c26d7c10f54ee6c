//! Hygiene: scans the host crate's production sources for banned patterns.
//!
//! The session and writer run for as long as a board is open; a panic there
//! drops queued writes, and a swallowed error hides a failed save.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

struct Rule {
    pattern: &'static str,
    budget: usize,
    why: &'static str,
}

const RULES: &[Rule] = &[
    Rule { pattern: ".unwrap()", budget: 0, why: "panics" },
    Rule { pattern: ".expect(", budget: 0, why: "panics" },
    Rule { pattern: "panic!(", budget: 0, why: "panics" },
    Rule { pattern: "unreachable!(", budget: 0, why: "panics" },
    Rule { pattern: "todo!(", budget: 0, why: "unfinished stub" },
    Rule { pattern: "unimplemented!(", budget: 0, why: "unfinished stub" },
    Rule { pattern: "let _ =", budget: 0, why: "discards a result unseen" },
    Rule { pattern: ".ok()", budget: 0, why: "discards an error unseen" },
    Rule { pattern: "#[allow(dead_code)]", budget: 0, why: "hides unused code" },
];

/// Production `.rs` files under `src/`, skipping sibling `_test.rs` modules.
fn production_sources(dir: &Path, out: &mut Vec<(String, String)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            production_sources(&path, out);
            continue;
        }
        let name = path.to_string_lossy().to_string();
        if path.extension().is_some_and(|e| e == "rs") && !name.ends_with("_test.rs") {
            if let Ok(content) = fs::read_to_string(&path) {
                out.push((name, content));
            }
        }
    }
}

#[test]
fn banned_patterns_within_budget() {
    let mut files = Vec::new();
    production_sources(Path::new("src"), &mut files);
    assert!(!files.is_empty(), "no sources found; run from the crate root");

    let mut failures = Vec::new();
    for rule in RULES {
        let hits: Vec<String> = files
            .iter()
            .filter_map(|(path, content)| {
                let count = content.lines().filter(|line| line.contains(rule.pattern)).count();
                (count > 0).then(|| format!("    {path}: {count}"))
            })
            .collect();
        let total: usize = files
            .iter()
            .map(|(_, content)| content.lines().filter(|line| line.contains(rule.pattern)).count())
            .sum();
        if total > rule.budget {
            failures.push(format!(
                "  `{}` ({}): found {total}, budget {}\n{}",
                rule.pattern,
                rule.why,
                rule.budget,
                hits.join("\n")
            ));
        }
    }

    assert!(failures.is_empty(), "hygiene budget exceeded:\n{}", failures.join("\n"));
}
