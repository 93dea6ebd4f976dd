//! Hygiene: source-tree budgets checked at test time.
//!
//! Scans the library sources (excluding `*_test.rs`) for constructs the
//! runtime must not contain. Budgets only ever go down.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

struct Budget {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

const BUDGETS: &[Budget] = &[
    // Panics: a panic inside a stage would abort the rest of the frame.
    Budget { pattern: ".unwrap()", max: 0, why: "panics" },
    Budget { pattern: ".expect(", max: 0, why: "panics" },
    Budget { pattern: "panic!(", max: 0, why: "panics" },
    Budget { pattern: "unreachable!(", max: 0, why: "panics" },
    Budget { pattern: "todo!(", max: 0, why: "stub" },
    Budget { pattern: "unimplemented!(", max: 0, why: "stub" },
    // Silent loss.
    Budget { pattern: "let _ =", max: 0, why: "discards a value unseen" },
    Budget { pattern: ".ok()", max: 0, why: "discards an error unseen" },
    // Single logical thread; logging goes through tracing.
    Budget { pattern: "std::thread", max: 0, why: "runtime is single-threaded" },
    Budget { pattern: "Mutex<", max: 0, why: "runtime is single-threaded" },
    Budget { pattern: "println!(", max: 0, why: "use tracing" },
    Budget { pattern: "eprintln!(", max: 0, why: "use tracing" },
    Budget { pattern: "#[allow(dead_code)]", max: 0, why: "delete it instead" },
];

struct SourceFile {
    path: String,
    content: String,
}

fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if !path_str.ends_with(".rs") || path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .map(|file| (file.path.clone(), file.content.lines().filter(|line| line.contains(pattern)).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[test]
fn sources_are_found() {
    let files = source_files();
    assert!(files.iter().any(|f| f.path.ends_with("scheduler.rs")), "run from the crate root");
}

#[test]
fn every_budget_holds() {
    let files = source_files();
    let mut failures = Vec::new();
    for budget in BUDGETS {
        let found = hits(&files, budget.pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        if count > budget.max {
            let detail: Vec<String> = found.iter().map(|(path, c)| format!("    {path}: {c}")).collect();
            failures.push(format!(
                "{} ({}): found {count}, max {}\n{}",
                budget.pattern,
                budget.why,
                budget.max,
                detail.join("\n")
            ));
        }
    }
    assert!(failures.is_empty(), "hygiene budgets exceeded:\n{}", failures.join("\n"));
}

#[test]
fn every_module_has_a_test_file() {
    let files = source_files();
    let untested: Vec<&str> = files
        .iter()
        .map(|f| f.path.as_str())
        .filter(|path| !path.ends_with("lib.rs") && !path.ends_with("consts.rs") && !path.ends_with("error.rs"))
        .filter(|path| !Path::new(&path.replace(".rs", "_test.rs")).exists())
        .collect();
    assert!(untested.is_empty(), "modules without a sibling _test.rs: {untested:?}");
}
