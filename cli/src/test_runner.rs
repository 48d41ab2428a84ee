use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::case::{self, CaseError};

const CASE_SUFFIX: &str = ".case.toml";

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description
            .as_deref()
            .or_else(|| self.path.file_name().and_then(|n| n.to_str()))
            .map(|name| name.strip_suffix(CASE_SUFFIX).unwrap_or(name))
            .unwrap_or("?")
    }
}

/// The binder a case's `bind` nodes hand out handles from, named after the file.
pub(crate) fn binder_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.strip_suffix(CASE_SUFFIX).unwrap_or(name).to_string())
        .unwrap_or_else(|| "case".to_string())
}

fn load_failure(err: &CaseError, source: &str) -> String {
    let mut reason = format!("case error: {}", err.message);
    if let Some(span) = &err.span {
        reason.push_str(&format!(" (line {})", byte_offset_to_line(source, span.start)));
    }
    for note in &err.notes {
        reason.push_str(&format!("\n  = note: {}", note));
    }
    reason
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let case = match case::parse_case(&source, &binder_name(path)) {
        Ok(case) => case,
        Err(err) => return fail(None, load_failure(&err, &source)),
    };

    let outcome = case.run();
    tracing::debug!(
        path = %path.display(),
        pattern = %case.pattern,
        matched = ?outcome.as_ref().map(|b| b.is_some()),
        "case evaluated"
    );

    match case.check(&outcome) {
        Some(reason) => fail(case.description, reason),
        None => TestResult {
            path: path.to_path_buf(),
            description: case.description,
            outcome: TestOutcome::Pass,
        },
    }
}

/// Discover `.case.toml` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_cases(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_cases(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot read directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_cases(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(CASE_SUFFIX))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given case path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", CASE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} cases)", category_label(cat), files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Select the categories to run. `requested` entries match a category or
/// any of its subfolders.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let prefix = format!("{}/", req);
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&prefix) {
                selected.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Run all `.case.toml` files under `path` (or a single file).
/// If `categories` is non-empty, only run cases in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", CASE_SUFFIX, path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };
    let single = path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &groups {
        if !single {
            eprintln!();
            eprintln!("{}", style.bold(category_label(cat)));
        }
        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSING: &str = r#"
description = "tuple capture"
subject = { tuple = [1, "two"] }
pattern = { tuple = [{ bind = "n" }, { type = "str" }] }

[expect]
bindings = { n = 1 }
"#;

    const FAILING: &str = r#"
subject = [1]
pattern = { tuple = [{ bind = "n" }] }

[expect]
bindings = { n = 1 }
"#;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn discovers_cases_by_category() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.case.toml", PASSING);
        write(dir.path(), "shapes/a.case.toml", PASSING);
        write(dir.path(), "shapes/nested/b.case.toml", PASSING);
        write(dir.path(), "shapes/notes.md", "ignored");

        let found = discover_categorized(dir.path());
        let keys: Vec<&str> = found.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["", "shapes", "shapes/nested"]);

        let selected = select_categories(&found, &["shapes".to_string()]);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn exit_code_reflects_failures() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok/pass.case.toml", PASSING);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);

        write(dir.path(), "bad/fail.case.toml", FAILING);
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
        assert_eq!(run_tests(dir.path(), true, &["ok".to_string()]), 0);
    }

    #[test]
    fn single_file_reports_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "fail.case.toml", FAILING);
        let result = run_single_test(&path);
        match &result.outcome {
            TestOutcome::Fail(reason) => assert_eq!(reason, "expected a match, got no match"),
            TestOutcome::Pass => panic!("case should fail"),
        }
        assert_eq!(result.label(), "fail");
        assert_eq!(run_tests(&path, true, &[]), 1);
    }

    #[test]
    fn load_errors_name_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "broken.case.toml",
            "subject = 1\npattern = { instance_of = \"Nope\" }\n",
        );
        match run_single_test(&path).outcome {
            TestOutcome::Fail(reason) => {
                let expected = "case error: unknown type `Nope` (line 2)";
                assert!(reason.starts_with(expected), "{}", reason);
            }
            TestOutcome::Pass => panic!("case should fail"),
        }
    }

    #[test]
    fn binder_is_named_after_the_file() {
        assert_eq!(binder_name(Path::new("cases/shapes/map_keys.case.toml")), "map_keys");
        assert_eq!(binder_name(Path::new("plain.toml")), "plain.toml");
    }

    #[test]
    fn bundled_cases_pass() {
        let cases = Path::new(env!("CARGO_MANIFEST_DIR")).join("../cases");
        assert_eq!(run_tests(&cases, true, &[]), 0);
    }

    #[test]
    fn empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
    }
}
