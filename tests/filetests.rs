//! Runs every `.pcode` file under `tests/filetests` as a FileCheck-style test.

use jitir::pcode::{TestRunner, TestSpec};
use std::fs;
use std::path::{Path, PathBuf};

/// Discovers all .pcode files in a directory recursively
fn discover_pcode_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(discover_pcode_files(&path));
            } else if path.extension().and_then(|s| s.to_str()) == Some("pcode") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn run_file(runner: &TestRunner, path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let spec = TestSpec::parse(&content)?;
    runner.run_test(&spec)
}

#[test]
fn test_all_filetests() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/filetests");
    let files = discover_pcode_files(&dir);
    assert!(!files.is_empty(), "no filetests under {}", dir.display());

    let runner = TestRunner::new(false);
    let mut failures = Vec::new();
    for path in &files {
        if let Err(e) = run_file(&runner, path) {
            failures.push(format!("{}: {}", path.display(), e));
        }
    }

    println!("{} of {} filetests passed", files.len() - failures.len(), files.len());
    assert!(failures.is_empty(), "failed filetests:\n{}", failures.join("\n"));
}

#[test]
fn test_missing_run_directive() {
    let spec = TestSpec::parse("unit a {\n}\n").unwrap();
    let err = TestRunner::new(false).run_test(&spec).unwrap_err();
    assert!(err.contains("RUN"));
}
