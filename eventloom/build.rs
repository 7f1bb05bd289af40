// Fails the build when an eventloom source file suppresses a lint locally.
// Lint levels are set once for the workspace in the root Cargo.toml.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const SCANNED: [&str; 2] = ["src", "tests"];
const FORBIDDEN: [&str; 2] = ["#[allow", "#![allow"];

struct Violation {
    file: PathBuf,
    line: usize,
    text: String,
}

fn main() {
    println!("cargo:rerun-if-env-changed=CHECK_NO_ALLOW");
    for dir in SCANNED {
        println!("cargo:rerun-if-changed={dir}");
    }

    // CHECK_NO_ALLOW=0 skips the scan.
    if env::var("CHECK_NO_ALLOW").is_ok_and(|v| v == "0") {
        return;
    }

    let root = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR"));
    let mut violations = Vec::new();
    for dir in SCANNED {
        collect(&root.join(dir), &mut violations);
    }

    if violations.is_empty() {
        return;
    }

    eprintln!("ERROR: lint suppression attributes found in eventloom:");
    for violation in &violations {
        eprintln!(
            "  {}:{}: {}",
            violation.file.display(),
            violation.line,
            violation.text.trim()
        );
    }
    panic!("{} lint suppression attribute(s) found", violations.len());
}

fn collect(path: &Path, violations: &mut Vec<Violation>) {
    if path.is_dir() {
        let Ok(entries) = fs::read_dir(path) else {
            return;
        };
        for entry in entries.flatten() {
            collect(&entry.path(), violations);
        }
        return;
    }

    if path.extension().map_or(true, |ext| ext != "rs") {
        return;
    }

    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    violations.extend(
        content
            .lines()
            .enumerate()
            .filter(|(_, text)| FORBIDDEN.iter().any(|pattern| text.contains(pattern)))
            .map(|(idx, text)| Violation {
                file: path.to_path_buf(),
                line: idx + 1,
                text: text.to_string(),
            }),
    );
}
