//! Structural tests for layer boundaries.
//!
//! These scan source files: domain stays pure, application depends only on
//! domain and its own ports, and process spawning stays in infra.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Non-comment lines outside `#[cfg(test)]` modules.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut test_depth: Option<i32> = None;
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") && test_depth.is_none() {
            test_depth = Some(depth);
        }
        let skip = test_depth.is_some() || trimmed.starts_with("//");
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if test_depth.is_some_and(|d| depth <= d) {
                        test_depth = None;
                    }
                }
                _ => {}
            }
        }
        if !skip {
            out.push((i + 1, line.to_string()));
        }
    }
    out
}

fn violations(dir: &str, forbidden: &[&str]) -> Vec<String> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(dir);
    let mut found = Vec::new();
    for file in collect_rs_files(&root) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (lineno, line) in production_lines(&file) {
            if let Some(pattern) = forbidden.iter().find(|p| line.contains(*p)) {
                found.push(format!("{rel}:{lineno}: `{pattern}` in: {}", line.trim()));
            }
        }
    }
    found
}

#[test]
fn domain_has_no_io_or_outer_layers() {
    let found = violations(
        "domain",
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs::",
            "std::process::Command",
        ],
    );
    assert!(found.is_empty(), "domain must stay pure:\n{}", found.join("\n"));
}

#[test]
fn application_does_not_reach_into_infra_or_presentation() {
    let found = violations(
        "application",
        &["crate::infra", "crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        found.is_empty(),
        "application must depend on ports only:\n{}",
        found.join("\n")
    );
}

#[test]
fn processes_are_spawned_only_in_infra() {
    let mut found = Vec::new();
    for dir in ["domain", "application", "commands", "output"] {
        found.extend(violations(
            dir,
            &["tokio::process::Command", "std::process::Command::new"],
        ));
    }
    assert!(
        found.is_empty(),
        "process spawning belongs behind CommandRunner:\n{}",
        found.join("\n")
    );
}

#[test]
fn command_runner_is_constructed_only_by_the_app_context() {
    let mut found = Vec::new();
    for dir in ["domain", "application", "commands", "output"] {
        found.extend(violations(dir, &["TokioCommandRunner::new"]));
    }
    assert!(
        found.is_empty(),
        "use AppContext::runner instead:\n{}",
        found.join("\n")
    );
}
