//! Locating the benchmark project and the tests it ships.

use crate::config::DEFAULT_TESTS;
use std::path::{Path, PathBuf};

/// Find the benchmark project root starting from `start`.
///
/// Steps out of a `tui/` directory, otherwise looks for `package.json` in
/// `start` and then its parent. Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    if start.file_name().is_some_and(|name| name == "tui") {
        if let Some(parent) = start.parent() {
            return parent.to_path_buf();
        }
    }
    if start.join("package.json").is_file() {
        return start.to_path_buf();
    }
    if let Some(parent) = start.parent() {
        if parent.join("package.json").is_file() {
            return parent.to_path_buf();
        }
    }
    start.to_path_buf()
}

/// Test names under `<root>/src/tests`, sorted. Empty when the directory
/// does not exist.
pub fn discover_tests(root: &Path) -> std::io::Result<Vec<String>> {
    let dir = root.join("src").join("tests");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut tests = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            tests.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    tests.sort();
    Ok(tests)
}

/// Configured tests if any, else discovered ones, else the built-in list.
pub fn resolve_tests(configured: &[String], root: &Path) -> Vec<String> {
    if !configured.is_empty() {
        return configured.to_vec();
    }
    match discover_tests(root) {
        Ok(found) if !found.is_empty() => found,
        Ok(_) => default_tests(),
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "test discovery failed");
            default_tests()
        }
    }
}

pub fn default_tests() -> Vec<String> {
    DEFAULT_TESTS.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn root_steps_out_of_tui_dir() {
        let dir = tempdir().unwrap();
        let tui = dir.path().join("tui");
        fs::create_dir_all(&tui).unwrap();
        assert_eq!(find_project_root(&tui), dir.path());
    }

    #[test]
    fn root_prefers_package_json() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("scripts");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        assert_eq!(find_project_root(dir.path()), dir.path());
        assert_eq!(find_project_root(&nested), dir.path());
    }

    #[test]
    fn discovers_only_directories() {
        let dir = tempdir().unwrap();
        let tests = dir.path().join("src/tests");
        for name in ["props", "counter", "each"] {
            fs::create_dir_all(tests.join(name)).unwrap();
        }
        fs::write(tests.join("README.md"), "notes").unwrap();

        assert_eq!(
            discover_tests(dir.path()).unwrap(),
            vec!["counter", "each", "props"]
        );
    }

    #[test]
    fn resolve_falls_back_to_builtin_list() {
        let dir = tempdir().unwrap();
        assert_eq!(resolve_tests(&[], dir.path()), default_tests());
        assert_eq!(
            resolve_tests(&["only".to_string()], dir.path()),
            vec!["only".to_string()]
        );
    }
}
