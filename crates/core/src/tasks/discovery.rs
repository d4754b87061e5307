//! Project file discovery.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never searched for project files: build outputs, VCS
/// metadata and package caches.
const SKIPPED_DIRS: [&str; 5] = ["bin", "obj", ".git", "node_modules", ".vs"];

/// Finds project files under `root` whose extension is in `extensions`.
///
/// Extensions are compared case-insensitively and without the leading
/// dot. The result is sorted so pickers show a stable order.
///
/// # Errors
///
/// Returns the first walk error, e.g. when `root` does not exist.
pub fn discover_project_files(
    root: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, walkdir::Error> {
    let extensions: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        if matches {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["csproj".to_string(), ".FSPROJ".to_string()]
    }

    #[test]
    fn test_discovers_projects_and_skips_build_output() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("Api/bin/Debug")).expect("Failed to create dirs");
        fs::create_dir_all(root.join("Lib")).expect("Failed to create dirs");
        fs::write(root.join("Api/Api.csproj"), "<Project/>").expect("Failed to write");
        fs::write(root.join("Api/bin/Debug/Copy.csproj"), "<Project/>").expect("Failed to write");
        fs::write(root.join("Lib/Lib.fsproj"), "<Project/>").expect("Failed to write");
        fs::write(root.join("Lib/readme.md"), "docs").expect("Failed to write");

        let found = discover_project_files(root, &exts()).expect("Failed to discover");

        assert_eq!(
            found,
            vec![root.join("Api/Api.csproj"), root.join("Lib/Lib.fsproj")]
        );
    }

    #[test]
    fn test_empty_workspace() {
        let dir = tempdir().expect("Failed to create temp dir");
        let found = discover_project_files(dir.path(), &exts()).expect("Failed to discover");
        assert!(found.is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = discover_project_files(&dir.path().join("missing"), &exts());
        assert!(result.is_err());
    }
}
