//! Lookup of well-known files in a working copy

use crate::Result;
use std::path::{Path, PathBuf};

/// Basenames of files holding the full text of the license
pub const FILES_LICENSE: &[&str] = &["LICENSE", "COPYING"];

/// Basenames of files holding the description of the repository
pub const FILES_DESCRIPTION: &[&str] = &["README"];

/// File extensions accepted for license and description texts, highest
/// priority first. The empty extension matches files without one.
pub const FILE_EXTENSIONS: &[&str] = &[
    ".markdown",
    ".mdown",
    ".mkdn",
    ".md",
    ".textile",
    ".rdoc",
    ".org",
    ".creole",
    ".mediawiki",
    ".wiki",
    ".rst",
    ".asciidoc",
    ".adoc",
    ".asc",
    ".pod",
    ".txt",
    "",
];

/// Find a regular file directly inside `dir` named `<basename><extension>`
///
/// Names are compared case-insensitively. Extensions are tried in the given
/// order, and for each extension the basenames in theirs, so the extension
/// priority decides between e.g. `readme.md` and `README.txt`.
///
/// Symbolic links are not followed, so a link in the working copy never
/// exposes a file outside of it.
pub fn find_file(dir: &Path, basenames: &[&str], extensions: &[&str]) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            candidates.push((name.to_lowercase(), entry.path()));
        }
    }
    // read_dir order is unspecified; keep ties between case variants stable
    candidates.sort();

    for extension in extensions {
        for basename in basenames {
            let wanted = format!("{}{}", basename, extension).to_lowercase();
            if let Some((_, path)) = candidates.iter().find(|(name, _)| *name == wanted) {
                return Ok(Some(path.clone()));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "text").unwrap();
    }

    #[test]
    fn test_extension_priority_wins_over_case() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.txt");
        touch(dir.path(), "README.md");

        let found = find_file(dir.path(), FILES_DESCRIPTION, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("README.md")));
    }

    #[test]
    fn test_file_without_extension_matches_last() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "COPYING");

        let found = find_file(dir.path(), FILES_LICENSE, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("COPYING")));

        touch(dir.path(), "License.rst");
        let found = find_file(dir.path(), FILES_LICENSE, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("License.rst")));
    }

    #[test]
    fn test_basename_order_breaks_ties_within_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "copying.txt");
        touch(dir.path(), "license.txt");

        let found = find_file(dir.path(), FILES_LICENSE, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("license.txt")));
    }

    #[test]
    fn test_unknown_extension_and_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.html");
        fs::create_dir(dir.path().join("readme")).unwrap();

        let found = find_file(dir.path(), FILES_DESCRIPTION, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "secret.md");

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.md"), dir.path().join("README.md")).unwrap();
        touch(dir.path(), "README.txt");

        let found = find_file(dir.path(), FILES_DESCRIPTION, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("README.txt")));
    }

    #[test]
    fn test_nested_files_are_not_considered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("doc")).unwrap();
        touch(&dir.path().join("doc"), "README.md");

        let found = find_file(dir.path(), FILES_DESCRIPTION, FILE_EXTENSIONS).unwrap();
        assert_eq!(found, None);
    }
}
