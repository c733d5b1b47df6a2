//! File discovery for directory indexing.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Plain-text extensions.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "rst", "org"];

/// Structured-data extensions.
pub const DATA_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml", "csv", "xml", "html"];

/// Source-code extensions.
pub const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "rb",
    "php", "swift", "sh", "sql",
];

/// Dependency and build-cache directories never descended into.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    "vendor",
    "dist",
    "build",
];

/// Expand a leading `~` to the user's home directory.
///
/// Uses `HOME`, then `USERPROFILE`. Paths without the shorthand, and all
/// paths when no home is known, are returned unchanged.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    expand_home_with(path, home)
}

fn expand_home_with(path: &str, home: Option<PathBuf>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };

    if path == "~" {
        return home;
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Whether a file's extension is on the indexing allow-list.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    let extension = extension.to_ascii_lowercase();
    [TEXT_EXTENSIONS, DATA_EXTENSIONS, CODE_EXTENSIONS]
        .iter()
        .any(|list| list.contains(&extension.as_str()))
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref())
}

/// Recursively list indexable files under `root`, in a stable order.
///
/// Hidden entries and [`SKIPPED_DIRS`] are pruned. Entries that cannot be
/// read are logged and skipped.
#[must_use]
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_indexable(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "skipping unreadable entry"),
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_expand_home() {
        let home = Some(PathBuf::from("/home/ada"));
        assert_eq!(expand_home_with("~", home.clone()), PathBuf::from("/home/ada"));
        assert_eq!(
            expand_home_with("~/notes/a.md", home.clone()),
            PathBuf::from("/home/ada/notes/a.md")
        );
        assert_eq!(expand_home_with("/tmp/x", home.clone()), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home_with("~other/x", home), PathBuf::from("~other/x"));
        assert_eq!(expand_home_with("~/x", None), PathBuf::from("~/x"));
    }

    #[test]
    fn test_is_indexable() {
        assert!(is_indexable(Path::new("README.md")));
        assert!(is_indexable(Path::new("src/main.RS")));
        assert!(is_indexable(Path::new("config.yml")));
        assert!(!is_indexable(Path::new("photo.png")));
        assert!(!is_indexable(Path::new("Makefile")));
    }

    #[test]
    fn test_discover_prunes_hidden_and_dependency_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();

        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("docs/b.txt"), "b").unwrap();
        fs::write(root.join("docs/deep/c.rs"), "c").unwrap();
        fs::write(root.join("docs/image.png"), "png").unwrap();
        fs::write(root.join(".env.md"), "secret").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "js").unwrap();
        fs::write(root.join(".git/HEAD.txt"), "ref").unwrap();
        fs::write(root.join("target/debug/out.json"), "{}").unwrap();

        let found: Vec<PathBuf> = discover_files(root)
            .into_iter()
            .map(|path| path.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a.md"),
                PathBuf::from("docs/b.txt"),
                PathBuf::from("docs/deep/c.rs"),
            ]
        );
    }

    #[test]
    fn test_hidden_root_is_still_walked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".notes");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("todo.md"), "x").unwrap();

        assert_eq!(discover_files(&root).len(), 1);
    }
}
