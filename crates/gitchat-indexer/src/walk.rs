//! File indexability rules and the repository tree walk for the code stage.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "dist",
    "build",
    ".next",
    "coverage",
    ".cache",
    "vendor",
    "target",
];

const SKIP_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "so", "dll", "exe", "bin", "jpg", "jpeg", "png", "gif", "ico", "svg", "woff",
    "woff2", "ttf", "eot", "mp3", "mp4", "avi", "mov", "pdf", "doc", "docx", "xls", "xlsx", "zip",
    "tar", "gz", "rar", "7z", "lock",
];

const MAX_FILE_SIZE: u64 = 500_000;

/// Whether `path` (relative to `repo_root`) should be chunked and indexed.
pub fn is_indexable_file(path: &Path, repo_root: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(repo_root) else {
        return false;
    };

    if rel
        .components()
        .any(|c| SKIP_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
    {
        return false;
    }

    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };
    if name.starts_with('.') {
        return false;
    }
    if name.ends_with(".min.js") || name.ends_with(".min.css") {
        return false;
    }

    if let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
        if SKIP_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
    }

    match std::fs::metadata(path) {
        Ok(meta) => meta.len() <= MAX_FILE_SIZE,
        Err(_) => false,
    }
}

/// Walk `repo_root`, returning the relative paths of every indexable file.
pub fn walk_indexable_files(repo_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(repo_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_indexable_file(path, repo_root))
        .filter_map(|path| path.strip_prefix(repo_root).ok().map(|p| p.to_path_buf()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_dot_dirs_and_binary_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules/pkg.js"), "x").unwrap();
        fs::write(root.join("logo.png"), "x").unwrap();
        fs::write(root.join(".env"), "x").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();

        let files = walk_indexable_files(root);
        assert_eq!(files, vec![PathBuf::from("main.rs")]);
    }

    #[test]
    fn skips_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let big = vec![b'a'; 600_000];
        fs::write(root.join("big.txt"), &big).unwrap();
        fs::write(root.join("small.txt"), b"ok").unwrap();

        let files = walk_indexable_files(root);
        assert_eq!(files, vec![PathBuf::from("small.txt")]);
    }
}
