//! Git operations for zapadmin.
//!
//! This crate reads commit history through the `git` binary: the head
//! commit, commit parents, file contents at a commit, bounded ancestor walks
//! and the paths modified between two commits.
//!
//! # Example
//!
//! ```no_run
//! use zapadmin_git::{get_commit_hash, read_file_at};
//! use std::path::Path;
//!
//! let repo = Path::new(".");
//! let head = get_commit_hash(repo).expect("head");
//! if let Some(xml) = read_file_at(repo, &head, "ZapVersions.xml").expect("read") {
//!     println!("{} bytes", xml.len());
//! }
//! ```

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

fn run_git(path: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(output.stdout)
}

fn run_git_lines(path: &Path, args: &[&str]) -> Result<Vec<String>> {
    let stdout = run_git(path, args)?;
    Ok(String::from_utf8_lossy(&stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Check if we're inside a git repository
pub fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(path)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get the current git commit hash
pub fn get_commit_hash(path: &Path) -> Result<String> {
    let stdout = run_git(path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

/// Get the parents of a commit, first parent first
pub fn get_parents(path: &Path, commit: &str) -> Result<Vec<String>> {
    let lines = run_git_lines(path, &["rev-list", "--parents", "-n", "1", commit])?;
    let line = lines
        .first()
        .ok_or_else(|| anyhow::anyhow!("commit not found: {commit}"))?;

    // Format is "<commit> <parent>..."
    Ok(line.split_whitespace().skip(1).map(String::from).collect())
}

/// Read a file as UTF-8 text from the tree of a commit.
///
/// Returns `None` when the file does not exist in that commit.
pub fn read_file_at(path: &Path, commit: &str, file: &str) -> Result<Option<String>> {
    let object = format!("{commit}:{file}");

    let exists = Command::new("git")
        .args(["cat-file", "-e", &object])
        .current_dir(path)
        .output()
        .context("failed to run git cat-file")?
        .status
        .success();
    if !exists {
        return Ok(None);
    }

    let stdout = run_git(path, &["show", &object])?;
    let content = String::from_utf8(stdout)
        .with_context(|| format!("file {file} in commit {commit} is not valid UTF-8"))?;
    Ok(Some(content))
}

/// Walk the history from a commit, newest first, returning at most `max`
/// commits (the start commit included).
pub fn list_ancestors(path: &Path, commit: &str, max: usize) -> Result<Vec<String>> {
    let max_count = format!("--max-count={max}");
    run_git_lines(path, &["rev-list", &max_count, commit])
}

/// Get the paths modified (not added, deleted or renamed) between two commits
pub fn modified_paths(path: &Path, old: &str, new: &str) -> Result<Vec<String>> {
    let lines = run_git_lines(path, &["diff", "--name-status", "--no-renames", old, new])?;

    Ok(lines
        .iter()
        .filter_map(|line| {
            // Format is "X\tpath"
            let (status, file) = line.split_once('\t')?;
            status.starts_with('M').then(|| file.to_string())
        })
        .collect())
}

/// Check whether a file was modified between two commits
pub fn is_file_modified(path: &Path, old: &str, new: &str, file: &str) -> Result<bool> {
    Ok(modified_paths(path, old, new)?.iter().any(|p| p == file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git");
        assert!(
            status.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&status.stderr)
        );
    }

    fn init_git_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test User"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
    }

    fn commit_file(dir: &Path, file: &str, content: &str, msg: &str) {
        fs::write(dir.join(file), content).expect("write");
        git(dir, &["add", file]);
        git(dir, &["commit", "-q", "-m", msg]);
    }

    #[test]
    fn is_git_repo_detects_repo() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());

        assert!(is_git_repo(td.path()));
    }

    #[test]
    fn is_git_repo_returns_false_for_non_repo() {
        let td = tempdir().expect("tempdir");
        assert!(!is_git_repo(td.path()));
    }

    #[test]
    fn get_commit_hash_returns_hash() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        commit_file(td.path(), "a.txt", "a", "first");

        let hash = get_commit_hash(td.path()).expect("commit hash");
        assert_eq!(hash.len(), 40);
    }

    #[test]
    fn get_parents_of_root_and_child() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        commit_file(td.path(), "a.txt", "1", "first");
        let first = get_commit_hash(td.path()).expect("hash");
        commit_file(td.path(), "a.txt", "2", "second");
        let second = get_commit_hash(td.path()).expect("hash");

        assert!(get_parents(td.path(), &first).expect("parents").is_empty());
        assert_eq!(get_parents(td.path(), &second).expect("parents"), vec![first]);
    }

    #[test]
    fn read_file_at_reads_historic_content() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        commit_file(td.path(), "a.txt", "old", "first");
        let first = get_commit_hash(td.path()).expect("hash");
        commit_file(td.path(), "a.txt", "new", "second");
        let second = get_commit_hash(td.path()).expect("hash");

        assert_eq!(
            read_file_at(td.path(), &first, "a.txt").expect("read").as_deref(),
            Some("old")
        );
        assert_eq!(
            read_file_at(td.path(), &second, "a.txt").expect("read").as_deref(),
            Some("new")
        );
    }

    #[test]
    fn read_file_at_missing_file_is_none() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        commit_file(td.path(), "a.txt", "a", "first");
        let head = get_commit_hash(td.path()).expect("hash");

        assert_eq!(read_file_at(td.path(), &head, "missing.xml").expect("read"), None);
    }

    #[test]
    fn list_ancestors_is_bounded() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        for i in 0..5 {
            commit_file(td.path(), "a.txt", &i.to_string(), "commit");
        }
        let head = get_commit_hash(td.path()).expect("hash");

        let all = list_ancestors(td.path(), &head, 50).expect("walk");
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], head);

        let bounded = list_ancestors(td.path(), &head, 3).expect("walk");
        assert_eq!(bounded.len(), 3);
    }

    #[test]
    fn modified_paths_only_reports_modifications() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        commit_file(td.path(), "a.txt", "1", "first");
        let first = get_commit_hash(td.path()).expect("hash");
        fs::write(td.path().join("a.txt"), "2").expect("write");
        git(td.path(), &["add", "a.txt"]);
        commit_file(td.path(), "b.txt", "new file", "second");
        let second = get_commit_hash(td.path()).expect("hash");

        let modified = modified_paths(td.path(), &first, &second).expect("diff");
        assert_eq!(modified, vec!["a.txt".to_string()]);
        assert!(is_file_modified(td.path(), &first, &second, "a.txt").expect("diff"));
        assert!(!is_file_modified(td.path(), &first, &second, "b.txt").expect("diff"));
    }

    #[test]
    fn get_commit_hash_fails_outside_repo() {
        let td = tempdir().expect("tempdir");
        assert!(get_commit_hash(td.path()).is_err());
    }
}
