//! What the last commit released, from the versions files it changed.
//!
//! The head commit is compared with its first parent or, for a merge
//! commit, with the common ancestor of its first two parents. A versions
//! file that was not modified between the two is compared with itself, so
//! nothing in it shows up as new.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use zapadmin_types::{AddOnChange, ReleaseState, VersionChange};

use crate::addons;
use crate::document::{Document, Key};
use crate::error::{Error, Result};
use crate::keys;

/// How many commits of each parent are walked looking for a common ancestor.
///
/// Branches that diverged further back than this fail with
/// [`Error::AncestorNotFound`].
pub const ANCESTOR_WINDOW: usize = 50;

/// Read access to the commit history of the repository holding the
/// versions files.
pub trait RepoHistory {
    fn head(&self) -> Result<String>;

    /// Parents of `commit`, first parent first.
    fn parents(&self, commit: &str) -> Result<Vec<String>>;

    /// `commit` and its ancestors, newest first, at most `max` of them.
    fn ancestors(&self, commit: &str, max: usize) -> Result<Vec<String>>;

    /// Content of `path` at `commit`, `None` if it does not exist there.
    fn read_file(&self, commit: &str, path: &str) -> Result<Option<String>>;

    /// Whether `path` was modified (not added or deleted) from `old` to `new`.
    fn is_modified(&self, old: &str, new: &str, path: &str) -> Result<bool>;
}

/// [`RepoHistory`] of a git working tree, read with the `git` binary.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo: PathBuf,
}

impl GitHistory {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    /// Open `repo`, failing if it is not inside a git working tree.
    pub fn open(repo: impl Into<PathBuf>) -> Result<Self> {
        let history = Self::new(repo);
        if !zapadmin_git::is_git_repo(&history.repo) {
            return Err(Error::GitRead(format!(
                "not a git repository: {}",
                history.repo.display()
            )));
        }
        Ok(history)
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }
}

fn git_error(e: anyhow::Error) -> Error {
    Error::GitRead(format!("{e:#}"))
}

impl RepoHistory for GitHistory {
    fn head(&self) -> Result<String> {
        zapadmin_git::get_commit_hash(&self.repo).map_err(git_error)
    }

    fn parents(&self, commit: &str) -> Result<Vec<String>> {
        zapadmin_git::get_parents(&self.repo, commit).map_err(git_error)
    }

    fn ancestors(&self, commit: &str, max: usize) -> Result<Vec<String>> {
        zapadmin_git::list_ancestors(&self.repo, commit, max).map_err(git_error)
    }

    fn read_file(&self, commit: &str, path: &str) -> Result<Option<String>> {
        zapadmin_git::read_file_at(&self.repo, commit, path).map_err(git_error)
    }

    fn is_modified(&self, old: &str, new: &str, path: &str) -> Result<bool> {
        zapadmin_git::is_file_modified(&self.repo, old, new, path).map_err(git_error)
    }
}

/// Compute the release state of the head commit.
///
/// `main_path` provides the main and weekly releases, `add_ons_path` the
/// add-ons. Both are paths relative to the repository root.
pub fn compute(
    history: &dyn RepoHistory,
    main_path: &str,
    add_ons_path: &str,
) -> Result<ReleaseState> {
    let head = history.head()?;
    let base = comparison_commit(history, &head)?;

    let (previous, current) = registry_versions(history, &head, base.as_deref(), main_path)?;
    let mut state = ReleaseState {
        main_release: version_change(&previous, &current, &keys::core_version()),
        weekly_release: version_change(&previous, &current, &keys::core_daily_version()),
        add_ons: None,
    };

    let (previous, current) = registry_versions(history, &head, base.as_deref(), add_ons_path)?;
    state.add_ons = Some(compute_add_ons_state(&previous, &current));
    Ok(state)
}

/// Changes of the add-ons listed in `current` whose version differs from
/// the one in `previous`, in list order.
pub fn compute_add_ons_state(previous: &Document, current: &Document) -> Vec<AddOnChange> {
    addons::add_on_ids(current)
        .into_iter()
        .filter_map(|id| {
            let version = keys::add_on_key(&id).child("version");
            let current_version = current.get_string(&version)?;
            let previous_version = previous.get_string(&version);
            if previous_version == Some(current_version) {
                return None;
            }
            Some(AddOnChange::new(
                id,
                previous_version.map(String::from),
                current_version,
            ))
        })
        .collect()
}

fn version_change(previous: &Document, current: &Document, key: &Key) -> Option<VersionChange> {
    let current_version = current.get_string(key)?;
    Some(VersionChange::new(
        previous.get_string(key).map(String::from),
        current_version,
    ))
}

/// The commit the head is compared with, `None` for a root commit.
fn comparison_commit(history: &dyn RepoHistory, head: &str) -> Result<Option<String>> {
    let parents = history.parents(head)?;
    match parents.as_slice() {
        [] => Ok(None),
        [first] => Ok(Some(first.clone())),
        [first, second, ..] => common_ancestor(history, first, second).map(Some),
    }
}

/// The first of `second`'s recent ancestors that is also one of `first`'s.
pub fn common_ancestor(history: &dyn RepoHistory, first: &str, second: &str) -> Result<String> {
    let first_ancestors: HashSet<String> = history
        .ancestors(first, ANCESTOR_WINDOW)?
        .into_iter()
        .collect();

    history
        .ancestors(second, ANCESTOR_WINDOW)?
        .into_iter()
        .find(|commit| first_ancestors.contains(commit))
        .ok_or_else(|| Error::AncestorNotFound {
            first: first.to_string(),
            second: second.to_string(),
        })
}

/// Previous and current content of the versions file at `path`.
fn registry_versions(
    history: &dyn RepoHistory,
    head: &str,
    base: Option<&str>,
    path: &str,
) -> Result<(Document, Document)> {
    let current_xml = history
        .read_file(head, path)?
        .ok_or_else(|| Error::FileNotFoundInCommit {
            path: path.to_string(),
        })?;
    let current = parse_registry(&current_xml, path)?;

    let Some(base) = base else {
        return Ok((current.clone(), current));
    };
    if !history.is_modified(base, head, path)? {
        return Ok((current.clone(), current));
    }

    let previous_xml = history
        .read_file(base, path)?
        .ok_or_else(|| Error::GitRead(format!("{path} not found in commit {base}")))?;
    Ok((parse_registry(&previous_xml, path)?, current))
}

fn parse_registry(xml: &str, path: &str) -> Result<Document> {
    Document::parse(xml).map_err(|e| match e {
        Error::Parse { message, .. } => Error::Parse {
            what: path.to_string(),
            message,
        },
        other => other,
    })
}
