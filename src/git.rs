use crate::config::DiffMode;
use crate::stats::FileChange;
use crate::{debug, warning};
use anyhow::{Context, Result, bail};
use git2::build::CheckoutBuilder;
use git2::{Commit, DiffFindOptions, ErrorCode, Oid, Patch, Repository};
use std::path::Path;

/// the local clone commits are inspected in
pub struct LocalRepo {
    repo: Repository,
    mode: DiffMode,
}

impl LocalRepo {
    pub fn open(path: &Path, mode: DiffMode) -> Result<Self> {
        let repo = Repository::open(path)
            .with_context(|| format!("failed to open git repository at {}", path.display()))?;

        // checkout mode needs a working copy to check out into
        if mode == DiffMode::Checkout && repo.is_bare() {
            bail!(
                "{} is a bare repository, set DIFF_MODE to \"objects\"",
                path.display()
            );
        }

        Ok(Self { repo, mode })
    }

    /// guard that returns the working copy to `branch` once inspection is over
    ///
    /// fails if the branch doesn't exist, before anything has been checked out.
    /// `None` in objects mode, where the working copy is never touched.
    pub fn restore_on_drop(&self, branch: &str) -> Result<Option<CheckoutRestore<'_>>> {
        if self.mode == DiffMode::Objects {
            return Ok(None);
        }

        self.repo
            .find_reference(&branch_ref(branch))
            .with_context(|| format!("primary branch {branch} not found in local repository"))?;

        Ok(Some(CheckoutRestore {
            repo: &self.repo,
            branch: branch.to_string(),
            restored: false,
        }))
    }

    /// per-file line counts for `sha` against its parent
    ///
    /// in checkout mode the working copy is force-checked-out at `sha` first,
    /// discarding local modifications. returns `None` when the commit isn't
    /// in the local clone.
    pub fn inspect(&self, sha: &str) -> Result<Option<Vec<FileChange>>> {
        let oid = Oid::from_str(sha).with_context(|| format!("invalid commit id {sha:?}"))?;
        let commit = match self.repo.find_commit(oid) {
            Ok(commit) => commit,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read commit {sha}")),
        };

        if self.mode == DiffMode::Checkout {
            self.checkout(&commit)?;
        }

        diff_against_parent(&self.repo, &commit).map(Some)
    }

    fn checkout(&self, commit: &Commit) -> Result<()> {
        let mut opts = CheckoutBuilder::new();
        opts.force();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .with_context(|| format!("failed to check out {}", commit.id()))?;
        self.repo
            .set_head_detached(commit.id())
            .with_context(|| format!("failed to detach HEAD at {}", commit.id()))?;
        Ok(())
    }
}

/// diff a commit's tree against its only parent (or the empty tree for a root commit)
///
/// merge commits report no changes, the same as `git log --numstat` without `-m`
fn diff_against_parent(repo: &Repository, commit: &Commit) -> Result<Vec<FileChange>> {
    if commit.parent_count() > 1 {
        debug!("{} is a merge commit, no line counts", commit.id());
        return Ok(Vec::new());
    }

    let tree = commit
        .tree()
        .with_context(|| format!("failed to read tree of {}", commit.id()))?;
    let parent_tree = match commit.parent_count() {
        0 => None,
        _ => Some(
            commit
                .parent(0)
                .and_then(|parent| parent.tree())
                .with_context(|| format!("failed to read parent tree of {}", commit.id()))?,
        ),
    };

    let mut diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
        .with_context(|| format!("failed to diff {}", commit.id()))?;

    // enable rename detection so moved files count once, under their new path
    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))
        .context("failed to detect renames")?;

    let mut changes = Vec::new();
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
            continue;
        };
        let path = path.to_string_lossy().to_string();

        // libgit2 yields no patch for binary deltas
        match Patch::from_diff(&diff, idx).context("failed to load patch")? {
            Some(patch) if !patch.delta().flags().is_binary() => {
                let (_context, added, removed) =
                    patch.line_stats().context("failed to count lines")?;
                changes.push(FileChange {
                    path,
                    added: added as u64,
                    removed: removed as u64,
                    binary: false,
                });
            }
            _ => {
                debug!("{}: {} is binary, skipped", commit.id(), path);
                changes.push(FileChange {
                    path,
                    added: 0,
                    removed: 0,
                    binary: true,
                });
            }
        }
    }

    Ok(changes)
}

fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

fn checkout_branch(repo: &Repository, branch: &str) -> Result<()> {
    repo.set_head(&branch_ref(branch))
        .with_context(|| format!("failed to point HEAD at {branch}"))?;
    let mut opts = CheckoutBuilder::new();
    opts.force();
    repo.checkout_head(Some(&mut opts))
        .with_context(|| format!("failed to check out {branch}"))?;
    Ok(())
}

/// checks the primary branch back out, either explicitly via `finish` or on drop
pub struct CheckoutRestore<'repo> {
    repo: &'repo Repository,
    branch: String,
    restored: bool,
}

impl CheckoutRestore<'_> {
    pub fn finish(mut self) -> Result<()> {
        self.restored = true;
        checkout_branch(self.repo, &self.branch)
    }
}

impl Drop for CheckoutRestore<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = checkout_branch(self.repo, &self.branch) {
            warning!("local repository left on a detached HEAD: {:#}", e);
        }
    }
}
