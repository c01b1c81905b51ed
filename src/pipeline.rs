use crate::config::{Config, Target};
use crate::filter::FileFilter;
use crate::git::LocalRepo;
use crate::github::{CommitDescriptor, GithubClient};
use crate::stats::{CommitRow, LineTotals};
use crate::workbook::{Workbook, sheet_name};
use crate::{debug, status, ui, warning};
use anyhow::Result;
use std::collections::HashSet;

/// what one target contributed to its sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSummary {
    pub sheet: String,
    pub fetched: usize,
    pub added: usize,
    pub not_in_clone: usize,
    pub total: usize,
}

/// run the whole collection against GitHub
pub fn run(config: &Config) -> Result<Vec<TargetSummary>> {
    let client = GithubClient::from_config(config);
    run_with(config, |target| {
        client.fetch_commits(&target.user, target.branch.as_deref())
    })
}

/// run the collection with `fetch` listing each target's commits
///
/// targets are processed strictly in order since every inspection may move the
/// shared working copy. the working copy goes back to the primary branch at
/// the end, also when a step fails.
pub fn run_with(
    config: &Config,
    mut fetch: impl FnMut(&Target) -> Result<Vec<CommitDescriptor>>,
) -> Result<Vec<TargetSummary>> {
    let repo = LocalRepo::open(&config.local_repo_path, config.diff_mode)?;
    let mut workbook = Workbook::load(&config.excel_file)?;
    if !workbook.is_empty() {
        debug!(
            "loaded {} existing sheet(s) from {}",
            workbook.sheets().len(),
            config.excel_file.display()
        );
    }
    let restore = repo.restore_on_drop(&config.primary_branch)?;

    let mut summaries = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        status!("processing {}...", target.label());

        let commits = fetch(target)?;
        let sheet = sheet_name(&target.user, target.branch.as_deref());
        let persisted: HashSet<String> = workbook
            .sheet(&sheet)
            .map(|s| s.rows.iter().map(|row| row.commit.clone()).collect())
            .unwrap_or_default();
        let (rows, not_in_clone) =
            collect_rows(&repo, &config.filter, target, &commits, &persisted)?;

        let added = workbook.merge(&sheet, target.branch.is_some(), rows);
        let total = workbook.sheet(&sheet).map_or(0, |s| s.rows.len());

        summaries.push(TargetSummary {
            sheet,
            fetched: commits.len(),
            added,
            not_in_clone,
            total,
        });
    }

    if workbook.is_empty() {
        warning!(
            "no commits found for any target, {} not written",
            config.excel_file.display()
        );
    } else {
        workbook.save(&config.excel_file)?;
        status!("wrote {}", config.excel_file.display());
    }

    if let Some(restore) = restore {
        restore.finish()?;
    }

    Ok(summaries)
}

/// one row per distinct commit found in the local clone, plus how many weren't
///
/// commits in `persisted` already have a row and are never inspected again
fn collect_rows(
    repo: &LocalRepo,
    filter: &FileFilter,
    target: &Target,
    commits: &[CommitDescriptor],
    persisted: &HashSet<String>,
) -> Result<(Vec<CommitRow>, usize)> {
    let bar = ui::progress_bar(commits.len() as u64, &target.label());
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut not_in_clone = 0;

    for commit in commits {
        bar.inc(1);
        if !seen.insert(commit.sha.as_str()) {
            continue;
        }
        if persisted.contains(&commit.sha) {
            debug!("{}: already recorded, skipped", commit.sha);
            continue;
        }

        let Some(changes) = repo.inspect(&commit.sha)? else {
            bar.suspend(|| {
                warning!(
                    "{} is not in the local repository (fetch it to include it), skipped",
                    commit.sha
                );
            });
            not_in_clone += 1;
            continue;
        };

        for change in &changes {
            debug!(
                "{}: {} +{} -{}{}",
                commit.sha,
                change.path,
                change.added,
                change.removed,
                if change.binary { " (binary)" } else { "" }
            );
        }
        let totals = LineTotals::from_changes(&changes, filter);
        debug!(
            "{}: in scope added={} removed={}",
            commit.sha,
            totals.added,
            totals.removed
        );

        rows.push(CommitRow::new(commit, totals, target.branch.as_deref()));
    }

    bar.finish_and_clear();
    Ok((rows, not_in_clone))
}

#[cfg(test)]
mod tests;
