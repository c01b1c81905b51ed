use crate::filter::FileFilter;
use crate::github::CommitDescriptor;

/// line counts for one file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub added: u64,
    pub removed: u64,
    pub binary: bool, // binary deltas carry no line counts
}

/// added/removed totals over the in-scope files of a commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineTotals {
    pub added: u64,
    pub removed: u64,
}

impl LineTotals {
    /// sum the files accepted by `filter`; binary files count as zero
    pub fn from_changes(changes: &[FileChange], filter: &FileFilter) -> Self {
        changes
            .iter()
            .filter(|change| !change.binary && filter.accepts(&change.path))
            .fold(Self::default(), |totals, change| Self {
                added: totals.added + change.added,
                removed: totals.removed + change.removed,
            })
    }
}

/// one sheet row: a commit's in-scope totals joined with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRow {
    pub branch: Option<String>,
    pub commit: String,
    pub author: String,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub commit_url: String,
    pub message: String,
    pub date: String,
}

impl CommitRow {
    pub fn new(descriptor: &CommitDescriptor, totals: LineTotals, branch: Option<&str>) -> Self {
        Self {
            branch: branch.map(str::to_string),
            commit: descriptor.sha.clone(),
            author: descriptor.author_name.clone(),
            lines_added: i64::try_from(totals.added).unwrap_or(i64::MAX),
            lines_removed: i64::try_from(totals.removed).unwrap_or(i64::MAX),
            commit_url: descriptor.html_url.clone(),
            message: descriptor.message.clone(),
            date: descriptor.date.clone(),
        }
    }

    /// effective lines of code: added minus removed, may be negative
    pub fn eloc(&self) -> i64 {
        self.lines_added - self.lines_removed
    }
}
