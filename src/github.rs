use crate::config::Config;
use crate::constants::{ACCEPT_HEADER, COMMITS_PER_PAGE, USER_AGENT};
use crate::{debug, warning};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;

/// a commit as listed by the hosting API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDescriptor {
    pub sha: String,
    pub author_name: String,
    pub date: String,
    pub message: String,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    html_url: String,
    commit: ApiCommitDetail,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: ApiSignature,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    name: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl From<ApiCommit> for CommitDescriptor {
    fn from(api: ApiCommit) -> Self {
        Self {
            sha: api.sha,
            author_name: api.commit.author.name,
            date: api.commit.author.date,
            message: api.commit.message,
            html_url: api.html_url,
        }
    }
}

/// result of requesting one page of the commit listing
#[derive(Debug)]
pub enum Page {
    Commits(Vec<CommitDescriptor>),
    /// non-success status, with the API's error message when it sent one
    Rejected { status: u16, message: Option<String> },
}

/// blocking client for the commit-listing endpoint
pub struct GithubClient {
    agent: Agent,
    commits_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(api_url: &str, repo: &str, token: &str, timeout: Duration) -> Self {
        // status codes are handled per page, so don't turn them into errors
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            commits_url: format!("{}/repos/{}/commits", api_url.trim_end_matches('/'), repo),
            token: token.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.github_api_url,
            &config.github_repo,
            &config.github_token,
            config.http_timeout,
        )
    }

    /// every commit by `author` (on `branch`, if given), across all pages
    ///
    /// a rejected page ends the listing with a warning; pages already fetched
    /// are still returned. transport and decoding failures are errors.
    pub fn fetch_commits(&self, author: &str, branch: Option<&str>) -> Result<Vec<CommitDescriptor>> {
        let label = match branch {
            Some(branch) => format!("{author} on {branch}"),
            None => author.to_string(),
        };
        let commits = collect_pages(&label, |page| self.fetch_page(author, branch, page))?;
        debug!("fetched a total of {} commits for {}", commits.len(), label);
        Ok(commits)
    }

    fn fetch_page(&self, author: &str, branch: Option<&str>, page: u32) -> Result<Page> {
        let mut request = self
            .agent
            .get(&self.commits_url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", USER_AGENT)
            .query("author", author)
            .query("per_page", COMMITS_PER_PAGE.to_string())
            .query("page", page.to_string());
        if let Some(branch) = branch {
            request = request.query("sha", branch);
        }

        let mut response = request
            .call()
            .with_context(|| format!("failed to request {} (page {page})", self.commits_url))?;
        let status = response.status();
        debug!("fetching commits for {} (page {}): status {}", author, page, status.as_u16());

        if !status.is_success() {
            let message = response
                .body_mut()
                .read_json::<ApiError>()
                .ok()
                .map(|e| e.message);
            return Ok(Page::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let commits: Vec<ApiCommit> = response
            .body_mut()
            .read_json()
            .with_context(|| format!("failed to decode commit listing (page {page})"))?;
        Ok(Page::Commits(commits.into_iter().map(Into::into).collect()))
    }
}

/// request pages 1, 2, ... until one comes back empty or is rejected
pub fn collect_pages(
    label: &str,
    mut fetch_page: impl FnMut(u32) -> Result<Page>,
) -> Result<Vec<CommitDescriptor>> {
    let mut commits = Vec::new();
    let mut page = 1;

    loop {
        match fetch_page(page)? {
            Page::Commits(batch) if batch.is_empty() => break,
            Page::Commits(batch) => {
                commits.extend(batch);
                page += 1;
            }
            Page::Rejected { status, message } => {
                match message {
                    Some(message) => warning!(
                        "failed to fetch commits for {} (page {}): status {}: {}",
                        label,
                        page,
                        status,
                        message
                    ),
                    None => warning!(
                        "failed to fetch commits for {} (page {}): status {}",
                        label,
                        page,
                        status
                    ),
                }
                break;
            }
        }
    }

    Ok(commits)
}
