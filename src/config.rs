use crate::constants::{
    DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PRIMARY_BRANCH, TOKEN_ENV_VAR,
};
use crate::filter::FileFilter;
use crate::workbook::sheet_name;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// how commits are inspected in the local clone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// force-checkout every commit before diffing, restore the primary branch afterwards
    #[default]
    Checkout,
    /// diff repository objects directly, never touching the working copy
    Objects,
}

/// one author to collect, optionally restricted to a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: String,
    pub branch: Option<String>,
}

impl Target {
    /// label used in progress output
    pub fn label(&self) -> String {
        match &self.branch {
            Some(branch) => format!("{}@{}", self.user, branch),
            None => self.user.clone(),
        }
    }
}

/// fully validated run configuration, built once and passed to each component
#[derive(Debug, Clone)]
pub struct Config {
    pub github_repo: String,
    pub github_token: String,
    pub github_api_url: String,
    pub http_timeout: Duration,
    pub local_repo_path: PathBuf,
    pub primary_branch: String,
    pub diff_mode: DiffMode,
    pub targets: Vec<Target>,
    pub filter: FileFilter,
    pub excel_file: PathBuf,
}

/// the config file as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawConfig {
    github_repo: Option<String>,
    github_token: Option<String>,
    github_api_url: Option<String>,
    http_timeout_secs: Option<u64>,
    local_repo_path: Option<PathBuf>,
    primary_branch: Option<String>,
    diff_mode: Option<DiffMode>,
    users: Option<Vec<String>>,
    users_branches: Option<Vec<RawUserBranch>>,
    lib_folder_paths: Option<Vec<String>>,
    lib_folder_path: Option<String>,
    #[serde(default)]
    exclude_file_suffixes: Vec<String>,
    #[serde(default)]
    exclude_file_patterns: Vec<String>,
    excel_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawUserBranch {
    user: String,
    branch: String,
}

impl Config {
    /// load and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text, |key| std::env::var(key).ok())
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// parse config JSON, using `env` to look up fallbacks for secrets
    pub fn parse(text: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text).context("failed to parse config JSON")?;

        let github_repo = required(raw.github_repo, "GITHUB_REPO")?;
        let well_formed = github_repo.split_once('/').is_some_and(|(owner, name)| {
            !owner.is_empty() && !name.is_empty() && !name.contains('/')
        });
        if !well_formed {
            bail!("GITHUB_REPO must be in owner/name form, got {github_repo:?}");
        }

        let github_token = match raw.github_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => env(TOKEN_ENV_VAR).filter(|t| !t.is_empty()).with_context(|| {
                format!("missing required config key GITHUB_TOKEN (and ${TOKEN_ENV_VAR} is not set)")
            })?,
        };

        let timeout_secs = raw.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }

        let mut targets = Vec::new();
        if raw.users.is_none() && raw.users_branches.is_none() {
            bail!("missing required config key USERS (or USERS_BRANCHES)");
        }
        for user in raw.users.unwrap_or_default() {
            targets.push(Target { user, branch: None });
        }
        for pair in raw.users_branches.unwrap_or_default() {
            targets.push(Target {
                user: pair.user,
                branch: Some(pair.branch),
            });
        }
        if let Some(target) = targets.iter().find(|t| t.user.trim().is_empty()) {
            bail!("empty user name in config (target {:?})", target.label());
        }
        check_sheet_names(&targets)?;

        if raw.lib_folder_paths.is_none() && raw.lib_folder_path.is_none() {
            bail!("missing required config key LIB_FOLDER_PATHS (or LIB_FOLDER_PATH)");
        }
        let mut include_prefixes = raw.lib_folder_paths.unwrap_or_default();
        include_prefixes.extend(raw.lib_folder_path);

        Ok(Self {
            github_repo,
            github_token,
            github_api_url: raw
                .github_api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
            local_repo_path: required(raw.local_repo_path, "LOCAL_REPO_PATH")?,
            primary_branch: raw
                .primary_branch
                .unwrap_or_else(|| DEFAULT_PRIMARY_BRANCH.to_string()),
            diff_mode: raw.diff_mode.unwrap_or_default(),
            targets,
            filter: FileFilter::new(
                include_prefixes,
                raw.exclude_file_suffixes,
                raw.exclude_file_patterns,
            ),
            excel_file: required(raw.excel_file, "EXCEL_FILE")?,
        })
    }
}

/// every target needs a sheet of its own; cleaning and truncating names can make two collide
fn check_sheet_names(targets: &[Target]) -> Result<()> {
    let mut claimed: HashMap<String, &Target> = HashMap::new();
    for target in targets {
        let name = sheet_name(&target.user, target.branch.as_deref());
        if let Some(other) = claimed.insert(name.to_lowercase(), target) {
            bail!(
                "targets {:?} and {:?} would both be written to sheet {:?}",
                other.label(),
                target.label(),
                name
            );
        }
    }
    Ok(())
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.with_context(|| format!("missing required config key {key}"))
}
