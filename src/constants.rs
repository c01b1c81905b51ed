// config
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const CONFIG_DIR_NAME: &str = "commit-stats";
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

// github
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const COMMITS_PER_PAGE: u32 = 100;
pub const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
pub const USER_AGENT: &str = concat!("commit-stats/", env!("CARGO_PKG_VERSION"));

// git
pub const DEFAULT_PRIMARY_BRANCH: &str = "main";

// workbook
pub const MAX_SHEET_NAME_CHARS: usize = 31;
/// excel refuses a sheet with this name, whatever the case
pub const RESERVED_SHEET_NAME: &str = "History";
pub const MAX_CELL_CHARS: usize = 32_767;
pub const COL_BRANCH: &str = "BRANCH";
pub const COL_COMMIT: &str = "COMMIT";
pub const COL_AUTHOR: &str = "AUTHOR";
pub const COL_LINES_ADDED: &str = "LINES_ADDED";
pub const COL_LINES_REMOVED: &str = "LINES_REMOVED";
pub const COL_ELOC: &str = "ELOC";
pub const COL_COMMIT_URL: &str = "COMMIT_URL";
pub const COL_MESSAGE: &str = "MESSAGE";
pub const COL_DATE: &str = "DATE";
