use crate::constants::{CONFIG_DIR_NAME, DEFAULT_CONFIG_FILE};
use clap::Parser;
use std::path::PathBuf;

/// commit-stats: per-author line statistics from GitHub commits, written to an xlsx workbook
#[derive(Parser, Debug)]
#[command(name = "commit-stats", about, long_about = None, version)]
pub struct Cli {
    /// path to the JSON config file [default: ./config.json, then the user config dir]
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// print per-commit diagnostics (hides progress bars)
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// the config file to load
    ///
    /// an explicit --config always wins; otherwise ./config.json, falling back
    /// to <config dir>/commit-stats/config.json when that exists
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }

        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(DEFAULT_CONFIG_FILE))
            .filter(|path| path.exists())
            .unwrap_or(local)
    }
}
