mod cli;
mod config;
mod constants;
mod filter;
mod git;
mod github;
mod pipeline;
mod stats;
mod ui;
mod workbook;

use crate::cli::Cli;
use crate::config::{Config, DiffMode};
use crate::pipeline::TargetSummary;
use anyhow::Result;
use num_format::{Locale, ToFormattedString};

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    ui::set_verbose(cli.verbose);

    let config = Config::load(&cli.config_path())?;
    debug!(
        "{} target(s) in {}, reading {} ({} mode)",
        config.targets.len(),
        config.github_repo,
        config.local_repo_path.display(),
        match config.diff_mode {
            DiffMode::Checkout => "checkout",
            DiffMode::Objects => "objects",
        }
    );
    if config.filter.include_prefixes.is_empty() {
        warning!("LIB_FOLDER_PATHS is empty, every commit will count zero lines");
    }

    let summaries = pipeline::run(&config)?;
    print_summary(&summaries);

    Ok(())
}

/// one line per sheet touched this run
fn print_summary(summaries: &[TargetSummary]) {
    info!();
    for summary in summaries {
        let mut line = format!(
            "{}: {} fetched, {} new, {} total",
            summary.sheet,
            summary.fetched.to_formatted_string(&Locale::en),
            summary.added.to_formatted_string(&Locale::en),
            summary.total.to_formatted_string(&Locale::en),
        );
        if summary.not_in_clone > 0 {
            line.push_str(&format!(", {} missing locally", summary.not_in_clone));
        }
        info!(line);
    }
}
