use super::*;
use crate::config::DiffMode;
use crate::stats::FileChange;
use git2::{Oid, Repository};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// helper to create a repo on `main` with a lib/ file and a docs/ file per commit
///
/// returns the commit ids oldest first
fn setup_history(root: &Path) -> Vec<Oid> {
    let repo = Repository::init(root).unwrap();
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();
    repo.set_head("refs/heads/main").unwrap();

    let versions: [(&str, &str); 3] = [
        ("a\nb\n", "x\n"),
        ("a\nc\nd\n", "x\ny\n"),
        ("a\n", "x\ny\nz\n"),
    ];

    let mut ids = Vec::new();
    for (idx, (lib, docs)) in versions.iter().enumerate() {
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("lib/foo.py"), lib).unwrap();
        fs::write(root.join("docs/readme.md"), docs).unwrap();

        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = repo.signature().unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        let id = repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &format!("commit {idx}"),
                &tree,
                &parents,
            )
            .unwrap();
        ids.push(id);
    }
    ids
}

fn test_config(root: &Path, mode: DiffMode, targets: Vec<Target>) -> Config {
    Config {
        github_repo: "acme/widgets".to_string(),
        github_token: "unused".to_string(),
        github_api_url: "http://127.0.0.1:9".to_string(),
        http_timeout: Duration::from_secs(1),
        local_repo_path: root.to_path_buf(),
        primary_branch: "main".to_string(),
        diff_mode: mode,
        targets,
        filter: FileFilter::new(vec!["lib/".to_string()], vec![], vec![]),
        excel_file: root.join("stats.xlsx"),
    }
}

fn alice() -> Target {
    Target {
        user: "alice".to_string(),
        branch: None,
    }
}

fn descriptor(id: &Oid) -> CommitDescriptor {
    CommitDescriptor {
        sha: id.to_string(),
        author_name: "Alice Example".to_string(),
        date: "2024-03-01T10:00:00Z".to_string(),
        message: format!("change {id}"),
        html_url: format!("https://github.com/acme/widgets/commit/{id}"),
    }
}

#[test]
fn test_rows_reflect_in_scope_files_only() {
    let temp_dir = TempDir::new().unwrap();
    let ids = setup_history(temp_dir.path());
    let config = test_config(temp_dir.path(), DiffMode::Objects, vec![alice()]);

    let summaries = run_with(&config, |_| Ok(vec![descriptor(&ids[1]), descriptor(&ids[2])])).unwrap();

    assert_eq!(
        summaries,
        vec![TargetSummary {
            sheet: "alice".to_string(),
            fetched: 2,
            added: 2,
            not_in_clone: 0,
            total: 2,
        }]
    );

    let workbook = Workbook::load(&config.excel_file).unwrap();
    let rows = &workbook.sheet("alice").unwrap().rows;
    // lib/foo.py: a,b -> a,c,d -> a
    assert_eq!((rows[0].lines_added, rows[0].lines_removed, rows[0].eloc()), (2, 1, 1));
    assert_eq!((rows[1].lines_added, rows[1].lines_removed, rows[1].eloc()), (0, 2, -2));
    assert_eq!(rows[0].commit, ids[1].to_string());
    assert_eq!(rows[0].author, "Alice Example");
}

#[test]
fn test_duplicates_and_unknown_commits_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let ids = setup_history(temp_dir.path());
    let config = test_config(temp_dir.path(), DiffMode::Objects, vec![alice()]);

    let mut unknown = descriptor(&ids[0]);
    unknown.sha = "0123456789abcdef0123456789abcdef01234567".to_string();

    let summaries = run_with(&config, |_| {
        Ok(vec![descriptor(&ids[0]), descriptor(&ids[0]), unknown.clone()])
    })
    .unwrap();

    assert_eq!(summaries[0].fetched, 3);
    assert_eq!(summaries[0].added, 1);
    assert_eq!(summaries[0].not_in_clone, 1);
    assert_eq!(summaries[0].total, 1);
}

#[test]
fn test_second_identical_run_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let ids = setup_history(temp_dir.path());
    let config = test_config(temp_dir.path(), DiffMode::Objects, vec![alice()]);
    let fetch = |_: &Target| -> Result<Vec<CommitDescriptor>> {
        Ok(ids.iter().map(descriptor).collect())
    };

    run_with(&config, fetch).unwrap();
    let first = Workbook::load(&config.excel_file).unwrap().sheets().to_vec();

    let summaries = run_with(&config, fetch).unwrap();
    let second = Workbook::load(&config.excel_file).unwrap().sheets().to_vec();

    assert_eq!(summaries[0].added, 0);
    assert_eq!(first, second);
    assert_eq!(second[0].rows.len(), 3);
}

#[test]
fn test_branch_targets_get_their_own_sheet() {
    let temp_dir = TempDir::new().unwrap();
    let ids = setup_history(temp_dir.path());
    let targets = vec![
        alice(),
        Target {
            user: "alice".to_string(),
            branch: Some("main".to_string()),
        },
    ];
    let config = test_config(temp_dir.path(), DiffMode::Objects, targets);

    let summaries = run_with(&config, |_| Ok(vec![descriptor(&ids[1])])).unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.sheet.as_str()).collect();
    assert_eq!(names, vec!["alice", "alice_main"]);

    let workbook = Workbook::load(&config.excel_file).unwrap();
    let branch_sheet = workbook.sheet("alice_main").unwrap();
    assert!(branch_sheet.with_branch);
    assert_eq!(branch_sheet.rows[0].branch.as_deref(), Some("main"));
    assert!(!workbook.sheet("alice").unwrap().with_branch);
}

#[test]
fn test_no_commits_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    setup_history(temp_dir.path());
    let config = test_config(temp_dir.path(), DiffMode::Objects, vec![alice()]);

    let summaries = run_with(&config, |_| Ok(Vec::new())).unwrap();

    assert_eq!(summaries[0].total, 0);
    assert!(!config.excel_file.exists());
}

#[test]
fn test_checkout_mode_ends_on_primary_branch() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let ids = setup_history(root);
    let config = test_config(root, DiffMode::Checkout, vec![alice()]);

    run_with(&config, |_| Ok(vec![descriptor(&ids[0])])).unwrap();

    let repo = Repository::open(root).unwrap();
    assert!(!repo.head_detached().unwrap());
    assert_eq!(repo.head().unwrap().shorthand(), Some("main"));
    assert_eq!(fs::read_to_string(root.join("lib/foo.py")).unwrap(), "a\n");
}

#[test]
fn test_failed_run_still_restores_checkout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let ids = setup_history(root);
    let bob = Target {
        user: "bob".to_string(),
        branch: None,
    };
    let config = test_config(root, DiffMode::Checkout, vec![alice(), bob]);

    let result = run_with(&config, |target| {
        if target.user == "alice" {
            Ok(vec![descriptor(&ids[0])])
        } else {
            Err(anyhow::anyhow!("connection reset"))
        }
    });

    assert!(result.is_err());
    assert!(!config.excel_file.exists(), "nothing is written when the run fails");

    let repo = Repository::open(root).unwrap();
    assert!(!repo.head_detached().unwrap());
    assert_eq!(repo.head().unwrap().shorthand(), Some("main"));
}

#[test]
fn test_persisted_rows_win_over_recomputed_ones() {
    let temp_dir = TempDir::new().unwrap();
    let ids = setup_history(temp_dir.path());
    let config = test_config(temp_dir.path(), DiffMode::Objects, vec![alice()]);

    // an earlier run recorded different numbers for the same commit
    let mut earlier = Workbook::default();
    let stale = CommitRow::new(
        &descriptor(&ids[1]),
        LineTotals::from_changes(
            &[FileChange {
                path: "lib/foo.py".to_string(),
                added: 40,
                removed: 0,
                binary: false,
            }],
            &config.filter,
        ),
        None,
    );
    earlier.merge("alice", false, vec![stale]);
    earlier.save(&config.excel_file).unwrap();

    run_with(&config, |_| Ok(vec![descriptor(&ids[1]), descriptor(&ids[2])])).unwrap();

    let workbook = Workbook::load(&config.excel_file).unwrap();
    let rows = &workbook.sheet("alice").unwrap().rows;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].lines_added, 40);
    assert_eq!(rows[1].commit, ids[2].to_string());
}

#[test]
fn test_recorded_commits_are_not_inspected_again() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let ids = setup_history(root);
    let config = test_config(root, DiffMode::Checkout, vec![alice()]);

    // recorded by an earlier run against a clone that has since been re-cloned
    let mut gone = descriptor(&ids[0]);
    gone.sha = "0123456789abcdef0123456789abcdef01234567".to_string();
    let mut earlier = Workbook::default();
    earlier.merge(
        "alice",
        false,
        vec![CommitRow::new(&gone, LineTotals { added: 5, removed: 0 }, None)],
    );
    earlier.save(&config.excel_file).unwrap();

    let summaries = run_with(&config, |_| Ok(vec![gone.clone(), descriptor(&ids[2])])).unwrap();

    assert_eq!(summaries[0].fetched, 2);
    assert_eq!(summaries[0].added, 1);
    assert_eq!(summaries[0].not_in_clone, 0, "the recorded commit is never looked up");
    assert_eq!(summaries[0].total, 2);

    let workbook = Workbook::load(&config.excel_file).unwrap();
    let rows = &workbook.sheet("alice").unwrap().rows;
    assert_eq!(rows[0].lines_added, 5);
    assert_eq!(rows[1].commit, ids[2].to_string());
}
