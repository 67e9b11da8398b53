use magicrepos::{ChangeKind, ResetMode};
use pretty_assertions::assert_eq;

mod common;

#[test]
fn clean_repository_reports_clean_status() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "x");
    repo.stage_all()?;
    repo.commit("c1", None)?;

    assert!(repo.status()?.is_clean());

    Ok(())
}

#[test]
fn overwriting_a_committed_file_shows_unstaged_modified() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "x");
    repo.stage("a.txt")?;
    repo.commit("c1", None)?;

    common::write_file(dir.path(), "a.txt", "z");

    let status = repo.status()?;
    assert_eq!(status.unstaged.get("a.txt"), Some(&ChangeKind::Modified));
    assert!(status.staged.is_empty());
    assert!(status.untracked.is_empty());

    Ok(())
}

#[test]
fn untracked_files_are_listed() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "tracked.txt", "t");
    repo.stage("tracked.txt")?;
    repo.commit("c1", None)?;
    common::write_file(dir.path(), "stray.txt", "s");

    let status = repo.status()?;
    assert_eq!(status.untracked, vec!["stray.txt".to_string()]);

    Ok(())
}

#[test]
fn deleting_a_tracked_file_shows_unstaged_deleted() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "x");
    repo.stage("a.txt")?;
    repo.commit("c1", None)?;

    std::fs::remove_file(dir.path().join("a.txt"))?;

    let status = repo.status()?;
    assert_eq!(status.unstaged.get("a.txt"), Some(&ChangeKind::Deleted));

    Ok(())
}

#[test]
fn staged_changes_compare_against_head_tree() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "one");
    repo.stage_all()?;
    repo.commit("c1", None)?;

    common::write_file(dir.path(), "a.txt", "two");
    common::write_file(dir.path(), "b.txt", "fresh");
    repo.stage_all()?;

    let status = repo.status()?;
    assert_eq!(status.staged.get("a.txt"), Some(&ChangeKind::Modified));
    assert_eq!(status.staged.get("b.txt"), Some(&ChangeKind::Added));
    assert!(status.unstaged.is_empty());

    Ok(())
}

#[test]
fn hard_reset_erases_unstaged_changes() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "x");
    repo.stage("a.txt")?;
    repo.commit("c1", None)?;
    common::write_file(dir.path(), "a.txt", "z");

    repo.reset("HEAD", ResetMode::Hard)?;

    assert_eq!(common::read_file(dir.path(), "a.txt"), "x");
    assert!(repo.status()?.is_clean());

    Ok(())
}

#[test]
fn hard_reset_to_an_earlier_commit_restores_its_tree() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "first");
    repo.stage_all()?;
    let first = repo.commit("c1", None)?;

    common::write_file(dir.path(), "a.txt", "second");
    common::write_file(dir.path(), "extra/b.txt", "added later");
    repo.stage_all()?;
    repo.commit("c2", None)?;

    repo.reset(&first.to_hex(), ResetMode::Hard)?;

    assert_eq!(common::read_file(dir.path(), "a.txt"), "first");
    assert!(!dir.path().join("extra").exists());
    assert_eq!(repo.resolve("main")?, Some(first));
    assert!(repo.status()?.is_clean());

    Ok(())
}

#[test]
fn soft_reset_moves_head_only() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "first");
    repo.stage_all()?;
    let first = repo.commit("c1", None)?;

    common::write_file(dir.path(), "a.txt", "second");
    repo.stage_all()?;
    repo.commit("c2", None)?;

    repo.reset(&first.to_hex(), ResetMode::Soft)?;

    // working tree and index keep the newer content
    assert_eq!(common::read_file(dir.path(), "a.txt"), "second");
    assert_eq!(repo.resolve("main")?, Some(first));

    let status = repo.status()?;
    assert_eq!(status.staged.get("a.txt"), Some(&ChangeKind::Modified));

    Ok(())
}

#[test]
fn mixed_reset_rebuilds_index_but_keeps_working_tree() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "first");
    repo.stage_all()?;
    let first = repo.commit("c1", None)?;

    common::write_file(dir.path(), "a.txt", "second");
    repo.stage_all()?;
    repo.commit("c2", None)?;

    repo.reset(&first.to_hex(), ResetMode::Mixed)?;

    // file untouched, index matches the target commit
    assert_eq!(common::read_file(dir.path(), "a.txt"), "second");
    let status = repo.status()?;
    assert!(status.staged.is_empty());
    assert_eq!(status.unstaged.get("a.txt"), Some(&ChangeKind::Modified));

    Ok(())
}

#[test]
fn reset_to_unknown_revision_fails() -> anyhow::Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let repo = common::init_repo(dir.path());

    common::write_file(dir.path(), "a.txt", "x");
    repo.stage_all()?;
    repo.commit("c1", None)?;

    assert!(matches!(
        repo.reset("does-not-exist", ResetMode::Hard),
        Err(magicrepos::Error::NotFound(_))
    ));

    Ok(())
}
