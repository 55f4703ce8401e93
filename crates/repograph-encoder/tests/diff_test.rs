//! Diff parsing against real git repositories.

use repograph_core::node::EntityType;
use repograph_encoder::diff::parse_commit_range;
use repograph_encoder::git::GitRunner;
use std::path::Path;

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .expect("git available");
    assert!(status.success(), "git {args:?} failed");
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "t@example.com"]);
    git(dir, &["config", "user.name", "t"]);
}

fn commit(dir: &Path, message: &str) -> String {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
    let out = std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .unwrap();
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

#[tokio::test]
async fn test_single_sha_range_diffs_against_parent() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());

    write(
        tmp.path(),
        "src/util.ts",
        "export function kept(a) { return a; }\nexport function dropped(b) { return b; }\n",
    );
    commit(tmp.path(), "first");

    write(
        tmp.path(),
        "src/util.ts",
        "export function kept(a) { return a; }\nexport function added(c) { return c; }\n",
    );
    write(tmp.path(), "src/new.ts", "export function fresh(x) { return x; }\n");
    let second = commit(tmp.path(), "second");

    let runner = GitRunner::new(tmp.path());
    let diff = parse_commit_range(&runner, &second).await.unwrap();

    // Added file: synthetic file entity plus its function.
    let inserted: Vec<&str> = diff.insertions.iter().map(|e| e.id.as_str()).collect();
    assert!(inserted.contains(&"src/new.ts:file:src/new.ts"));
    assert!(inserted.contains(&"src/new.ts:function:fresh"));
    assert!(inserted.contains(&"src/util.ts:function:added"));

    let deleted: Vec<&str> = diff.deletions.iter().map(|e| e.id.as_str()).collect();
    assert!(deleted.contains(&"src/util.ts:function:dropped"));

    // The modified file surfaces as a file-entity modification; `kept` is
    // untouched and absent.
    assert!(
        diff.modifications
            .iter()
            .any(|m| m.new.entity_type == EntityType::File && m.new.file_path == "src/util.ts")
    );
    assert!(
        !diff
            .modifications
            .iter()
            .any(|m| m.new.entity_name == "kept")
    );
}

#[tokio::test]
async fn test_explicit_range_and_entity_modification() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());

    write(
        tmp.path(),
        "lib.py",
        "def stable(a):\n    return a\n\ndef touched(b):\n    return b\n",
    );
    let first = commit(tmp.path(), "first");

    write(
        tmp.path(),
        "lib.py",
        "def stable(a):\n    return a\n\ndef touched(b):\n    return b * 2\n",
    );
    let second = commit(tmp.path(), "second");

    let runner = GitRunner::new(tmp.path());
    let diff = parse_commit_range(&runner, &format!("{first}..{second}"))
        .await
        .unwrap();

    assert!(diff.insertions.is_empty());
    assert!(diff.deletions.is_empty());
    let touched = diff
        .modifications
        .iter()
        .find(|m| m.new.entity_name == "touched")
        .expect("touched modification");
    assert_eq!(touched.old.id, "lib.py:function:touched");
    assert!(touched.new.source_code.as_deref().unwrap().contains("* 2"));
}

#[tokio::test]
async fn test_deleted_file_yields_deletions() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());

    write(tmp.path(), "gone.ts", "export function bye(x) { return x; }\n");
    write(tmp.path(), "keep.ts", "export function hi(x) { return x; }\n");
    commit(tmp.path(), "first");

    std::fs::remove_file(tmp.path().join("gone.ts")).unwrap();
    let second = commit(tmp.path(), "second");

    let runner = GitRunner::new(tmp.path());
    let diff = parse_commit_range(&runner, &second).await.unwrap();

    let deleted: Vec<&str> = diff.deletions.iter().map(|e| e.id.as_str()).collect();
    assert!(deleted.contains(&"gone.ts:file:gone.ts"));
    assert!(deleted.contains(&"gone.ts:function:bye"));
    assert!(diff.insertions.is_empty());
}

#[tokio::test]
async fn test_unsupported_files_silently_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());

    write(tmp.path(), "notes.md", "# before\n");
    write(tmp.path(), "code.ts", "export function f(x) { return x; }\n");
    commit(tmp.path(), "first");

    write(tmp.path(), "notes.md", "# after\n");
    let second = commit(tmp.path(), "second");

    let runner = GitRunner::new(tmp.path());
    let diff = parse_commit_range(&runner, &second).await.unwrap();
    assert!(diff.is_empty());
}

#[tokio::test]
async fn test_injection_guard_rejects_dash_ranges() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    let runner = GitRunner::new(tmp.path());

    for bad in ["-rf", "--upload-pack=evil..HEAD", "HEAD..--exec=x"] {
        let err = parse_commit_range(&runner, bad).await.unwrap_err();
        assert!(matches!(err, repograph_core::Error::InvalidInput(_)));
    }
}

#[tokio::test]
async fn test_unknown_revision_surfaces_git_error() {
    let tmp = tempfile::tempdir().unwrap();
    init_repo(tmp.path());
    write(tmp.path(), "a.ts", "export function a(x) { return x; }\n");
    commit(tmp.path(), "only");

    let runner = GitRunner::new(tmp.path());
    let err = parse_commit_range(&runner, "deadbeef..HEAD").await.unwrap_err();
    match err {
        repograph_core::Error::Git { code, stderr, .. } => {
            assert_ne!(code, Some(0));
            assert!(!stderr.is_empty());
        }
        other => panic!("expected git failure, got {other:?}"),
    }
}
