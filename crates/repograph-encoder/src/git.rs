//! Git subprocess runner.
//!
//! Every invocation carries a deadline and runs under a small semaphore so
//! bulk diff parsing cannot fork-storm the machine. Non-zero exits surface
//! the exit code and stderr; timeouts surface as retriable errors.

use repograph_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt as _;
use tokio::sync::Semaphore;
use tracing::debug;

/// Runs git commands inside one repository.
#[derive(Clone)]
pub struct GitRunner {
    root: PathBuf,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_limits(root, 4, Duration::from_secs(30))
    }

    pub fn with_limits(root: impl Into<PathBuf>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `git <args>` and return trimmed stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::External("git semaphore closed".to_string()))?;

        debug!("git {}", args.join(" "));
        let mut child = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::External(format!("failed to spawn git: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External("git stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::External("git stderr unavailable".to_string()))?;

        let command = format!("git {}", args.join(" "));
        let result = tokio::time::timeout(self.timeout, async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, _, _) = tokio::try_join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
            )?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        let (status, out, err) = match result {
            Ok(Ok(triple)) => triple,
            Ok(Err(e)) => return Err(Error::External(format!("{command}: {e}"))),
            Err(_) => return Err(Error::Timeout(command)),
        };

        if !status.success() {
            return Err(Error::Git {
                command,
                code: status.code(),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out).trim_end().to_string())
    }

    /// HEAD commit sha, or an error outside a git work tree.
    pub async fn head_sha(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    /// Whether the root sits inside a git work tree.
    pub async fn is_work_tree(&self) -> bool {
        matches!(
            self.run(&["rev-parse", "--is-inside-work-tree"]).await,
            Ok(out) if out == "true"
        )
    }

    /// The default branch name from `symbolic-ref refs/remotes/origin/HEAD`,
    /// falling back to the current branch.
    pub async fn default_branch(&self) -> Result<String> {
        match self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"]).await {
            Ok(full) => Ok(full
                .rsplit('/')
                .next()
                .unwrap_or(full.as_str())
                .to_string()),
            Err(_) => self.run(&["symbolic-ref", "--short", "HEAD"]).await,
        }
    }

    pub async fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        self.run(&["merge-base", a, b]).await
    }

    /// File content at a revision via `git show <rev>:<path>`.
    pub async fn show(&self, rev: &str, path: &str) -> Result<String> {
        self.run(&["show", &format!("{rev}:{path}")]).await
    }

    /// `git diff --name-status --no-renames <range> --` raw output.
    pub async fn diff_name_status(&self, range: &str) -> Result<String> {
        self.run(&["diff", "--name-status", "--no-renames", range, "--"])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let status = std::process::Command::new("git")
                .args(args)
                .current_dir(dir)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .expect("git available");
            assert!(status.success(), "git {args:?} failed");
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
    }

    fn commit_all(dir: &Path, message: &str) {
        for args in [
            vec!["add", "-A"],
            vec!["commit", "-q", "-m", message],
        ] {
            let status = std::process::Command::new("git")
                .args(&args)
                .current_dir(dir)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success());
        }
    }

    #[tokio::test]
    async fn test_head_sha_in_fresh_repo() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        commit_all(tmp.path(), "initial");

        let git = GitRunner::new(tmp.path());
        let sha = git.head_sha().await.unwrap();
        assert_eq!(sha.len(), 40);
        assert!(git.is_work_tree().await);
    }

    #[tokio::test]
    async fn test_show_reads_committed_blob() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("a.txt"), "first\n").unwrap();
        commit_all(tmp.path(), "initial");

        let git = GitRunner::new(tmp.path());
        let content = git.show("HEAD", "a.txt").await.unwrap();
        assert_eq!(content, "first");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_code_and_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
        commit_all(tmp.path(), "initial");

        let git = GitRunner::new(tmp.path());
        let err = git.show("HEAD", "missing.txt").await.unwrap_err();
        match err {
            Error::Git { code, stderr, .. } => {
                assert_ne!(code, Some(0));
                assert!(!stderr.is_empty());
            }
            other => panic!("expected git error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_outside_work_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let git = GitRunner::new(tmp.path());
        assert!(!git.is_work_tree().await);
    }

    #[tokio::test]
    async fn test_default_branch_falls_back_to_current() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
        commit_all(tmp.path(), "initial");

        // No origin remote: falls back to the checked-out branch name.
        let git = GitRunner::new(tmp.path());
        let branch = git.default_branch().await.unwrap();
        assert!(!branch.is_empty());
        assert!(!branch.contains('/'));
    }
}
