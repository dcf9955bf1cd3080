//! Version-control probe: a fixed operation set over the VCS binary.
//!
//! The binary path is resolved once per [`GitCli`] and passed explicitly to
//! every invocation; there is no reliance on process-wide search paths after
//! construction. Every call runs under a timeout and surfaces failures as
//! typed [`VcsError`]s.

use crate::error::VcsError;
use repograph_core::model::normalize_path;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Fixed operation set the evolution engine needs from version control.
pub trait VcsProbe {
    /// Current HEAD commit as a 40-hex SHA.
    fn head_sha(&self, repo: &Path) -> Result<String, VcsError>;
    /// Current branch name, or `""` when detached.
    fn current_branch(&self, repo: &Path) -> Result<String, VcsError>;
    /// The repository's default branch (`main`, `master`, …).
    fn default_branch(&self, repo: &Path) -> Result<String, VcsError>;
    fn merge_base(&self, repo: &Path, a: &str, b: &str) -> Result<String, VcsError>;
    /// Raw `--name-status` output for a commit range.
    fn name_status(&self, repo: &Path, range: &str) -> Result<String, VcsError>;
    /// File contents at a revision, or `None` if the path is absent there.
    fn file_at_revision(
        &self,
        repo: &Path,
        rev: &str,
        path: &Path,
    ) -> Result<Option<Vec<u8>>, VcsError>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Subprocess-backed probe over the `git` binary.
pub struct GitCli {
    binary: PathBuf,
    timeout: Duration,
}

impl GitCli {
    /// Resolve the git binary once: `REPOGRAPH_GIT` override, then `$PATH`.
    pub fn locate() -> Result<Self, VcsError> {
        if let Ok(explicit) = std::env::var("REPOGRAPH_GIT") {
            let path = PathBuf::from(explicit);
            if path.is_file() {
                return Ok(Self::with_binary(path));
            }
            return Err(VcsError::BinaryNotFound(format!(
                "REPOGRAPH_GIT points at {}, which does not exist",
                path.display()
            )));
        }
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        for dir in std::env::split_paths(&path_var) {
            for name in ["git", "git.exe"] {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(Self::with_binary(candidate));
                }
            }
        }
        Err(VcsError::BinaryNotFound("no `git` on PATH".to_string()))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run git under the timeout, returning stdout on success.
    fn run(&self, repo: &Path, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let command_line = format!("git {}", args.join(" "));
        tracing::debug!(command = %command_line, repo = %repo.display(), "vcs call");

        let mut child = Command::new(&self.binary)
            .arg("-C")
            .arg(repo)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VcsError::Launch {
                command: command_line.clone(),
                source,
            })?;

        // Drain pipes on reader threads so a chatty subprocess cannot
        // deadlock against a full pipe buffer while we poll for exit.
        let stdout_handle = child.stdout.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_handle = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(VcsError::Timeout {
                            command: command_line,
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(source) => {
                    return Err(VcsError::Launch {
                        command: command_line,
                        source,
                    });
                }
            }
        };

        let stdout = stdout_handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = stderr_handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(VcsError::Command {
                command: command_line,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            })
        }
    }

    fn run_text(&self, repo: &Path, args: &[&str]) -> Result<String, VcsError> {
        let bytes = self.run(repo, args)?;
        String::from_utf8(bytes)
            .map_err(|_| VcsError::Malformed("non-UTF-8 output".to_string()))
    }
}

impl VcsProbe for GitCli {
    fn head_sha(&self, repo: &Path) -> Result<String, VcsError> {
        let sha = self.run_text(repo, &["rev-parse", "HEAD"])?.trim().to_string();
        if sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(sha)
        } else {
            Err(VcsError::Malformed(format!("`{sha}` is not a 40-hex SHA")))
        }
    }

    fn current_branch(&self, repo: &Path) -> Result<String, VcsError> {
        let name = self
            .run_text(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string();
        // Detached HEAD reports itself as the literal "HEAD".
        if name == "HEAD" { Ok(String::new()) } else { Ok(name) }
    }

    fn default_branch(&self, repo: &Path) -> Result<String, VcsError> {
        if let Ok(symref) =
            self.run_text(repo, &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
        {
            let symref = symref.trim();
            if let Some(branch) = symref.strip_prefix("origin/") {
                return Ok(branch.to_string());
            }
        }
        for candidate in ["main", "master"] {
            let refname = format!("refs/heads/{candidate}");
            if self
                .run(repo, &["rev-parse", "--verify", "--quiet", &refname])
                .is_ok()
            {
                return Ok(candidate.to_string());
            }
        }
        Ok("main".to_string())
    }

    fn merge_base(&self, repo: &Path, a: &str, b: &str) -> Result<String, VcsError> {
        Ok(self.run_text(repo, &["merge-base", a, b])?.trim().to_string())
    }

    fn name_status(&self, repo: &Path, range: &str) -> Result<String, VcsError> {
        self.run_text(repo, &["diff", "--name-status", range])
    }

    fn file_at_revision(
        &self,
        repo: &Path,
        rev: &str,
        path: &Path,
    ) -> Result<Option<Vec<u8>>, VcsError> {
        let spec = format!("{rev}:{}", normalize_path(path));
        match self.run(repo, &["show", &spec]) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(VcsError::Command { stderr, .. })
                if stderr.contains("does not exist")
                    || stderr.contains("exists on disk, but not in") =>
            {
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_binary_errors() {
        // An override pointing nowhere must fail loudly, not fall through.
        unsafe { std::env::set_var("REPOGRAPH_GIT", "/definitely/not/here/git") };
        let result = GitCli::locate();
        unsafe { std::env::remove_var("REPOGRAPH_GIT") };
        assert!(matches!(result, Err(VcsError::BinaryNotFound(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_timeout_kills_subprocess() {
        use std::os::unix::fs::PermissionsExt as _;

        // A script that ignores its arguments and hangs stands in for a
        // stuck VCS binary.
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fakegit");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = GitCli::with_binary(script).with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let result = cli.run(tmp.path(), &["status"]);
        assert!(matches!(result, Err(VcsError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
