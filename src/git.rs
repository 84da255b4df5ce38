//! Source-control operations used to fetch the index and package sources.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use crate::error::{BbinError, Result};
use crate::resolver::SearchPath;

/// Fallback git location when `git` is not on the search path.
pub const DEFAULT_GIT_CALLBACK: &str = "/usr/bin/git";

/// The three operations the pipeline needs from a version-control tool.
/// Each call blocks until the tool exits.
pub trait SourceControl {
    fn clone_repo(&self, url: &str, directory: &Path) -> Result<()>;
    fn pull(&self, directory: &Path) -> Result<()>;
    fn checkout(&self, directory: &Path, revision: &str) -> Result<()>;
}

/// Runs the `git` command line tool.
#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
}

impl Git {
    pub fn new<P: Into<PathBuf>>(program: P) -> Git {
        Git {
            program: program.into(),
        }
    }

    /// Finds `git` on the search path, falling back to `BBIN_GIT_CALLBACK`
    /// (default `/usr/bin/git`). The fallback is logged unless `BBIN_NO_WARN_GIT=1`.
    pub fn locate(search_path: &SearchPath) -> Git {
        if let Some(program) = search_path.find("git") {
            debug!(git = %program.display(), "found git");
            return Git::new(program);
        }
        let callback = std::env::var_os("BBIN_GIT_CALLBACK")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GIT_CALLBACK));
        if std::env::var("BBIN_NO_WARN_GIT").as_deref() != Ok("1") {
            warn!(
                "git is not installed; using `{}`. Set BBIN_GIT_CALLBACK to your git executable, \
                 or BBIN_NO_WARN_GIT=1 to silence this warning",
                callback.display()
            );
        }
        Git::new(callback)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[&str], what: &str) -> Result<()> {
        debug!(git = %self.program.display(), ?args, "running git");
        let output = Command::new(&self.program)
            .args(args)
            .arg("--quiet")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BbinError::Acquisition(format!("{what} failed: could not run git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
            return Err(BbinError::Acquisition(format!("{what} failed: {reason}")));
        }
        Ok(())
    }
}

impl SourceControl for Git {
    fn clone_repo(&self, url: &str, directory: &Path) -> Result<()> {
        let directory = directory.to_string_lossy();
        self.run(&["clone", url, &directory], &format!("Cloning {url}"))
    }

    fn pull(&self, directory: &Path) -> Result<()> {
        let directory = directory.to_string_lossy();
        self.run(&["-C", &directory, "pull"], &format!("Pulling {directory}"))
    }

    fn checkout(&self, directory: &Path, revision: &str) -> Result<()> {
        let directory = directory.to_string_lossy();
        self.run(
            &["-C", &directory, "checkout", revision],
            &format!("Checking out {revision} in {directory}"),
        )
    }
}
