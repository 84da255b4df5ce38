use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};
use crate::error::Result;

/// A build command: the resolved compiler followed by the manifest's build tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    program: PathBuf,
    args: Vec<String>,
}

impl BuildPlan {
    pub fn new(compiler: PathBuf, script: Vec<String>) -> BuildPlan {
        BuildPlan {
            program: compiler,
            args: script,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// All tokens, compiler first.
    pub fn tokens(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl std::fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens().join(" "))
    }
}

/// Result of one build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build command exited with status 0.
    Success,
    /// The build command failed. `output` is stdout and stderr interleaved;
    /// `status` is `None` if the process never started or was killed by a signal.
    Failure { output: String, status: Option<i32> },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }
}

/// Runs the plan in `working_dir` and waits for it to finish.
///
/// Standard error is sent to the same file as standard output so the captured
/// log keeps the order in which the tool wrote it. No timeout is applied.
pub fn run(plan: &BuildPlan, working_dir: &Path) -> Result<BuildOutcome> {
    info!(command = %plan, cwd = %working_dir.display(), "running build");
    let mut capture = tempfile::tempfile()?;
    let status = Command::new(plan.program())
        .args(plan.args())
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(capture.try_clone()?))
        .stderr(Stdio::from(capture.try_clone()?))
        .status();

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return Ok(BuildOutcome::Failure {
                output: format!("failed to start `{}`: {e}\n", plan.program().display()),
                status: None,
            });
        }
    };
    debug!(?status, "build finished");
    if status.success() {
        return Ok(BuildOutcome::Success);
    }

    capture.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    capture.read_to_end(&mut bytes)?;
    Ok(BuildOutcome::Failure {
        output: String::from_utf8_lossy(&bytes).into_owned(),
        status: status.code(),
    })
}

/// Writes build output to a new, uniquely named file in `log_dir` and returns its path.
pub fn write_build_log(log_dir: &Path, package: &str, output: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{package}-"))
        .suffix(".log")
        .tempfile_in(log_dir)?;
    file.write_all(output.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
