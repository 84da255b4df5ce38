//! The package index and the build pipeline that drives every other module.
//!
//! One invocation walks through [`Stage`]s in a fixed order:
//! resolve source, acquire, parse manifest, pin version, resolve tool,
//! build, verify, install. The first failing stage aborts the rest and the
//! run ends in [`Stage::Failed`] instead of [`Stage::Done`]; nothing is retried.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::build::{self, BuildOutcome, BuildPlan};
use crate::config::Settings;
use crate::error::{BbinError, Result};
use crate::git::SourceControl;
use crate::installer::{InstallDirective, Installer, PlacementStrategy};
use crate::manifest::Manifest;
use crate::platform::Platform;
use crate::resolver::{resolve_compiler, SearchPath};
use crate::util::{self, folder_name_from_url, is_executable};
use crate::verify::{verify_file, Verification};

/// File in the index root mapping package names to git URLs.
pub const INDEX_FILE: &str = "index.json";

/// On-disk layout: the index root (with `index.json`, `repos/` and
/// `build_logs/`), the binary directory and the app directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    root: PathBuf,
    bin: PathBuf,
    app: PathBuf,
}

impl IndexPaths {
    pub fn new<P: Into<PathBuf>>(root: P, bin: P, app: P) -> IndexPaths {
        IndexPaths {
            root: root.into(),
            bin: bin.into(),
            app: app.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> IndexPaths {
        IndexPaths::new(
            settings.index_dir.clone(),
            settings.bin_dir.clone(),
            settings.app_dir.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// One checkout per installed package.
    pub fn repos(&self) -> PathBuf {
        self.root.join("repos")
    }

    /// One file per failed build.
    pub fn build_logs(&self) -> PathBuf {
        self.root.join("build_logs")
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    pub fn app(&self) -> &Path {
        &self.app
    }
}

/// What the user asked to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installable {
    /// A name looked up in `index.json`.
    Package(String),
    /// A git URL, given on the command line as `git+<url>.git`.
    Url(String),
    /// An executable that is already built.
    Executable(PathBuf),
}

impl Installable {
    pub fn parse(value: &str) -> Result<Installable> {
        if let Some(url) = value.strip_prefix("git+") {
            if !url.ends_with(".git") {
                return Err(BbinError::InvalidInstallable(
                    value.to_string(),
                    "git URLs must end with `.git`".to_string(),
                ));
            }
            return Ok(Installable::Url(url.to_string()));
        }
        let path = Path::new(value);
        if is_executable(path) {
            return Ok(Installable::Executable(path.to_path_buf()));
        }
        if value.trim().is_empty() {
            return Err(BbinError::InvalidInstallable(
                value.to_string(),
                "expected a package name, a git+<url>.git or an executable".to_string(),
            ));
        }
        Ok(Installable::Package(value.to_string()))
    }
}

/// Pipeline stages, in the order they run. A run ends in either `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    ResolveSource,
    Acquire,
    ParseManifest,
    PinVersion,
    ResolveTool,
    Build,
    Verify,
    Install,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolveSource => "resolve-source",
            Stage::Acquire => "acquire",
            Stage::ParseManifest => "parse-manifest",
            Stage::PinVersion => "pin-version",
            Stage::ResolveTool => "resolve-tool",
            Stage::Build => "build",
            Stage::Verify => "verify",
            Stage::Install => "install",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Per-invocation choices.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub strategy: PlacementStrategy,
    /// Replace an existing file in the binary directory.
    pub overwrite: bool,
    /// Install even if the checksum does not match, with a warning.
    pub allow_checksum_mismatch: bool,
}

/// A built package waiting to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPackage {
    pub target: PathBuf,
    pub verification: Verification,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Package name, or `None` for a prebuilt executable.
    pub package: Option<String>,
    pub installed: PathBuf,
    /// `None` when nothing was built.
    pub verification: Option<Verification>,
}

/// The package index plus everything needed to build from it.
#[derive(Debug)]
pub struct Index<S: SourceControl> {
    paths: IndexPaths,
    vcs: S,
    search_path: SearchPath,
    platform: Platform,
}

impl<S: SourceControl> Index<S> {
    /// Creates an index over existing directories without touching the filesystem.
    pub fn new(paths: IndexPaths, vcs: S, search_path: SearchPath, platform: Platform) -> Index<S> {
        Index {
            paths,
            vcs,
            search_path,
            platform,
        }
    }

    /// Prepares the layout and returns the index.
    ///
    /// A missing index root is cloned from `index_url`; an index root that is a
    /// git checkout is pulled (a failed pull only warns); a plain directory is
    /// used as is. `repos/`, `build_logs/`, the binary and app directories are created.
    pub fn open(
        paths: IndexPaths,
        index_url: &str,
        vcs: S,
        search_path: SearchPath,
        platform: Platform,
    ) -> Result<Index<S>> {
        if !paths.root().is_dir() {
            util::warn("bbin's index is not initialized! Initializing...");
            vcs.clone_repo(index_url, paths.root())?;
            util::success(&format!("Initialized bbin's index at {}", paths.root().display()));
        } else if paths.root().join(".git").exists() {
            match vcs.pull(paths.root()) {
                Ok(()) => debug!("updated index"),
                Err(e) => util::warn(&format!("could not update the index, using the local copy: {e}")),
            }
        }
        for dir in [paths.repos(), paths.build_logs(), paths.bin().to_path_buf(), paths.app().to_path_buf()] {
            std::fs::create_dir_all(&dir)?;
        }
        if !search_path.contains(paths.bin()) {
            util::warn(&format!(
                "{} is not on your PATH; add it to run installed tools",
                paths.bin().display()
            ));
        }
        Ok(Index::new(paths, vcs, search_path, platform))
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Looks up the git URL of a package in `index.json`.
    pub fn get_url(&self, package: &str) -> Result<Option<String>> {
        let path = self.paths.index_file();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| BbinError::Config(format!("cannot read {}: {e}", path.display())))?;
        let index: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| BbinError::Config(format!("{} is not a valid index: {e}", path.display())))?;
        Ok(index.get(package).cloned())
    }

    /// Clones the package into `repos/<package>` and returns the checkout path.
    pub fn download(&self, package: &str, url: &str) -> Result<PathBuf> {
        let output = self.paths.repos().join(package);
        if output.exists() {
            return Err(BbinError::AlreadyInstalled(package.to_string()));
        }
        util::status(&format!("Cloning {url}"));
        self.vcs.clone_repo(url, &output)?;
        Ok(output)
    }

    /// Runs parse-manifest through verify for a checkout.
    pub fn build(&self, package: &str, checkout: &Path, trace: &mut Vec<Stage>) -> Result<BuiltPackage> {
        enter(trace, Stage::ParseManifest);
        let manifest = Manifest::load(checkout)?;
        let script = manifest.build_script(&self.platform)?;
        let checksum = manifest.checksum(&self.platform)?;
        if !manifest.deps.is_empty() {
            debug!(deps = ?manifest.deps, "declared dependencies are not resolved");
        }

        enter(trace, Stage::PinVersion);
        self.vcs.checkout(checkout, &manifest.version)?;

        enter(trace, Stage::ResolveTool);
        let search_path = self.search_path.clone().in_dir(checkout);
        let compiler = resolve_compiler(&manifest.compiler, &search_path)?;

        enter(trace, Stage::Build);
        let plan = BuildPlan::new(compiler, script);
        util::status(&format!("Building (script: {plan})"));
        match build::run(&plan, checkout)? {
            BuildOutcome::Success => util::success("Build succeeded!"),
            BuildOutcome::Failure { output, status } => {
                let log = build::write_build_log(&self.paths.build_logs(), package, &output)?;
                info!(?status, log = %log.display(), "build failed");
                return Err(BbinError::BuildFailed { log });
            }
        }
        let target = checkout.join(&manifest.target);
        if !target.is_file() {
            return Err(BbinError::TargetMissing(target));
        }

        enter(trace, Stage::Verify);
        let verification = verify_file(&target, &checksum)?;
        Ok(BuiltPackage { target, verification })
    }

    /// Places an executable into the binary directory.
    pub fn install(&self, executable: &Path, options: InstallOptions) -> Result<PathBuf> {
        util::status(&format!(
            "Installing {} to {} ({})",
            executable.display(),
            self.paths.bin().display(),
            options.strategy
        ));
        let installer = Installer::new(self.paths.bin()).overwrite(options.overwrite);
        let installed = installer.install(InstallDirective::new(executable, options.strategy))?;
        util::success("Done!");
        Ok(installed)
    }

    /// Runs the whole pipeline for one installable.
    pub fn run(&self, installable: &Installable, options: InstallOptions) -> Result<InstallReport> {
        self.run_traced(installable, options).1
    }

    /// Like [`Index::run`], also returning every stage entered. The last entry
    /// is [`Stage::Done`] on success and [`Stage::Failed`] after an error, with
    /// the stage that failed right before it.
    pub fn run_traced(&self, installable: &Installable, options: InstallOptions) -> (Vec<Stage>, Result<InstallReport>) {
        let mut trace = vec![Stage::ResolveSource];
        let result = self.drive(installable, options, &mut trace);
        match &result {
            Ok(report) => info!(installed = %report.installed.display(), "pipeline finished"),
            Err(e) => {
                let failed_at = trace.last().copied().unwrap_or(Stage::ResolveSource);
                debug!(stage = %failed_at, error = %e, "pipeline failed");
                enter(&mut trace, Stage::Failed);
            }
        }
        (trace, result)
    }

    fn drive(&self, installable: &Installable, options: InstallOptions, trace: &mut Vec<Stage>) -> Result<InstallReport> {
        let (package, url) = match installable {
            Installable::Executable(path) => {
                enter(trace, Stage::Install);
                let installed = self.install(path, options)?;
                enter(trace, Stage::Done);
                return Ok(InstallReport {
                    package: None,
                    installed,
                    verification: None,
                });
            }
            Installable::Package(name) => {
                let url = self
                    .get_url(name)?
                    .ok_or_else(|| BbinError::UnknownPackage(name.clone()))?;
                (name.clone(), url)
            }
            Installable::Url(url) => {
                let name = folder_name_from_url(url).ok_or_else(|| {
                    BbinError::InvalidInstallable(url.clone(), "cannot derive a package name".to_string())
                })?;
                (name, url.clone())
            }
        };

        enter(trace, Stage::Acquire);
        let checkout = self.download(&package, &url)?;
        let built = self.build(&package, &checkout, trace)?;
        match &built.verification {
            Verification::Matched => util::success("Built executable matched checksum!"),
            Verification::Mismatched { expected, actual } => {
                if !options.allow_checksum_mismatch {
                    return Err(BbinError::ChecksumMismatch {
                        path: built.target,
                        expected: expected.clone(),
                        actual: actual.clone(),
                    });
                }
                util::warn(&format!("Checksum mismatched (checksum: {expected}, got {actual})"));
            }
        }

        enter(trace, Stage::Install);
        let installed = self.install(&built.target, options)?;
        enter(trace, Stage::Done);
        Ok(InstallReport {
            package: Some(package),
            installed,
            verification: Some(built.verification),
        })
    }
}

fn enter(trace: &mut Vec<Stage>, next: Stage) {
    if let Some(from) = trace.last() {
        debug!(%from, to = %next, "stage");
    }
    trace.push(next);
}
