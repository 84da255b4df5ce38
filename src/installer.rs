use std::fmt;
use std::path::{Path, PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::error::{BbinError, Result};

/// How an executable is placed into the binary directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStrategy {
    /// Relocate the file; the source no longer exists afterwards.
    #[default]
    Move,
    /// Link to the file, which stays where it is.
    Symlink,
    /// Duplicate content, permissions and modification time.
    Copy,
}

impl fmt::Display for PlacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlacementStrategy::Move => "move",
            PlacementStrategy::Symlink => "symlink",
            PlacementStrategy::Copy => "copy",
        };
        write!(f, "{name}")
    }
}

/// An executable waiting to be installed, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallDirective {
    pub source: PathBuf,
    pub strategy: PlacementStrategy,
}

impl InstallDirective {
    pub fn new<P: Into<PathBuf>>(source: P, strategy: PlacementStrategy) -> InstallDirective {
        InstallDirective {
            source: source.into(),
            strategy,
        }
    }
}

/// Prefix of the entries staged in the binary directory before they are
/// renamed onto their final name.
const STAGING_PREFIX: &str = ".bbin-";

/// Places executables into a fixed destination directory.
///
/// By default an existing entry at the destination is an error and nothing
/// is touched. With [`Installer::overwrite`] the new entry is staged next to
/// the destination and renamed over it, so the old entry survives a failed
/// placement. An entry that already is the source is never replaced.
#[derive(Debug, Clone)]
pub struct Installer {
    bin_dir: PathBuf,
    overwrite: bool,
}

impl Installer {
    pub fn new<P: Into<PathBuf>>(bin_dir: P) -> Installer {
        Installer {
            bin_dir: bin_dir.into(),
            overwrite: false,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Installer {
        self.overwrite = overwrite;
        self
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Where `source` ends up once installed.
    pub fn destination_for(&self, source: &Path) -> Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            BbinError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            ))
        })?;
        Ok(self.bin_dir.join(name))
    }

    /// Installs the executable and returns its path inside the binary directory.
    /// Consumes the directive.
    pub fn install(&self, directive: InstallDirective) -> Result<PathBuf> {
        let InstallDirective { source, strategy } = directive;
        let destination = self.destination_for(&source)?;
        if !source.is_file() {
            return Err(BbinError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a file", source.display()),
            )));
        }
        self.check_destination(&source, &destination)?;
        std::fs::create_dir_all(&self.bin_dir)?;

        match strategy {
            PlacementStrategy::Move => self.move_into(&source, &destination)?,
            PlacementStrategy::Symlink => self.symlink_into(&source, &destination)?,
            PlacementStrategy::Copy => self.copy_into(&source, &destination)?,
        }
        info!(%strategy, from = %source.display(), to = %destination.display(), "installed");
        Ok(destination)
    }

    fn check_destination(&self, source: &Path, destination: &Path) -> Result<()> {
        // symlink_metadata so dangling links count as present
        if std::fs::symlink_metadata(destination).is_err() {
            return Ok(());
        }
        if same_file(source, destination) {
            return Err(BbinError::SameFile(destination.to_path_buf()));
        }
        if !self.overwrite {
            return Err(BbinError::DestinationExists(destination.to_path_buf()));
        }
        debug!(path = %destination.display(), "replacing existing destination");
        Ok(())
    }

    fn move_into(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        if std::fs::rename(source, destination).is_ok() {
            return Ok(());
        }
        // rename fails across filesystems
        self.copy_into(source, destination)?;
        std::fs::remove_file(source)
    }

    fn copy_into(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.bin_dir)?
            .into_temp_path();
        copy_file(source, &staged)?;
        staged.persist(destination).map_err(|e| e.error)
    }

    fn symlink_into(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        let target = std::fs::canonicalize(source)?;
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .make_in(&self.bin_dir, |path| symlink_file(&target, path))?;
        staged.persist(destination).map_err(|e| e.error)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn copy_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::copy(source, destination)?;
    let modified = std::fs::metadata(source)?.modified()?;
    // the owner may set timestamps through a read-only handle on unix
    #[cfg(unix)]
    let file = std::fs::File::open(destination)?;
    #[cfg(not(unix))]
    let file = std::fs::OpenOptions::new().write(true).open(destination)?;
    file.set_modified(modified)
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
