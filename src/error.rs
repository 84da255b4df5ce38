use std::path::PathBuf;
use thiserror::Error;

/// Broad failure classes. Every [`BbinError`] belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Bad user input: unknown package, malformed installable.
    Configuration,
    /// Clone/pull/checkout failures, or the package is already present.
    Acquisition,
    /// The package-authored manifest is missing, invalid or unsupported here.
    Manifest,
    /// No usable tool, a failing build script, or a missing build target.
    Build,
    /// The built binary does not match the manifest checksum.
    Verification,
    /// Placing the executable into the binary directory failed.
    Installation,
}

#[derive(Debug, Error)]
pub enum BbinError {
    #[error("Invalid package name: package `{0}` not found in the index")]
    UnknownPackage(String),

    #[error("Invalid installable `{0}`: {1}")]
    InvalidInstallable(String, String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Acquisition(String),

    #[error("Package `{0}` is already installed")]
    AlreadyInstalled(String),

    #[error("The package.json does not exist for this package. Please consult the maintainer")]
    ManifestMissing(PathBuf),

    #[error("The package.json is invalid ({0}). Please consult the maintainer")]
    ManifestInvalid(String),

    #[error("No {what} available for platform `{platform}`. Please consult the maintainer")]
    PlatformNotSupported { what: &'static str, platform: String },

    #[error("No {what} available for `{platform}` version `{version}` and no generic fallback. Please consult the maintainer")]
    VersionNotSupported {
        what: &'static str,
        platform: String,
        version: String,
    },

    #[error("Build failed: no executable found for any of [{}]", .0.join(", "))]
    ToolNotFound(Vec<String>),

    #[error("Build failed: unknown compiler category `{0}`")]
    UnknownCompilerCategory(String),

    #[error("Build failed! See the build log at {}", .log.display())]
    BuildFailed { log: PathBuf },

    #[error("Could not find target executable at {}", .0.display())]
    TargetMissing(PathBuf),

    #[error("Checksum mismatched for {} (expected {expected}, got {actual})", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Refusing to overwrite existing {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("{} is already installed in place", .0.display())]
    SameFile(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BbinError {
    pub fn category(&self) -> FailureCategory {
        match self {
            BbinError::UnknownPackage(_)
            | BbinError::InvalidInstallable(..)
            | BbinError::Config(_) => FailureCategory::Configuration,
            BbinError::Acquisition(_) | BbinError::AlreadyInstalled(_) => {
                FailureCategory::Acquisition
            }
            BbinError::ManifestMissing(_)
            | BbinError::ManifestInvalid(_)
            | BbinError::PlatformNotSupported { .. }
            | BbinError::VersionNotSupported { .. } => FailureCategory::Manifest,
            BbinError::ToolNotFound(_)
            | BbinError::UnknownCompilerCategory(_)
            | BbinError::BuildFailed { .. }
            | BbinError::TargetMissing(_) => FailureCategory::Build,
            BbinError::ChecksumMismatch { .. } => FailureCategory::Verification,
            BbinError::DestinationExists(_) | BbinError::SameFile(_) | BbinError::Io(_) => {
                FailureCategory::Installation
            }
        }
    }

    /// `true` when the manifest has no build script or checksum for this platform,
    /// whether the platform itself or only its version is missing.
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(
            self,
            BbinError::PlatformNotSupported { .. } | BbinError::VersionNotSupported { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BbinError>;
