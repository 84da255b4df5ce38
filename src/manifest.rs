use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use serde::Deserialize;
use crate::error::{BbinError, Result};
use crate::platform::Platform;

/// File name of the manifest inside a package checkout.
pub const MANIFEST_FILE: &str = "package.json";

/// Key used when no entry exists for the exact platform version.
pub const GENERIC: &str = "generic";

/// Two-level table: platform key -> platform version key -> value.
pub type PlatformTable<T> = HashMap<String, HashMap<String, T>>;

/// The contents of a package's `package.json`.
///
/// A manifest describes how to build and verify exactly one package version.
/// It is read fresh for every build and never written back.
#[derive(Deserialize, Debug, Clone)]
pub struct Manifest {
    /// Source revision (tag, branch or commit) to check out before building.
    pub version: String,
    /// The compiler needed to run the build script.
    pub compiler: CompilerRequirement,
    /// Declared dependencies. Informational only, nothing resolves them.
    #[serde(default)]
    pub deps: Vec<Dependency>,
    /// Build command tokens per platform and platform version.
    pub build: PlatformTable<Vec<String>>,
    /// Hex-encoded SHA-256 of the built target per platform and platform version.
    pub hashes: PlatformTable<String>,
    /// Path of the built executable, relative to the checkout root.
    pub target: PathBuf,
}

/// What the manifest asks for in its `compiler` field.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CompilerRequirement {
    /// `{"for": "cpp"}`: a category looked up in the built-in compiler table.
    Category {
        #[serde(rename = "for")]
        category: String,
    },
    /// `{"name": ["clang", "gcc"]}`: explicit candidates in priority order.
    Candidates { name: Vec<String> },
}

/// A `deps` entry.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

/// Why a [`resolve`] lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The table has no entry for the platform key.
    Platform(String),
    /// The platform exists but has neither the exact version nor `generic`.
    Version { platform: String, version: String },
}

impl ResolveError {
    /// Turns the lookup failure into a manifest error naming the table.
    pub fn into_error(self, what: &'static str) -> BbinError {
        match self {
            ResolveError::Platform(platform) => BbinError::PlatformNotSupported { what, platform },
            ResolveError::Version { platform, version } => BbinError::VersionNotSupported {
                what,
                platform,
                version,
            },
        }
    }
}

/// Looks up `table[platform][version]`, falling back to `table[platform]["generic"]`.
///
/// This is a pure function of its arguments and is used for both the build
/// table and the checksum table.
pub fn resolve<'a, T>(
    table: &'a PlatformTable<T>,
    platform: &str,
    version: &str,
) -> std::result::Result<&'a T, ResolveError> {
    let versions = table
        .get(platform)
        .ok_or_else(|| ResolveError::Platform(platform.to_string()))?;
    versions
        .get(version)
        .or_else(|| versions.get(GENERIC))
        .ok_or_else(|| ResolveError::Version {
            platform: platform.to_string(),
            version: version.to_string(),
        })
}

impl Manifest {
    /// Loads the manifest from a package checkout directory.
    ///
    /// # Errors
    /// [`BbinError::ManifestMissing`] if `package.json` does not exist,
    /// [`BbinError::ManifestInvalid`] if it is not valid JSON or lacks a required key.
    pub fn load<P: AsRef<Path>>(checkout: P) -> Result<Manifest> {
        let path = checkout.as_ref().join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BbinError::ManifestMissing(path));
            }
            Err(e) => return Err(e.into()),
        };
        Manifest::parse(&content)
    }

    /// Parses and validates manifest JSON.
    pub fn parse(content: &str) -> Result<Manifest> {
        let manifest: Manifest = serde_json::from_str(content)
            .map_err(|e| BbinError::ManifestInvalid(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let escapes = self
            .target
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if self.target.as_os_str().is_empty() || escapes {
            return Err(BbinError::ManifestInvalid(format!(
                "target `{}` must be a relative path inside the package",
                self.target.display()
            )));
        }
        if let CompilerRequirement::Candidates { name } = &self.compiler {
            if name.is_empty() {
                return Err(BbinError::ManifestInvalid(
                    "compiler.name must list at least one executable".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Build command tokens for the given platform.
    pub fn build_script(&self, platform: &Platform) -> Result<Vec<String>> {
        resolve(&self.build, &platform.key, &platform.version)
            .cloned()
            .map_err(|e| e.into_error("build script"))
    }

    /// Expected checksum for the given platform.
    pub fn checksum(&self, platform: &Platform) -> Result<String> {
        resolve(&self.hashes, &platform.key, &platform.version)
            .cloned()
            .map_err(|e| e.into_error("hashes"))
    }
}
