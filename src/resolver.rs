use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{BbinError, Result};
use crate::manifest::CompilerRequirement;

/// Built-in compiler categories and their candidates, in priority order.
pub const COMPILER_MAP: &[(&str, &[&str])] = &[
    ("cpp", &["clang++", "g++"]),
    ("c", &["clang", "gcc"]),
];

/// The directories searched for executables.
///
/// Passed explicitly to everything that looks up tools so tests can point it
/// at a controlled directory instead of the real `PATH`.
/// Relative candidates such as `./build.sh` resolve against the directory set
/// with [`SearchPath::in_dir`], or the process working directory without one.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    paths: Option<OsString>,
    cwd: Option<PathBuf>,
}

impl SearchPath {
    /// Uses the process `PATH`.
    pub fn from_env() -> SearchPath {
        SearchPath {
            paths: std::env::var_os("PATH"),
            cwd: None,
        }
    }

    /// Searches exactly the given directories.
    pub fn new<I, P>(dirs: I) -> SearchPath
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect();
        SearchPath {
            paths: std::env::join_paths(dirs).ok(),
            cwd: None,
        }
    }

    /// Resolves relative candidates against `dir`.
    pub fn in_dir<P: Into<PathBuf>>(mut self, dir: P) -> SearchPath {
        self.cwd = Some(dir.into());
        self
    }

    /// Returns `true` if `dir` is one of the searched directories.
    pub fn contains<P: AsRef<Path>>(&self, dir: P) -> bool {
        match &self.paths {
            Some(paths) => std::env::split_paths(paths).any(|p| p == dir.as_ref()),
            None => false,
        }
    }

    /// Finds `name` on this search path.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let paths = self.paths.as_ref()?;
        let cwd = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        which::which_in(name, Some(paths), cwd).ok()
    }
}

/// Returns the candidates for a compiler category, matched case-insensitively.
pub fn compiler_candidates(category: &str) -> Option<&'static [&'static str]> {
    let category = category.to_lowercase();
    COMPILER_MAP
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, candidates)| *candidates)
}

/// Returns the first candidate found on the search path, honoring order.
pub fn resolve_exe<S: AsRef<str>>(candidates: &[S], search_path: &SearchPath) -> Option<PathBuf> {
    for name in candidates {
        if let Some(path) = search_path.find(name.as_ref()) {
            debug!(candidate = name.as_ref(), path = %path.display(), "resolved executable");
            return Some(path);
        }
    }
    None
}

/// Resolves a manifest compiler requirement to an executable path.
///
/// # Errors
/// [`BbinError::UnknownCompilerCategory`] for a category not in [`COMPILER_MAP`],
/// [`BbinError::ToolNotFound`] when no candidate is installed.
pub fn resolve_compiler(requirement: &CompilerRequirement, search_path: &SearchPath) -> Result<PathBuf> {
    let candidates: Vec<String> = match requirement {
        CompilerRequirement::Category { category } => compiler_candidates(category)
            .ok_or_else(|| BbinError::UnknownCompilerCategory(category.clone()))?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        CompilerRequirement::Candidates { name } => name.clone(),
    };
    resolve_exe(&candidates, search_path).ok_or(BbinError::ToolNotFound(candidates))
}
