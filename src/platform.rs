//! Platform detection used to pick build scripts and checksums from a manifest.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use regex::Regex;
use tracing::debug;

/// The two-level selector for manifest tables: `key` is the lower-cased OS
/// family (`linux`, `darwin`, `windows`), `version` the OS release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub key: String,
    pub version: String,
}

static CURRENT: OnceLock<Platform> = OnceLock::new();

impl Platform {
    pub fn new(key: &str, version: &str) -> Platform {
        Platform {
            key: key.to_string(),
            version: version.to_string(),
        }
    }

    /// Detects the running platform. Detection happens once per process;
    /// later calls return the cached value.
    pub fn current() -> Platform {
        CURRENT
            .get_or_init(|| {
                let platform = Platform::new(&platform_key(), &platform_version());
                debug!(key = %platform.key, version = %platform.version, "detected platform");
                platform
            })
            .clone()
    }
}

/// Returns the lower-cased OS family name.
pub fn platform_key() -> String {
    match std::env::consts::OS {
        "macos" => "darwin".to_string(),
        os => os.to_lowercase(),
    }
}

/// Returns the OS release version, or an empty string if it cannot be determined.
/// An empty version never matches a manifest entry, so lookups fall back to `generic`.
pub fn platform_version() -> String {
    detect_version().unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn detect_version() -> Option<String> {
    ["/etc/os-release", "/usr/lib/os-release"]
        .iter()
        .find_map(|candidate| read_os_release(candidate).ok())
        .and_then(|info| info.get("VERSION_ID").cloned())
}

#[cfg(target_os = "macos")]
fn detect_version() -> Option<String> {
    command_output("sw_vers", &["-productVersion"])
}

#[cfg(target_os = "windows")]
fn detect_version() -> Option<String> {
    command_output("cmd", &["/C", "ver"]).and_then(|ver| extract_dotted_version(&ver))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn detect_version() -> Option<String> {
    None
}

/// Reads an `os-release(5)` file into a key/value map.
pub fn read_os_release<P: AsRef<Path>>(path: P) -> std::io::Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_os_release(&content))
}

/// Parses `KEY=value` lines, ignoring blanks and comments and stripping
/// one layer of single or double quotes from values.
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    let mut output = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        output.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }
    output
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Pulls the first dotted version number (`10.0.19045`) out of free-form text.
pub fn extract_dotted_version(text: &str) -> Option<String> {
    let re = Regex::new(r"\d+(?:\.\d+)+").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
