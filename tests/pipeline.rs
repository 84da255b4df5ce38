#![cfg(unix)]

use std::cell::RefCell;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use bbin::*;

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Pretends to be git: "cloning" writes a fixed set of files.
#[derive(Clone, Default)]
struct FixtureVcs {
    files: Vec<(String, Vec<u8>)>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl SourceControl for FixtureVcs {
    fn clone_repo(&self, url: &str, directory: &Path) -> Result<()> {
        self.calls.borrow_mut().push(format!("clone {url}"));
        std::fs::create_dir_all(directory)?;
        for (name, content) in &self.files {
            std::fs::write(directory.join(name), content)?;
        }
        Ok(())
    }

    fn pull(&self, _directory: &Path) -> Result<()> {
        self.calls.borrow_mut().push("pull".to_string());
        Ok(())
    }

    fn checkout(&self, _directory: &Path, revision: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("checkout {revision}"));
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    paths: IndexPaths,
    calls: Rc<RefCell<Vec<String>>>,
    index: Index<FixtureVcs>,
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn fixture(manifest: &str, files: &[(&str, &[u8])]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let paths = IndexPaths::new(
        dir.path().join("index"),
        dir.path().join("bin"),
        dir.path().join("app"),
    );
    std::fs::create_dir_all(paths.root()).unwrap();
    std::fs::write(
        paths.index_file(),
        r#"{"hello": "https://example.com/hello.git"}"#,
    )
    .unwrap();

    let tools = dir.path().join("tools");
    std::fs::create_dir_all(&tools).unwrap();
    write_script(&tools, "fakecc", "exit 0");
    write_script(&tools, "failcc", "echo \"compiling $*\"\necho 'error: boom' 1>&2\nexit 1");

    let mut vcs = FixtureVcs::default();
    vcs.files.push(("package.json".to_string(), manifest.as_bytes().to_vec()));
    for (name, content) in files {
        vcs.files.push((name.to_string(), content.to_vec()));
    }
    let calls = vcs.calls.clone();
    let index = Index::open(
        paths.clone(),
        "https://example.com/index.git",
        vcs,
        SearchPath::new([tools]),
        Platform::new("linux", "99.99"),
    )
    .unwrap();
    Fixture { dir, paths, calls, index }
}

fn manifest(compiler: &str, build: &str, hashes: &str) -> String {
    format!(
        r#"{{
            "version": "v1.0.0",
            "compiler": {compiler},
            "build": {build},
            "hashes": {hashes},
            "target": "out"
        }}"#
    )
}

fn default_manifest(hash: &str) -> String {
    manifest(
        r#"{"name": ["fakecc"]}"#,
        r#"{"linux": {"generic": ["true"]}}"#,
        &format!(r#"{{"linux": {{"generic": "{hash}"}}}}"#),
    )
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn test_successful_build_is_verified_and_installed() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    let report = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap();

    assert_eq!(report.verification, Some(Verification::Matched));
    assert_eq!(report.package.as_deref(), Some("hello"));
    assert_eq!(report.installed, f.paths.bin().join("out"));
    assert!(report.installed.exists());
    // moved out of the checkout
    assert!(!f.paths.repos().join("hello").join("out").exists());
    assert_eq!(
        *f.calls.borrow(),
        vec!["clone https://example.com/hello.git", "checkout v1.0.0"]
    );
}

#[test]
fn test_missing_generic_fails_before_build() {
    let json = manifest(
        r#"{"name": ["failcc"]}"#,
        r#"{"linux": {"20.04": ["main.c"]}}"#,
        r#"{"linux": {"generic": "00"}}"#,
    );
    let f = fixture(&json, &[("out", b"")]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();

    assert!(err.is_unsupported_platform());
    assert!(matches!(err, BbinError::VersionNotSupported { .. }));
    assert_eq!(err.category(), FailureCategory::Manifest);
    assert!(dir_is_empty(&f.paths.build_logs()));
    assert!(!f.calls.borrow().iter().any(|c| c.starts_with("checkout")));
}

#[test]
fn test_unknown_platform_fails_before_build() {
    let json = manifest(
        r#"{"name": ["fakecc"]}"#,
        r#"{"darwin": {"generic": ["true"]}}"#,
        r#"{"darwin": {"generic": "00"}}"#,
    );
    let f = fixture(&json, &[("out", b"")]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();
    assert!(matches!(err, BbinError::PlatformNotSupported { .. }));
}

#[test]
fn test_failed_build_writes_log() {
    let json = manifest(
        r#"{"name": ["failcc"]}"#,
        r#"{"linux": {"generic": ["main.c"]}}"#,
        &format!(r#"{{"linux": {{"generic": "{EMPTY_SHA256}"}}}}"#),
    );
    let f = fixture(&json, &[]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();

    let log = match &err {
        BbinError::BuildFailed { log } => log.clone(),
        other => panic!("unexpected error: {other:?}"),
    };
    assert!(log.starts_with(f.paths.build_logs()));
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("compiling main.c"));
    assert!(content.contains("error: boom"));
    assert!(err.to_string().contains(&log.display().to_string()));
    assert!(!err.to_string().contains("error: boom"));
    assert!(dir_is_empty(f.paths.bin()));
}

#[test]
fn test_unknown_package_creates_nothing() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    let err = f
        .index
        .run(&Installable::Package("nope".to_string()), InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, BbinError::UnknownPackage(_)));
    assert_eq!(err.category(), FailureCategory::Configuration);
    assert!(dir_is_empty(&f.paths.repos()));
    assert!(f.calls.borrow().is_empty());
}

#[test]
fn test_missing_compiler_never_builds() {
    let json = manifest(
        r#"{"for": "cpp"}"#,
        r#"{"linux": {"generic": ["main.cpp", "-o", "out"]}}"#,
        &format!(r#"{{"linux": {{"generic": "{EMPTY_SHA256}"}}}}"#),
    );
    let f = fixture(&json, &[]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, BbinError::ToolNotFound(_)));
    assert_eq!(err.category(), FailureCategory::Build);
    assert!(dir_is_empty(&f.paths.build_logs()));
    assert!(!f.paths.repos().join("hello").join("out").exists());
}

#[test]
fn test_checksum_mismatch_blocks_install() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"tampered")]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, BbinError::ChecksumMismatch { .. }));
    assert_eq!(err.category(), FailureCategory::Verification);
    assert!(dir_is_empty(f.paths.bin()));
}

#[test]
fn test_checksum_mismatch_can_be_allowed() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"tampered")]);
    let options = InstallOptions {
        allow_checksum_mismatch: true,
        ..Default::default()
    };
    let report = f
        .index
        .run(&Installable::Package("hello".to_string()), options)
        .unwrap();

    assert!(matches!(report.verification, Some(Verification::Mismatched { .. })));
    assert_eq!(std::fs::read(report.installed).unwrap(), b"tampered");
}

#[test]
fn test_missing_target() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();
    assert!(matches!(err, BbinError::TargetMissing(_)));
}

#[test]
fn test_missing_manifest() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[]);
    // this repository ships no package.json at all
    let index = Index::new(
        f.paths.clone(),
        FixtureVcs::default(),
        SearchPath::default(),
        Platform::new("linux", "99.99"),
    );
    let err = index
        .run(
            &Installable::Url("https://example.com/bare.git".to_string()),
            InstallOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, BbinError::ManifestMissing(_)));
    assert_eq!(err.category(), FailureCategory::Manifest);
    assert!(f.paths.repos().join("bare").is_dir());
}

#[test]
fn test_invalid_manifest() {
    let f = fixture(r#"{"version": "v1"}"#, &[]);
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();
    assert!(matches!(err, BbinError::ManifestInvalid(_)));
}

#[test]
fn test_already_installed() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    std::fs::create_dir_all(f.paths.repos().join("hello")).unwrap();
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();
    assert!(matches!(err, BbinError::AlreadyInstalled(_)));
    assert_eq!(err.category(), FailureCategory::Acquisition);
}

#[test]
fn test_url_install_with_symlink() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    let options = InstallOptions {
        strategy: PlacementStrategy::Symlink,
        ..Default::default()
    };
    let report = f
        .index
        .run(&Installable::Url("https://example.com/tools/hello.git".to_string()), options)
        .unwrap();

    let source = f.paths.repos().join("hello").join("out");
    assert!(source.exists());
    assert_eq!(
        std::fs::canonicalize(&report.installed).unwrap(),
        std::fs::canonicalize(&source).unwrap()
    );
}

#[test]
fn test_executable_install_skips_build() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[]);
    let exe: PathBuf = f.dir.path().join("prebuilt");
    write_script(f.dir.path(), "prebuilt", "echo hi");
    let options = InstallOptions {
        strategy: PlacementStrategy::Copy,
        ..Default::default()
    };
    let report = f.index.run(&Installable::Executable(exe.clone()), options).unwrap();

    assert_eq!(report.package, None);
    assert_eq!(report.verification, None);
    assert!(exe.exists());
    assert_eq!(std::fs::read(&exe).unwrap(), std::fs::read(&report.installed).unwrap());
    assert!(f.calls.borrow().is_empty());
}

#[test]
fn test_destination_conflict_fails_closed() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    std::fs::write(f.paths.bin().join("out"), b"existing").unwrap();
    let err = f
        .index
        .run(&Installable::Package("hello".to_string()), InstallOptions::default())
        .unwrap_err();

    assert!(matches!(err, BbinError::DestinationExists(_)));
    assert_eq!(std::fs::read(f.paths.bin().join("out")).unwrap(), b"existing");
}

#[test]
fn test_trace_ends_in_done() {
    let f = fixture(&default_manifest(EMPTY_SHA256), &[("out", b"")]);
    let (trace, result) = f
        .index
        .run_traced(&Installable::Package("hello".to_string()), InstallOptions::default());
    assert!(result.is_ok());
    assert_eq!(
        trace,
        vec![
            Stage::ResolveSource,
            Stage::Acquire,
            Stage::ParseManifest,
            Stage::PinVersion,
            Stage::ResolveTool,
            Stage::Build,
            Stage::Verify,
            Stage::Install,
            Stage::Done,
        ]
    );
}

#[test]
fn test_trace_records_failed_stage() {
    let json = manifest(
        r#"{"for": "cpp"}"#,
        r#"{"linux": {"generic": ["main.cpp", "-o", "out"]}}"#,
        &format!(r#"{{"linux": {{"generic": "{EMPTY_SHA256}"}}}}"#),
    );
    let f = fixture(&json, &[]);
    let (trace, result) = f
        .index
        .run_traced(&Installable::Package("hello".to_string()), InstallOptions::default());
    assert!(matches!(result, Err(BbinError::ToolNotFound(_))));
    assert_eq!(trace.last(), Some(&Stage::Failed));
    assert_eq!(trace[trace.len() - 2], Stage::ResolveTool);
    assert!(!trace.contains(&Stage::Build));
    assert!(!trace.contains(&Stage::Done));

    let (trace, _) = f
        .index
        .run_traced(&Installable::Package("nope".to_string()), InstallOptions::default());
    assert_eq!(trace, vec![Stage::ResolveSource, Stage::Failed]);
}
