//! # bbin Core Library
//!
//! This crate contains the core logic of `bbin`, a source-based binary package manager.
//!
//! `bbin` looks a package up in a git-hosted index, clones its sources, reads the
//! package's `package.json` manifest, picks the build script and checksum for the
//! running platform, finds a suitable compiler, builds the package, verifies the
//! built executable against the manifest checksum and places it into a binary directory.
//!
//! ## Modules Overview
//! - [`manifest`] – Parsing `package.json` manifests and platform-conditional lookup
//! - [`platform`] – Detecting the platform key and platform version
//! - [`resolver`] – Finding compilers and other tools on the search path
//! - [`build`] – Running build commands and persisting build logs
//! - [`verify`] – SHA-256 checksum verification
//! - [`installer`] – Moving, copying or symlinking executables into the binary directory
//! - [`git`] – The source-control collaborator
//! - [`index`] – The package index and the end-to-end pipeline
//! - [`config`] – Directory and index settings
//! - [`error`] – Categorized errors
//! - [`util`] – Shared utilities (hash formatting, status output, paths)


pub mod error;
pub mod platform;
pub mod manifest;
pub mod resolver;
pub mod build;
pub mod verify;
pub mod installer;
pub mod git;
pub mod index;
pub mod config;
pub mod util;

pub use error::*;
pub use platform::*;
pub use manifest::*;
pub use resolver::*;
pub use build::{BuildOutcome, BuildPlan};
pub use verify::*;
pub use installer::*;
pub use git::*;
pub use index::*;
pub use config::*;
pub use util::*;
