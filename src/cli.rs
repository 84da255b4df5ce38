use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};
use bbin::{Overrides, PlacementStrategy};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about = "A binary package manager", long_about = None)]
pub struct CLI {
    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub(crate) command: BbinCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum BbinCommand {
    /// Install a package
    Install {
        /// A package name from the index, `git+<url>.git`, or the path to a built executable
        installable: String,
        /// How the executable is placed into the binary directory
        #[clap(long, value_enum, ignore_case = true, default_value_t = PlacementStrategy::Move)]
        action: PlacementStrategy,
        /// Replace an existing file of the same name in the binary directory
        #[clap(long)]
        force: bool,
        /// Install even if the built executable does not match its checksum
        #[clap(long)]
        allow_checksum_mismatch: bool,
        #[command(flatten)]
        dirs: DirArgs,
    },
    /// Print the index, binary and app directories
    Paths {
        #[command(flatten)]
        dirs: DirArgs,
    },
}

#[derive(Debug, Args, Clone, PartialEq, Default)]
pub struct DirArgs {
    /// Index root holding index.json, repos/ and build_logs/
    #[clap(long, env = "BBIN_INDEX_DIR")]
    pub index_dir: Option<PathBuf>,
    /// Directory installed executables are placed in
    #[clap(long, env = "BBIN_BIN_DIR")]
    pub bin_dir: Option<PathBuf>,
    /// Directory for installed applications
    #[clap(long, env = "BBIN_APP_DIR")]
    pub app_dir: Option<PathBuf>,
    /// Git URL of the package index
    #[clap(long, env = "BBIN_INDEX_URL")]
    pub index_url: Option<String>,
    /// Config file to read instead of the default bbin.toml
    #[clap(long, env = "BBIN_CONFIG")]
    pub config: Option<PathBuf>,
}

impl From<DirArgs> for Overrides {
    fn from(dirs: DirArgs) -> Overrides {
        Overrides {
            index_url: dirs.index_url,
            index_dir: dirs.index_dir,
            bin_dir: dirs.bin_dir,
            app_dir: dirs.app_dir,
            config: dirs.config,
        }
    }
}
