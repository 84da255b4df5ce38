use anyhow::Result;
use bbin::{
    Git, Index, IndexPaths, InstallOptions, Installable, PlacementStrategy, Platform, SearchPath,
    Settings, Verification,
};
use crate::cli::{BbinCommand, DirArgs, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    match cli.command {
        BbinCommand::Install {
            installable,
            action,
            force,
            allow_checksum_mismatch,
            dirs,
        } => {
            let options = InstallOptions {
                strategy: action,
                overwrite: force,
                allow_checksum_mismatch,
            };
            execute_install(&installable, options, dirs)
        }
        BbinCommand::Paths { dirs } => {
            execute_paths(dirs)
        }
    }
}

pub fn execute_install(installable: &str, options: InstallOptions, dirs: DirArgs) -> Result<()> {
    let installable = Installable::parse(installable)?;
    let settings = Settings::resolve(dirs.into())?;
    let paths = IndexPaths::from_settings(&settings);
    let search_path = SearchPath::from_env();
    let git = Git::locate(&search_path);
    let platform = Platform::current();

    let index = match installable {
        // a prebuilt executable needs neither the index nor a checkout
        Installable::Executable(_) => Index::new(paths, git, search_path, platform),
        _ => Index::open(paths, &settings.index_url, git, search_path, platform)?,
    };
    let report = index.run(&installable, options)?;

    let name = report.package.as_deref().unwrap_or("executable");
    match (&report.verification, options.strategy) {
        (Some(Verification::Mismatched { .. }), _) => {
            println!("Installed {name} at {} (checksum mismatch ignored)", report.installed.display());
        }
        (_, PlacementStrategy::Symlink) => {
            println!("Linked {name} at {}", report.installed.display());
        }
        _ => {
            println!("Installed {name} at {}", report.installed.display());
        }
    }
    Ok(())
}

pub fn execute_paths(dirs: DirArgs) -> Result<()> {
    let settings = Settings::resolve(dirs.into())?;
    println!("index: {}", settings.index_dir.display());
    println!("bin:   {}", settings.bin_dir.display());
    println!("app:   {}", settings.app_dir.display());
    println!("url:   {}", settings.index_url);
    Ok(())
}
