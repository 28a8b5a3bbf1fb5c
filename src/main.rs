//! Main entry point for the kiln CLI app

use kiln::archive::{ArchiveStore, DirStore, PakWriter};
use kiln::cli::{self, Commands};
use kiln::cooker::{BypassExtensions, CookReport, Cooker, ReadySignal, Transform};
use kiln::vfs::VfsContext;
use kiln::KilnError;

use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    init_tracing();
    if let Err(e) = run_app() {
        if e.downcast_ref::<clap::Error>().is_none() {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn mount_all(vfs: &mut VfsContext, mounts: &[String]) -> Result<(), KilnError> {
    for mount in mounts {
        vfs.mount(mount)?;
    }
    Ok(())
}

fn print_reports(reports: &[CookReport], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }
    for r in reports {
        println!(
            "{}: added {}, changed {}, deleted {}, cooked {}, bypassed {}, failed {}",
            r.archive.display(),
            r.diff.added.len(),
            r.diff.changed.len(),
            r.diff.deleted.len(),
            r.cooked.len(),
            r.bypassed.len(),
            r.failed.len()
        );
        for (path, reason) in &r.failed {
            println!("  failed {path}: {reason}");
        }
    }
    Ok(())
}

fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::run()?;
    let mut config = cli::get_config_from_opt_or_env(args.config.as_ref())?;

    match args.command {
        Commands::Cook { masks, root, archive, run_async, workers, level, bypass, json } => {
            if let Some(root) = root {
                config.root = root;
            }
            if let Some(archive) = archive {
                config.archive = archive;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }

            let transform = BypassExtensions::new(level, bypass);
            let mut cooker = Cooker::new(config);
            let reports = if run_async {
                let transform: Arc<dyn Transform> = Arc::new(transform);
                let handle = cooker.cook_async(&masks, transform, ReadySignal::ready())?;
                handle.wait()?
            } else {
                vec![cooker.cook(&masks, &transform)?]
            };
            print_reports(&reports, json)?;
        }
        Commands::Ls { mounts } => {
            let mut vfs = VfsContext::with_config(&config);
            mount_all(&mut vfs, &mounts)?;
            for entry in vfs.entries() {
                println!("{:>10}  {}", entry.size, entry.name);
            }
        }
        Commands::Resolve { name, mounts } => {
            let mut vfs = VfsContext::with_config(&config);
            mount_all(&mut vfs, &mounts)?;
            println!("{}", vfs.resolve(&name));
        }
        Commands::Cat { path, mounts } => {
            let mut vfs = VfsContext::with_config(&config);
            mount_all(&mut vfs, &mounts)?;
            let data = vfs.load(&path).ok_or_else(|| format!("'{path}' not found in any mount"))?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Commands::Pack { dir, output } => {
            let mut store = DirStore::open(&dir)?;
            let mut pak = PakWriter::new();
            for index in 0..store.count() {
                let Some(name) = store.name(index).map(str::to_string) else { continue };
                pak.add(&name, store.extract(index)?);
            }
            pak.write_to(&output)?;
            println!("packed {} files into {}", pak.len(), output.display());
        }
    }

    Ok(())
}
