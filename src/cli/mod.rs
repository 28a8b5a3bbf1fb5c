use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::KilnConfig;
use crate::KilnError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file. Falls back to KILN_CONFIG, then to defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Cook every added or changed source into the cook database.
    #[command(alias = "c")]
    Cook {
        /// Glob masks separated by ';' (e.g. "assets/**/*.png;shaders/*").
        #[arg(default_value = "**")]
        masks: String,

        /// Program root the masks are relative to.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Base path of the cook database. Shard i is written to <stem>[i].<ext>.
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Cook on background workers, one database shard per worker.
        #[arg(long = "async")]
        run_async: bool,

        /// Number of workers for --async. [0 = one per core, at most 4]
        #[arg(long)]
        workers: Option<usize>,

        /// Compression level for archived output (0 = store).
        #[arg(long, default_value_t = 6)]
        level: u32,

        /// Extensions that are never archived (e.g. "ogg,mp4").
        #[arg(long, value_delimiter = ',')]
        bypass: Vec<String>,

        /// Print the cook reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the entries of one or more mounts.
    #[command(alias = "l")]
    Ls {
        /// Archives, or directories with a trailing '/'. Later mounts take priority.
        #[arg(required = true)]
        mounts: Vec<String>,
    },

    /// Show which stored entry a loosely written name resolves to.
    Resolve {
        name: String,

        #[arg(required = true)]
        mounts: Vec<String>,
    },

    /// Write a file loaded through the VFS to stdout.
    Cat {
        path: String,

        #[arg(required = true)]
        mounts: Vec<String>,
    },

    /// Pack a directory into a PACK container.
    Pack {
        /// Directory to pack.
        #[arg(required = true)]
        dir: PathBuf,

        /// The output .pak file.
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Loads the configuration from the `--config` option, the `KILN_CONFIG`
/// environment variable or the built-in defaults, in that order.
pub fn get_config_from_opt_or_env(config_opt: Option<&PathBuf>) -> Result<KilnConfig, KilnError> {
    match config_opt {
        Some(path) => KilnConfig::from_file(path),
        None => KilnConfig::from_env(),
    }
}

/// Parses command-line arguments using `clap`.
pub fn run() -> Result<Args, Box<dyn std::error::Error>> {
    Ok(Args::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cook_flags_parse() {
        let args = Args::parse_from(["kiln", "cook", "assets/*.txt", "--async", "--workers", "2", "--bypass", "ogg,.mp4"]);
        match args.command {
            Commands::Cook { masks, run_async, workers, bypass, level, .. } => {
                assert_eq!(masks, "assets/*.txt");
                assert!(run_async);
                assert_eq!(workers, Some(2));
                assert_eq!(bypass, vec!["ogg", ".mp4"]);
                assert_eq!(level, 6);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn mount_commands_require_a_mount() {
        assert!(Args::try_parse_from(["kiln", "ls"]).is_err());
        assert!(Args::try_parse_from(["kiln", "resolve", "a.png"]).is_err());
    }
}
