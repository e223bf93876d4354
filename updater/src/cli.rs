//! CLI argument definitions for `modsync`.
//!
//! Kept apart from the entrypoint so the argument surface can be unit
//! tested.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Keep plugin packages up to date.
#[derive(Parser, Debug, Default)]
#[command(name = "modsync")]
#[command(version, about)]
#[command(long_about = concat!(
    "Keep plugin packages up to date.\n\n",
    "modsync reads the installed-package catalog of a host, asks the configured ",
    "registries (Thunderstore, GitHub Releases) for newer releases, and installs ",
    "them into the host's directory tree. Overwritten files are moved to a ",
    "timestamped backup folder.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Report available updates without installing:\n",
    "    $ modsync check\n\n",
    "  Update everything:\n",
    "    $ modsync update\n\n",
    "  Update one package:\n",
    "    $ modsync update --package Foo\n\n",
    "  Obtain a GitHub token:\n",
    "    $ modsync auth\n\n",
    "Set RUST_LOG for detailed logs, e.g. RUST_LOG=modsync_updater=debug.",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file [default: platform config directory].
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only print errors.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report available updates (default when no subcommand is given).
    Check(PackageArgs),

    /// Download and install available updates.
    Update(PackageArgs),

    /// List loaded search providers and install handlers.
    Providers,

    /// Obtain a GitHub token through device authorisation.
    Auth,
}

/// Package selection shared by `check` and `update`.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageArgs {
    /// Only process the package with this name.
    #[arg(short, long, value_name = "NAME")]
    pub package: Option<String>,
}

impl Cli {
    /// The subcommand to run, defaulting to `check`.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Check(PackageArgs::default()))
    }

    /// Log filter implied by `-v`/`-q`; `RUST_LOG` still takes precedence.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
