//! Tessera CLI: maps application graphs onto a chip mesh and runs them.
//!
//! Provides `tessera check` for validating a project's `tessera.toml`,
//! `tessera map` for compiling a network file to placements, keys, routing
//! tables and tags, and `tessera run` for mapping, loading and running a
//! network on the in-memory virtual board.

#![warn(missing_docs)]

mod check;
mod map;
mod network;
mod pipeline;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Tessera: compile and run spiking networks on a chip mesh.
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Tessera mesh mapper")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `tessera.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the project configuration.
    Check(CheckArgs),
    /// Map a network and print the result.
    Map(MapArgs),
    /// Map, load and run a network on the virtual board.
    Run(RunArgs),
}

/// Arguments for the `tessera check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Network file to validate alongside the configuration.
    pub network: Option<PathBuf>,
}

/// Arguments for the `tessera map` subcommand.
#[derive(Parser, Debug)]
pub struct MapArgs {
    /// Network description (TOML).
    pub network: PathBuf,

    /// Validate the compiled routing tables.
    #[arg(long)]
    pub validate: bool,

    /// Print wall time per mapping stage.
    #[arg(long)]
    pub timings: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `tessera run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Network description (TOML).
    pub network: PathBuf,

    /// Run length in milliseconds; runs until stopped when omitted.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Read provenance back from every core after the run starts.
    #[arg(long)]
    pub provenance: bool,

    /// Print wall time per mapping and execution stage.
    #[arg(long)]
    pub timings: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Output format for results and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let color = match cli.color {
        ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Check(ref args) => check::run(args, &global),
        Command::Map(ref args) => map::run(args, &global),
        Command::Run(ref args) => run::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check_without_network() {
        let cli = Cli::parse_from(["tessera", "check"]);
        match cli.command {
            Command::Check(ref args) => assert!(args.network.is_none()),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn parse_map_with_flags() {
        let cli = Cli::parse_from([
            "tessera",
            "map",
            "net.toml",
            "--validate",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Map(ref args) => {
                assert_eq!(args.network, PathBuf::from("net.toml"));
                assert!(args.validate);
                assert!(!args.timings);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Map command"),
        }
    }

    #[test]
    fn parse_run_defaults_to_unbounded() {
        let cli = Cli::parse_from(["tessera", "run", "net.toml"]);
        match cli.command {
            Command::Run(ref args) => {
                assert!(args.duration.is_none());
                assert!(!args.provenance);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_with_duration() {
        let cli = Cli::parse_from(["tessera", "run", "net.toml", "-d", "50", "--provenance"]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.duration, Some(50.0));
                assert!(args.provenance);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "tessera",
            "--quiet",
            "--color",
            "never",
            "--config",
            "/tmp/project",
            "check",
        ]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config.as_deref(), Some("/tmp/project"));
    }

    #[test]
    fn map_requires_network() {
        assert!(Cli::try_parse_from(["tessera", "map"]).is_err());
    }
}
