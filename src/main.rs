use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use texref::commands::{self, Format, Options};
use texref::references::ReferenceKind;
use texref::{diagnostics, watch};

/// Exit code for errors that stop a command.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "texref", version, about = "Label and reference checks for LaTeX projects")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Config file to use instead of `.texref.toml` in the root.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Project root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report labels whose prefix does not match their context
    Check,
    /// Rename unconventional labels and every reference to them
    Fix {
        /// Print the edits without writing any file.
        #[arg(long)]
        dry_run: bool,
    },
    /// List every label with its context and conventional name
    Labels,
    /// List every reference found in the project
    Refs {
        /// Only list references of this kind.
        #[arg(long, value_enum)]
        kind: Option<ReferenceKind>,
    },
    /// Re-run check whenever a source file changes
    Watch,
}

/// Route `log` output to stderr, honoring `RUST_LOG` over the flags.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let options = Options {
        config: cli.config,
        format: cli.format,
        root: cli.root,
    };

    let result = match cli.command {
        Commands::Check => commands::check(&options),
        Commands::Fix { dry_run } => commands::fix(&options, dry_run),
        Commands::Labels => commands::labels(&options),
        Commands::Refs { kind } => commands::refs(&options, kind),
        Commands::Watch => watch::run(&options),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_ERROR)
        },
    };
}
