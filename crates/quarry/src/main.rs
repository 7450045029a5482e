use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use quarry_core::engine::{CliEngine, Engine, VersionCheck};
use quarry_core::sarif_fix::fix_invalid_notifications_in_file;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Driver for the quarry static analysis engine", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the engine is a supported version and print it.
    Version(VersionArgs),

    /// List the analysis languages the engine installation provides.
    ResolveLanguages(ResolveLanguagesArgs),

    /// Remove duplicate notification locations from a SARIF file.
    FixSarif(FixSarifArgs),
}

#[derive(Parser, Debug)]
struct VersionArgs {
    /// Path to the engine executable.
    #[arg(long)]
    engine: PathBuf,

    /// Print the version even if the engine is older than the supported
    /// minimum.
    #[arg(long)]
    skip_version_check: bool,
}

#[derive(Parser, Debug)]
struct ResolveLanguagesArgs {
    /// Path to the engine executable.
    #[arg(long)]
    engine: PathBuf,

    /// Use the extended resolution format (needs a newer engine).
    #[arg(long)]
    better: bool,
}

#[derive(Parser, Debug)]
struct FixSarifArgs {
    /// SARIF file to repair. Never rewritten in place.
    #[arg(long)]
    input: PathBuf,

    /// Where the repaired document is written.
    #[arg(long)]
    output: PathBuf,
}

fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("initialize async runtime")?;

    match cli.command {
        Commands::Version(args) => {
            runtime.block_on(cmd_version(args))?;
            Ok(0)
        }
        Commands::ResolveLanguages(args) => {
            runtime.block_on(cmd_resolve_languages(args))?;
            Ok(0)
        }
        Commands::FixSarif(args) => {
            cmd_fix_sarif(args)?;
            Ok(0)
        }
    }
}

/// Initialize tracing/logging based on CLI flags.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

async fn cmd_version(args: VersionArgs) -> Result<()> {
    let check = if args.skip_version_check {
        VersionCheck::Skip
    } else {
        VersionCheck::Required
    };
    let engine = CliEngine::builder(args.engine.display().to_string())
        .version_check(check)
        .build()
        .await?;

    println!("{}", engine.version().await?);
    Ok(())
}

async fn cmd_resolve_languages(args: ResolveLanguagesArgs) -> Result<()> {
    let engine = CliEngine::builder(args.engine.display().to_string())
        .build()
        .await?;

    let rendered = if args.better {
        let output = engine.better_resolve_languages().await?;
        serde_json::to_string_pretty(&output).context("render language listing")?
    } else {
        let output = engine.resolve_languages().await?;
        serde_json::to_string_pretty(&output).context("render language listing")?
    };
    println!("{rendered}");
    Ok(())
}

fn cmd_fix_sarif(args: FixSarifArgs) -> Result<()> {
    fix_invalid_notifications_in_file(&args.input, &args.output)?;
    debug!(
        "Repaired {} into {}",
        args.input.display(),
        args.output.display()
    );
    Ok(())
}
