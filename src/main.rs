// src/main.rs — vsch entrypoint: parse a process profile, run the
// virtual scheduler against it, print the trace.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vsch::error::SimError;
use vsch::profile;
use vsch::scheduler::sjf::SjfScheduler;
use vsch::sim::Simulation;
use vsch::trace::StdoutSink;

#[derive(Parser)]
#[command(
    name = "vsch",
    version,
    author,
    about = "vsch — deterministic trace of a virtual single-CPU scheduler"
)]
struct Cli {
    /// Path to the process profile to run.
    profile: PathBuf,

    /// Raise the diagnostic log level. Repeatable. Does not affect the
    /// simulation trace itself, only `tracing` diagnostics on stderr.
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Silence diagnostic logging entirely. Does not affect the
    /// simulation trace itself.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn run(cli: Cli) -> Result<(), SimError> {
    let parsed = profile::parse(&cli.profile)?;

    let mut sim = Simulation::new(parsed, SjfScheduler::new(), StdoutSink::new());
    let summary = sim.run();

    tracing::info!(
        ticks = summary.ticks,
        jiffies = summary.jiffies,
        switches = summary.nr_switches,
        "simulation finished"
    );

    Ok(())
}

fn diagnostic_filter(cli: &Cli) -> EnvFilter {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return from_env;
    }
    let level = if cli.quiet {
        "off"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    EnvFilter::new(level)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(diagnostic_filter(&cli))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("vsch: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
