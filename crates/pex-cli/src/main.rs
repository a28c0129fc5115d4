use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{
    collect::{self, CollectArgs},
    materialize::{self, MaterializeArgs},
    pack::{self, PackArgs},
    remote_worker::{self, RemoteWorkerArgs},
    resolve::{self, ResolveArgs},
    run::{self, RunArgs},
};

mod commands;

const DEFAULT_FILTER: &str = "pex=info,pex_run=info,pex_qoi=info,pex_sample=info,pex_doc=warn";

#[derive(Parser, Debug)]
#[command(name = "pex", version, about = "Parameter exploration for external simulators")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample, run and aggregate a study.
    Run(RunArgs),
    /// Write every variant into the workspace without running anything.
    Materialize(MaterializeArgs),
    /// Rebuild tables and the report from an existing workspace.
    Collect(CollectArgs),
    /// Resolve an address inside a document and print the value found.
    Resolve(ResolveArgs),
    /// Zip a directory tree.
    Pack(PackArgs),
    /// Run a shipped bundle on this host.
    RemoteWorker(RemoteWorkerArgs),
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn dispatch(command: Command) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Command::Run(args) => run::run(&args),
        Command::Materialize(args) => materialize::run(&args),
        Command::Collect(args) => collect::run(&args),
        Command::Resolve(args) => resolve::run(&args),
        Command::Pack(args) => pack::run(&args),
        Command::RemoteWorker(args) => remote_worker::run(&args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "pex failed");
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
