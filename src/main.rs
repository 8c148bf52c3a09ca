use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cassian_devtools::{
    Error, SystemRunner,
    cli::{self, Cli},
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli::dispatch(cli.command, &SystemRunner) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Fatal error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `--debug`.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Propagate the failing tool's status when there is one.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map_or(1, Error::exit_code)
}
