use anyhow::{Context, Result};
use scep_client::model::Ignored;
use scep_client::scep::{CmsEngine, HttpTransport};
use scep_client::{commands, resolve};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = run() {
        eprintln!("scep-client error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let engine = CmsEngine;
    let resolved = match resolve(std::env::args_os(), &engine) {
        Ok(resolved) => resolved,
        Err(err) => {
            let informational = err.is_informational();
            match err.into_usage() {
                Ok(usage) => {
                    // clap renders help to stdout and parse errors to stderr.
                    let _ = usage.print();
                    std::process::exit(i32::from(!informational));
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(resolved.common.verbosity.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let operation = resolved.operation.operation();
    for ignored in &resolved.ignored {
        match ignored {
            Ignored::Argument(argument) => warn!("Extra argument '{argument}' ignored"),
            Ignored::Flag(flag) => warn!("Option {flag} has no effect on {operation}"),
        }
    }

    let transport = HttpTransport::new(
        resolved.common.url.clone(),
        resolved.common.proxy.as_ref(),
    )?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")?;
    runtime.block_on(commands::execute(&resolved, &transport, &engine))?;
    Ok(())
}
