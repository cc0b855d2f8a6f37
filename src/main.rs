use std::env::var;

use clap::Parser;
use eyre::Result as EyreResult;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, EnvFilter};

mod cli;

use cli::RootCommand;

#[tokio::main]
async fn main() -> EyreResult<()> {
    let command = RootCommand::parse();
    setup(command.args.verbose)?;

    let cancel_token = CancellationToken::new();
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("interrupted, stopping after the current round");
                    cancel_token.cancel();
                }
                Err(err) => warn!("unable to listen for shutdown signal: {err}"),
            }
        }
    });

    command.run(cancel_token).await
}

fn setup(verbose: u8) -> EyreResult<()> {
    let directives = match var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            let level = match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            };
            format!("disseminator={level},epidemic_dissemination={level}")
        }
    };

    registry()
        .with(EnvFilter::builder().parse(directives)?)
        .with(layer().with_writer(std::io::stderr))
        .init();

    color_eyre::install()?;

    Ok(())
}
