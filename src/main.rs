#![warn(
    clippy::pedantic,
    clippy::nursery,
    clippy::style,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod config;
mod dispatcher;
mod error;
mod output;
mod payload;
mod smax;

use std::process::ExitCode;

use anyhow::Context;
use clap::CommandFactory;

use config::{Cli, ConnectionConfig};
use dispatcher::ActionDispatcher;
use error::{DispatchError, RequestError};
use smax::RequestPipeline;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let matches = match Cli::command().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            err.print().context("Failed to print usage")?;
            return Ok(code);
        }
    };

    let cli = Cli::from_matches(&matches)?;

    let config = match ConnectionConfig::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            println!("ERROR: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let pipeline =
        RequestPipeline::new(&config, "SmaxClient/0.1").context("Failed to create SMAX client")?;
    let dispatcher = ActionDispatcher::new(&config, &pipeline);

    let result = match dispatcher.run().await {
        Ok(result) => result,
        Err(DispatchError::Request(err)) => {
            if let RequestError::HttpStatus { body, .. } = &err {
                tracing::debug!(%body, "Response body");
            }
            tracing::error!(error = %err, "Action {} failed", config.action);
            RequestError::SENTINEL.to_string()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Action {} failed", config.action));
        }
    };

    println!("**************Response:********************");
    println!("{result}");

    Ok(ExitCode::SUCCESS)
}
