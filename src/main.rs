//! taskdeck - command-line entry point

use std::process::ExitCode;

use clap::Parser;
use taskdeck::{
    cli::{self, Cli},
    config::Config,
    error::describe_error,
};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(
        api_base_url = %config.api_base_url,
        environment = %config.environment,
        has_api_key = config.has_api_key(),
        push_enabled = config.push_enabled,
        "Loaded configuration"
    );

    match cli::run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", describe_error(&e, "Unexpected error occurred."));
            ExitCode::FAILURE
        }
    }
}
