//! keel - versioned release deployments for single-host applications

use clap::Parser;
use keel_cli::cli::Cli;
use keel_cli::domain::ErrorClass;
use keel_cli::domain::error::error_code;
use keel_cli::output::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KEEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = cli.run().await {
        let message = format!("{e:#}");
        match json_mode.then(|| json::format_error(&message, error_code(&e))) {
            Some(Ok(doc)) => println!("{doc}"),
            _ => eprintln!("Error: {message}"),
        }
        std::process::exit(ErrorClass::of(&e).exit_code());
    }
}
