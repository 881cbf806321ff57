use anyhow::Result;
use tracing_subscriber::EnvFilter;

use businessmap::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;
    cli::execute(command).await
}
