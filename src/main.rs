use clap::Parser;
use tim::cli::commands::Cli;
use tim::cli::handlers;
use tracing_subscriber::EnvFilter;

/// `TIM_LOG` wins; otherwise -v/-vv pick the level
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("TIM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = handlers::dispatch(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
