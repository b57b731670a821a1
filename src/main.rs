use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rais_rs::config::{Cli, Command, Config};
use rais_rs::resolver::IdResolver;
use rais_rs::server::{build_router, AppState};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.filter_directive()))
        .init();
}

async fn run_check(config: Config) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("configuration error: {e}");
        return ExitCode::FAILURE;
    }
    if !rais_rs::resolver::validate_tile_root(&config.tile_path).await {
        eprintln!("tile path {:?} does not exist or is not a directory", config.tile_path);
        return ExitCode::FAILURE;
    }
    println!("configuration ok, tile path reachable");
    ExitCode::SUCCESS
}

async fn run_serve(config: Config) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("configuration error: {e}");
        return ExitCode::FAILURE;
    }
    init_logging(&config);

    let bind_address = config.bind_address();
    let tile_path = config.tile_path.clone();
    let resolver = IdResolver::new(tile_path, Vec::new());
    let state = Arc::new(AppState::new(config, resolver));
    let router = build_router(state);

    let listener = match tokio::net::TcpListener::bind(bind_address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%e, %bind_address, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%bind_address, "listening");
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(%e, "server exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}
