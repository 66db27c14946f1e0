use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kennel::config::Config;
use kennel::dog::Dogs;
use kennel::hypermedia::{Routes, StaticFiles};
use kennel::mux::{Options, WebAppConfig, web_app};
use kennel::server::Server;
use kennel::shutdown;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::parse();
    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "kennel stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(addr = %cfg.addr, policy = ?cfg.policy(), "startup");

    let (tx, mut rx) = shutdown::channel();
    shutdown::forward_os_signals(tx.clone());

    let routes = Routes::new(Arc::new(Dogs::new()))?;
    let mut options = Options::default().with_static_files(StaticFiles::new(&cfg.static_dir));
    if let Some(origin) = &cfg.cors_origin {
        options = options.with_cors(origin.clone());
    }

    let app = web_app(
        WebAppConfig {
            shutdown: tx,
            policy: cfg.policy(),
        },
        &routes,
        options,
    );

    let server = Server::bind(&cfg.addr).await?;

    let shutdown = async move {
        if let Some(sig) = rx.recv().await {
            info!(signal = %sig, "shutdown started");
        }
    };
    server.serve(app, shutdown, cfg.shutdown_timeout()).await?;

    info!("shutdown complete");
    Ok(())
}
