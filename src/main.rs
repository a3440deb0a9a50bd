mod assemble;
mod config;
mod db;
mod detector;
mod error;
mod ocr;
mod plate;
mod registry;
mod render;
mod server;
mod session;
mod types;

use config::Config;
use env_logger::Env;
use log::{error, info, warn};
use session::Session;
use std::process;
use std::sync::Arc;

#[macro_use]
extern crate failure;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-gate");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    let port = config.port;

    // The detector's blocking client cannot be created on the reactor.
    let session = match tokio::task::spawn_blocking(move || Session::from_config(&config)).await {
        Ok(Ok(session)) => Arc::new(session),
        Ok(Err(e)) => {
            error!("Unable to start session: {}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("Session setup task failed: {}", e);
            process::exit(1);
        }
    };

    server::run(session.clone(), port, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
            futures::future::pending::<()>().await;
        }
        info!("Shutting down");
    })
    .await;

    match Arc::try_unwrap(session) {
        Ok(session) => match tokio::task::spawn_blocking(move || session.close()).await {
            Ok(Err(e)) => error!("Error closing session: {}", e),
            Err(e) => error!("Session teardown task failed: {}", e),
            Ok(Ok(())) => {}
        },
        Err(_) => warn!("Session still in use at shutdown"),
    }
    info!("Exiting main");
}
