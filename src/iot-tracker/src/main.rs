use std::path::PathBuf;

use axum::{routing::get, Router};
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error as ThisError;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use libs::utils::cli::log_level_override;
use libs::utils::config::{setup_config, FileFormat};
use libs::utils::{setup_cli, setup_logger};

use publisher::Publisher;

mod publisher;
mod socket;

#[derive(ThisError, Debug)]
enum Error {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("logger error: {0}")]
    Logger(#[from] fern::InitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interval_second must be at least 1")]
    ZeroInterval,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub log_level: String,
    pub web_srv_port: u16,
    pub interval_second: u64,
}

const APP_NAME: &str = "tracker";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let matches = setup_cli();

    // Init token, logger & config
    let token = CancellationToken::new();
    let settings: Settings = setup_config(
        APP_NAME,
        FileFormat::YAML,
        matches.get_one::<PathBuf>(libs::utils::cli::CONFIG_KEY),
    )?;
    setup_logger(log_level_override(&matches, &settings.log_level))?;
    info!("{:?}", settings);

    if settings.interval_second == 0 {
        return Err(Error::ZeroInterval);
    }
    let publisher = Publisher::new(Duration::from_secs(settings.interval_second));
    info!("Publishing a position every {:?}", publisher.period());

    let app = Router::new()
        .route("/", get(socket::location_updates))
        .route("/alive", get(alive))
        .route("/ready", get(ready))
        .with_state(publisher.clone());

    let addr = format!("0.0.0.0:{}", settings.web_srv_port);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("Server is running on {addr} 🚀");

    let cloned_token = token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cloned_token.cancelled().await })
            .await
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutting down...");
        }
        Err(err) => {
            eprintln!("Unable to listen for shutdown signal: {}", err);
        }
    }
    token.cancel();
    debug!("{} subscriber(s) released", publisher.shutdown());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!("server stopped with {}", err),
        Err(err) => debug!("server task failed {}", err),
    }
    info!("Shutdown complete.");
    Ok(())
}

async fn alive() -> String {
    format!("{}", true)
}

async fn ready() -> String {
    format!("{}", true)
}
