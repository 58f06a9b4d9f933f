#![warn(unused_crate_dependencies)]

use custom_match_core::app::AppState;
use custom_match_core::config::{load_config, VERSION};
use custom_match_core::logging;
use log::{error, info, LevelFilter};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = load_config();
    logging::setup(config.logging);

    if config.logging == LevelFilter::Debug {
        info!("custom-match-core v{VERSION} starting in debug mode");
    }

    let state = match AppState::init(config).await {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!("failed to initialize application state: {err}");
            return;
        }
    };

    info!("custom-match-core v{VERSION} ready (matcher, acceptance, draft, game and janitor loops starting)");
    state.spawn_background_tasks();

    if let Err(err) = signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
}
