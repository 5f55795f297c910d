mod api;
mod config;
mod controller;
mod error;
mod render;
mod surface;
mod transport;
mod types;

use crate::api::ApiClient;
use crate::config::Config;
use crate::controller::{Controller, Prompts};
use crate::transport::HttpTransport;
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), failure::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-dashboard");

    let config = Config::from_env()?;
    info!("Using plate API at {}", config.base_url);
    let port = config.listen_port;
    let api = ApiClient::new(
        config.base_url.clone(),
        Arc::new(HttpTransport::new(config.base_url.clone())),
    );
    // Requests on the local surface are explicit user actions, so they
    // count as confirmed.
    let prompts = Prompts {
        confirm: Box::new(|prompt: &str| {
            info!("{} (confirmed by request)", prompt);
            true
        }),
        notify: Box::new(|message: &str| info!("{}", message)),
    };
    let controller = Arc::new(Controller::new(api, prompts, config));

    controller.check_health().await;
    controller.start().await;

    let timer_task = tokio::spawn(controller.clone().run_stats_timer());
    let surface_task = tokio::spawn(surface::run(controller, port));
    tokio::select! {
        result = timer_task => {
            if let Err(e) = result {
                error!("Stats timer failed: {}", e);
            }
        }
        result = surface_task => {
            if let Err(e) = result {
                error!("Surface task failed: {}", e);
            }
        }
    }
    info!("Exiting main");
    Ok(())
}
