pub mod constants;
pub mod error;
mod models;
mod modules;
mod proxy;
#[cfg(test)]
mod test_utils;

use modules::system::logger;
use tracing::{error, info};

pub use models::AppConfig;
pub use proxy::{build_app, AxumServer, GatewayConfig};

async fn start_gateway(config: &AppConfig) -> Result<AxumServer, String> {
    let (server, handle) = AxumServer::start(&config.gateway).await?;
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                error!("Gateway accept loop stopped unexpectedly: {}", e);
            }
        }
    });
    Ok(server)
}

pub fn run() {
    let config = match modules::system::config::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = logger::init_logger(&config.logging);

    if let Err(errors) = modules::system::validation::validate_app_config(&config) {
        error!("Configuration is invalid:");
        for err in &errors {
            error!("{}", err);
        }
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(async {
        let server = match start_gateway(&config).await {
            Ok(server) => server,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        };

        info!("Gateway is running. Press Ctrl+C to exit.");
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down gateway");
        server.shutdown();
    });
}
