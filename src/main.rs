use log::{error, info, warn};
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }

    info!(
        "Starting marketplace realtime service [{}]...",
        config.runtime_env()
    );

    if config.uses_default_jwt_secret() {
        if config.is_production() {
            error!("JWT_SECRET must be set in production; refusing to start");
            std::process::exit(1);
        }
        warn!("JWT_SECRET is not set, using the development default");
    }

    let app_state = AppState::new(config);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
