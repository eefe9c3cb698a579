use axum::http::{HeaderValue, Method};
use log::*;
use std::io;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use service::AppState;

mod controller;
mod router;
mod ws;

pub use router::define_routes;

/// Bind the configured interface and port, then serve until the process exits.
pub async fn init_server(app_state: AppState) -> io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = app_state.config.port;

    let listener = TcpListener::bind((interface.as_str(), port)).await?;
    info!("Server starting... listening for connections on http://{interface}:{port}");

    serve(listener, app_state).await
}

/// Serve the HTTP and WebSocket routes on an already bound listener.
pub async fn serve(listener: TcpListener, app_state: AppState) -> io::Result<()> {
    let cors = cors_layer(&app_state.config.allowed_origins);
    let router = define_routes(app_state).layer(cors);

    axum::serve(listener, router).await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparsable CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
}

#[cfg(test)]
pub(crate) mod test_support {
    use clap::Parser;
    use service::config::Config;
    use service::AppState;

    pub(crate) const SECRET: &str = "test-secret";

    pub(crate) fn app_state(args: &[&str]) -> AppState {
        let config = Config::parse_from(std::iter::once("web").chain(args.iter().copied()))
            .set_jwt_secret(SECRET.to_string());
        AppState::new(config)
    }
}
