use config::Config;
use events::EventPublisher;
use realtime::auth::JwtVerifier;
use realtime::{Lifecycle, Manager, RealtimeEventHandler};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Process-wide state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The single connection manager; business code pushes events through it.
    pub realtime_manager: Arc<Manager>,
    pub lifecycle: Lifecycle,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        let realtime_manager = Arc::new(Manager::new());
        let verifier = Arc::new(JwtVerifier::new(app_config.jwt_secret()));
        let lifecycle = Lifecycle::new(Arc::clone(&realtime_manager), verifier);
        let event_publisher = EventPublisher::new().with_handler(Arc::new(
            RealtimeEventHandler::new(Arc::clone(&realtime_manager)),
        ));

        Self {
            config: app_config,
            realtime_manager,
            lifecycle,
            event_publisher,
        }
    }
}
