use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ConfigBuilder};

/// Chatty transport crates that only show up at Trace verbosity.
const FILTERED_MODULES: &[&str] = &["tower", "hyper", "axum", "tungstenite", "tokio_tungstenite"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the configured verbosity.
    ///
    /// Below Trace, frames logged by the HTTP and WebSocket transport crates are
    /// suppressed so connection and dispatch logs stay readable.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        simplelog::TermLogger::init(
            config.log_level_filter,
            Self::build_log_config(config.log_level_filter),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        for module in Self::ignored_modules(level) {
            builder.add_filter_ignore_str(module);
        }

        builder.build()
    }

    fn ignored_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            FILTERED_MODULES
        }
    }
}
