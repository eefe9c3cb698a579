pub(crate) mod health_check_controller;
pub(crate) mod ws_stats_controller;
