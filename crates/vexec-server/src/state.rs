use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vexec_advisor::Advisor;
use vexec_storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    /// `None` when no API key is configured; goals and progress are then
    /// stored without advice.
    pub advisor: Option<Arc<dyn Advisor>>,
    pub start_time: DateTime<Utc>,
    pub jwt_secret: Arc<String>,
    pub token_expire_secs: u64,
    pub config: Arc<ServerConfig>,
}
