use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;

/// Shared application state handed to every handler through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .finish()
    }
}
