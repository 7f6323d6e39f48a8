use dotenvy::dotenv;
use log::error;
use std::sync::Arc;

use deskserver::core::config::AppConfig;
use deskserver::core::shared::state::AppState;
use deskserver::core::shared::utils::create_conn;
use deskserver::main_module::run_server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to load config: {}", e),
            ));
        }
    };

    let pool = match create_conn(&config.database_url()) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("Database pool creation failed: {}", e),
            ));
        }
    };

    let app_state = Arc::new(AppState { conn: pool, config });

    run_server(app_state).await
}
