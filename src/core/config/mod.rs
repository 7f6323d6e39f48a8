use anyhow::{Context, Result};

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
    pub url_override: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = env_or("SERVER_PORT", "8000")
            .parse::<u16>()
            .context("SERVER_PORT is not a valid port number")?;
        let db_port = env_or("DB_PORT", "5432")
            .parse::<u32>()
            .context("DB_PORT is not a valid port number")?;

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default development secret - DO NOT USE IN PRODUCTION");
            "dev-secret-key-change-in-production-minimum-32-chars".to_string()
        });

        Ok(Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port,
            },
            database: DatabaseConfig {
                username: env_or("DB_USERNAME", "deskserver"),
                password: env_or("DB_PASSWORD", ""),
                server: env_or("DB_HOST", "localhost"),
                port: db_port,
                database: env_or("DB_DATABASE", "deskserver"),
                url_override: std::env::var("DATABASE_URL").ok(),
            },
            jwt_secret,
        })
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database.url_override {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("url_override", &self.url_override.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
