use config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub page_size: usize,
    pub database_url: Option<String>,
    pub seed_file: Option<String>,
    pub password_memory_kib: u32,
    pub password_iterations: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Self::from_env(Environment::default().try_parsing(true))
    }

    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("port", 8080)?
            .set_default("session_ttl_hours", 24)?
            .set_default("page_size", 10)?
            .set_default("password_memory_kib", 19 * 1024)?
            .set_default("password_iterations", 2)?
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

// Keeps the JWT secret and database credentials out of the logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("page_size", &self.page_size)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("seed_file", &self.seed_file)
            .finish_non_exhaustive()
    }
}
