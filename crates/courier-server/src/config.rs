use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

const PLACEHOLDER_SECRETS: [&str; 5] = ["", "secret", "changeme", "change-me", "dev-secret-change-me"];

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub max_file_bytes: usize,
    pub max_batch_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset keys take their defaults;
    /// the JWT secret has none.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("COURIER_JWT_SECRET").context("COURIER_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim().to_ascii_lowercase().as_str()) {
            bail!("COURIER_JWT_SECRET is a placeholder; set a real secret");
        }

        let config = Self {
            host: var("COURIER_HOST", "0.0.0.0"),
            port: var("COURIER_PORT", "3000")
                .parse()
                .context("COURIER_PORT must be a port number")?,
            db_path: PathBuf::from(var("COURIER_DB_PATH", "courier.db")),
            media_dir: PathBuf::from(var("COURIER_MEDIA_DIR", "./media")),
            jwt_secret,
            token_ttl_minutes: var("COURIER_TOKEN_TTL_MINUTES", "60")
                .parse()
                .context("COURIER_TOKEN_TTL_MINUTES must be an integer")?,
            max_file_bytes: var("COURIER_MAX_FILE_BYTES", "10485760")
                .parse()
                .context("COURIER_MAX_FILE_BYTES must be an integer")?,
            max_batch_bytes: var("COURIER_MAX_BATCH_BYTES", "26214400")
                .parse()
                .context("COURIER_MAX_BATCH_BYTES must be an integer")?,
        };

        if config.token_ttl_minutes <= 0 {
            bail!("COURIER_TOKEN_TTL_MINUTES must be positive");
        }
        if config.max_file_bytes > config.max_batch_bytes {
            bail!("COURIER_MAX_FILE_BYTES cannot exceed COURIER_MAX_BATCH_BYTES");
        }
        Ok(config)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))?;
        Ok(addr)
    }

    /// Request body cap: one full attachment batch plus room for the form.
    pub fn max_body_bytes(&self) -> usize {
        self.max_batch_bytes + 1024 * 1024
    }
}
