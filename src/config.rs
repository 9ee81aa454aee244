use std::{fmt, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    /// Upper bound for a single store operation, connection acquisition included.
    pub op_timeout: Duration,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let require = |key: &str| {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("required environment variable {key} is not set"))
        };

        let database = DatabaseConfig {
            host: require("DB_HOST")?,
            port: parse_or(&get, "DB_PORT", 5432)?,
            user: require("DB_USER")?,
            password: get("DB_PASSWORD").unwrap_or_default(),
            name: require("DB_NAME")?,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            op_timeout: Duration::from_secs(parse_or(&get, "STORE_TIMEOUT_SECS", 5)?),
        };
        // Either at zero would turn every store operation into a 503.
        anyhow::ensure!(
            database.max_connections > 0,
            "DB_MAX_CONNECTIONS must be greater than zero"
        );
        anyhow::ensure!(
            !database.op_timeout.is_zero(),
            "STORE_TIMEOUT_SECS must be greater than zero"
        );

        let port = match get("PORT") {
            Some(_) => parse_or(&get, "PORT", 5000)?,
            None => parse_or(&get, "APP_PORT", 5000)?,
        };

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database: DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            user: "test".into(),
            password: "test".into(),
            name: "moneymind_test".into(),
            max_connections: 2,
            op_timeout: Duration::from_secs(5),
        },
    }
}
