use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::env;
use std::fmt;
use std::str::FromStr;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Clone names are `test_<target>_<0..9999>_<13-digit millis>`, which adds up to 24 bytes
pub const MAX_TARGET_NAME_LEN: usize = MAX_IDENTIFIER_LEN - 24;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(format!(
                "expected one of disable, require, verify-ca, verify-full; got {other}"
            )),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Connection parameters for one database on the server.
///
/// Template and clone configs are identical except for `database`.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: SslMode,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl DbConfig {
    /// Same server and credentials, different database
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl_mode.into())
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}?sslmode={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.database),
            self.ssl_mode.as_str()
        )
    }

    /// Checks the fields a provider needs before it touches the server
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("TESTDB_HOST", &self.host),
            ("TESTDB_USERNAME", &self.username),
            ("TESTDB_PASSWORD", &self.password),
            ("TESTDB_DATABASE", &self.database),
        ];
        for (var, value) in required {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    var,
                    value: String::new(),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.database.len() > MAX_TARGET_NAME_LEN {
            return Err(ConfigError::Invalid {
                var: "TESTDB_DATABASE",
                value: self.database.clone(),
                reason: format!(
                    "template name must be at most {MAX_TARGET_NAME_LEN} bytes so clone names fit in {MAX_IDENTIFIER_LEN}"
                ),
            });
        }

        Ok(())
    }

    /// Reads the template server config; every variable is required
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = DbConfig {
            host: required("TESTDB_HOST")?,
            port: parsed("TESTDB_PORT")?,
            username: required("TESTDB_USERNAME")?,
            password: required("TESTDB_PASSWORD")?,
            database: required("TESTDB_DATABASE")?,
            ssl_mode: parsed("TESTDB_SSL_MODE")?,
        };
        config.validate()?;

        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db = DbConfig::from_env()?;

        let config = Config {
            db,
            log_format: env::var("LOG_FORMAT")
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })
                .unwrap_or(LogFormat::Pretty),
        };

        Ok(config)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn parsed<T>(var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let value = required(var)?;
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}
