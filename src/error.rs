use crate::infrastructure::config::ConfigError;

/// Main provisioning error type
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Connection to database {database} failed: {source}")]
    Connection {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to {intent} ({target}): {source}")]
    Query {
        intent: &'static str,
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration callback failed on template {template}: {source}")]
    Migration {
        template: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ProvisionError {
    pub(crate) fn connection(database: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |source| Self::Connection {
            database: database.to_string(),
            source,
        }
    }

    pub(crate) fn query<'a>(
        intent: &'static str,
        target: &'a str,
    ) -> impl FnOnce(sqlx::Error) -> Self + 'a {
        move |source| Self::Query {
            intent,
            target: target.to_string(),
            source,
        }
    }

    /// Underlying sqlx error, if this failure came from the driver
    pub fn sqlx_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Connection { source, .. } | Self::Query { source, .. } => Some(source),
            Self::Migration { .. } | Self::Config(_) => None,
        }
    }
}

/// Custom result type for the provisioning layer
pub type ProvisionResult<T> = Result<T, ProvisionError>;
