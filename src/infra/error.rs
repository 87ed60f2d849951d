use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Migrate(inner) => Self::Migration(*inner),
            other => Self::database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_become_database_errors() {
        let err = InfraError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, InfraError::Database { .. }));
    }

    #[test]
    fn configuration_message_is_kept() {
        let err = InfraError::configuration("database url is not configured");
        assert_eq!(
            err.to_string(),
            "configuration error: database url is not configured"
        );
    }
}
