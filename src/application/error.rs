use std::error::Error as StdError;

use thiserror::Error;

use crate::application::content::ContentError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Flattened error chain, outermost message first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NotFound => 3,
            AppError::Validation(_)
            | AppError::Domain(DomainError::InvalidIdentifier { .. })
            | AppError::Content(
                ContentError::UnknownType(_)
                | ContentError::UnknownField { .. }
                | ContentError::InvalidInput(_)
                | ContentError::Slug(_)
                | ContentError::Repo(RepoError::InvalidInput { .. }),
            ) => 2,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Content(ContentError::Repo(RepoError::Timeout)) => 4,
            _ => 1,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        Self::Content(ContentError::Repo(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_the_source_chain() {
        let error = AppError::from(InfraError::Io(std::io::Error::other("disk full")));
        let report = error.report();
        assert_eq!(report.messages[0], "io error: disk full");
        assert_eq!(report.source, "application::error::AppError");
    }

    #[test]
    fn exit_codes_separate_caller_and_system_errors() {
        assert_eq!(AppError::NotFound.exit_code(), 3);
        assert_eq!(
            AppError::from(ContentError::UnknownType(9)).exit_code(),
            2
        );
        assert_eq!(
            AppError::from(RepoError::invalid_input("bad sort")).exit_code(),
            2
        );
        assert_eq!(AppError::from(InfraError::database("down")).exit_code(), 4);
        assert_eq!(AppError::unexpected("boom").exit_code(), 1);
    }
}
