use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A registry-supplied table or column name that cannot be used in SQL.
    #[error("`{name}` is not a valid identifier")]
    InvalidIdentifier { name: String },
}

impl DomainError {
    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        Self::InvalidIdentifier { name: name.into() }
    }
}
