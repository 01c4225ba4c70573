use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayVaultApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider declined the request: {0}")]
    Declined(String),
}

impl PayVaultApiError {
    /// Transient errors are worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            PayVaultApiError::RestResponseError(_) => true,
            PayVaultApiError::QueryError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
