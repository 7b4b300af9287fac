use thiserror::Error;

/// Failure of a round-trip to the completion service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::RequestFailed(err.to_string())
    }
}

/// Rejections from the conversation controller. None of these mutate state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Message content cannot be empty")]
    EmptyMessage,
    #[error("Message not found for editing: {0}")]
    MessageNotFound(String),
}
