use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Please select a PDF file first.")]
    NoFileSelected,

    #[error("Please select an output format.")]
    NoFormatSelected,

    #[error("A conversion is already running")]
    Busy,

    #[error("{0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<crate::api::ApiError> for AppError {
    fn from(e: crate::api::ApiError) -> Self {
        AppError::Api(e.to_string())
    }
}
