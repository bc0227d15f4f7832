use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("backend unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Rejection reported by the backend; `message` is shown to the user as is.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("you must sign in first")]
    SignInRequired,

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("radius {0} km is not one of the available options")]
    InvalidRadius(u32),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl BoardError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        BoardError::Backend {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = match &self {
            BoardError::InvalidCoordinate(_) | BoardError::InvalidRadius(_) => {
                StatusCode::BAD_REQUEST
            }
            BoardError::InvalidCredentials | BoardError::SignInRequired => {
                StatusCode::UNAUTHORIZED
            }
            BoardError::Http(_) | BoardError::Backend { .. } => StatusCode::BAD_GATEWAY,
            BoardError::Database(_)
            | BoardError::Config(_)
            | BoardError::Io(_)
            | BoardError::Template(_)
            | BoardError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
