use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_login::tower_sessions::session;
use tracing::error;

use crate::auth::user::Backend;
use crate::events::service::EventError;
use crate::users::UserError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Session(#[from] session::Error),

    #[error(transparent)]
    Auth(#[from] axum_login::Error<Backend>),

    #[error(transparent)]
    Upload(#[from] MultipartError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Upload(err) => err.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::Forbidden(why) => why.to_string(),
            AppError::Upload(err) => err.body_text(),
            _ => {
                error!(error = ?self, "request failed");
                "Something went wrong.".to_string()
            }
        };

        (
            status,
            Html(format!(
                r#"<!DOCTYPE html>
<html>
<head><title>{code}</title></head>
<body>
    <h1>{code}</h1>
    <p>{message}</p>
    <p><a href="/">Back to events</a></p>
</body>
</html>"#,
                code = status.as_u16(),
                message = message,
            )),
        )
            .into_response()
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotFound => AppError::NotFound("Event"),
            EventError::AttachmentNotFound => AppError::NotFound("Attachment"),
            EventError::NotOrganizer { .. } => {
                AppError::Forbidden("Only the organizer can change this event.")
            }
            EventError::CannotCreate => {
                AppError::Forbidden("You do not have permission to create events.")
            }
            EventError::Database(err) => AppError::Database(err),
            EventError::Storage(err) => AppError::Io(err),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound("User"),
            UserError::Database(err) => AppError::Database(err),
            other => AppError::Internal(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
