use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::blog::{BlogError, RepositoryError};

#[derive(Template)]
#[template(path = "errors/404.html")]
pub struct NotFoundTemplate {
    pub path: String,
}

#[derive(Template)]
#[template(path = "errors/500.html")]
pub struct ServerErrorTemplate;

/// Marks a 404 produced by a handler so the router can fill in the request path.
#[derive(Debug, Clone, Copy)]
pub struct MissingPage;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BlogError> for AppError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::NotFound(what) => AppError::NotFound(what),
            BlogError::Repository(e) => AppError::Repository(e),
        }
    }
}

/// Render a template into a full HTML response, falling back to plain text if
/// the error page itself fails to render.
fn html_page<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error page render failed: {}", e);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

/// 404 page naming the path that was requested.
pub fn not_found_page(path: impl Into<String>) -> Response {
    html_page(
        StatusCode::NOT_FOUND,
        NotFoundTemplate { path: path.into() },
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                let mut response = not_found_page(String::new());
                response.extensions_mut().insert(MissingPage);
                response
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                html_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                html_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate)
            }
            AppError::Repository(e) => {
                tracing::error!("Repository error: {}", e);
                html_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate)
            }
            AppError::Template(e) => {
                tracing::error!("Template render error: {}", e);
                html_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                html_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate)
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
