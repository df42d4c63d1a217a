use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tera::Context;

use crate::http::auth::login_url;
use crate::infra::templates;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    location: Option<String>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            location: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            location: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            location: None,
        }
    }

    /// Anonymous access to a members-only page: bounce to the login form.
    pub fn login_required(next: &str) -> Self {
        Self {
            status: StatusCode::FOUND,
            message: "login required".to_string(),
            location: Some(login_url(next)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.status {
            StatusCode::FOUND => {
                let location = self.location.unwrap_or_else(|| "/".to_string());
                (self.status, [(header::LOCATION, location)]).into_response()
            }
            StatusCode::NOT_FOUND => error_page(self.status, "core/404.html", &self.message),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error_page(self.status, "core/500.html", &self.message)
            }
            status => (status, self.message).into_response(),
        }
    }
}

fn error_page(status: StatusCode, template: &str, message: &str) -> Response {
    match templates::render(template, &Context::new()) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = ?err, template, "failed to render error page");
            (status, message.to_string()).into_response()
        }
    }
}
