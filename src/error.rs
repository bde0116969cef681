// src/error.rs

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::fmt;
use validator::ValidationErrors;

use crate::utils::flash::{self, Notice};

/// Global Application Error Enum.
///
/// Everything except `InternalServerError` is a business outcome that handlers turn
/// into a flash notice plus a redirect via [`AppError::bounce`].
#[derive(Debug)]
pub enum AppError {
    // Missing or malformed form field.
    Validation(String),

    // Uniqueness violation (email, username, slug).
    Conflict(String),

    // No valid session cookie.
    Unauthenticated,

    // Role or ownership violation.
    Forbidden(String),

    // Referenced row is absent, soft-deleted or filtered out.
    NotFound(String),

    InvalidCredentials,

    AccountInactive,

    // Store, template or filesystem failure.
    InternalServerError(String),
}

impl AppError {
    /// The user-visible text for this error.
    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => msg,
            AppError::Unauthenticated => "Please login first.",
            AppError::InvalidCredentials => "Invalid email or password",
            AppError::AccountInactive => "Account inactive. Contact admin.",
            AppError::InternalServerError(_) => "Something went wrong. Please try again.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccountInactive => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts a business error into a flash notice and a redirect to `to`.
    ///
    /// `Unauthenticated` always goes to the login page. Internal faults are handed back
    /// unchanged so they surface as a 500.
    pub fn bounce(self, jar: CookieJar, to: &str) -> Result<Response, AppError> {
        match self {
            AppError::InternalServerError(_) => Err(self),
            AppError::Unauthenticated => Ok(flash::redirect(
                jar,
                Notice::error(self.message()),
                "/login",
            )),
            _ => Ok(flash::redirect(jar, Notice::error(self.message()), to)),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(detail) => write!(f, "internal error: {detail}"),
            other => f.write_str(other.message()),
        }
    }
}

impl std::error::Error for AppError {}

/// Renders the errors that escape a handler as a bare HTML page.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::InternalServerError(detail) = &self {
            tracing::error!("Internal Server Error: {}", detail);
        }

        let status = self.status();
        let body = Html(format!(
            "<!doctype html><title>{code}</title><h1>{code}</h1><p>{message}</p><p><a href=\"/\">Home</a></p>",
            code = status.as_u16(),
            message = ammonia::clean_text(self.message()),
        ));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::InternalServerError(format!("template: {err:#}"))
    }
}

/// Picks one message deterministically (first field by name) so notices are stable.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .first()
            .and_then(|(field, errs)| {
                errs.first().map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {field}."),
                })
            })
            .unwrap_or_else(|| "Invalid input.".to_string());

        AppError::Validation(message)
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(max = 3, message = "Title is too long."))]
        title: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn validation_errors_pick_first_field_by_name() {
        let sample = Sample {
            title: "toolong".into(),
            email: "nope".into(),
        };
        let err = AppError::from(sample.validate().unwrap_err());
        // "email" sorts before "title" and has no custom message.
        assert_eq!(err.message(), "Invalid email.");
    }

    #[test]
    fn bounce_redirects_business_errors() {
        let response = AppError::Conflict("Email already exists.".into())
            .bounce(CookieJar::new(), "/register")
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/register");
        assert!(response.headers().get(header::SET_COOKIE).is_some());
    }

    #[test]
    fn bounce_sends_unauthenticated_to_login() {
        let response = AppError::Unauthenticated
            .bounce(CookieJar::new(), "/dashboard")
            .unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn bounce_keeps_internal_errors() {
        let result = AppError::InternalServerError("db down".into()).bounce(CookieJar::new(), "/");
        assert!(matches!(result, Err(AppError::InternalServerError(_))));
    }
}
