// src/handlers/mod.rs

use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use minijinja::{Value, context};

use crate::{
    error::AppError,
    utils::{
        flash,
        session::Session,
        templates::{self, Templates},
    },
};

pub mod admin;
pub mod auth;
pub mod blog;
pub mod categories;
pub mod interaction;
pub mod profile;

/// Renders a full page: `ctx` plus the signed-in user (`me`) and the pending notice,
/// which is cleared from the jar.
pub(crate) fn render_page(
    templates: &Templates,
    jar: CookieJar,
    me: Option<&Session>,
    name: &str,
    ctx: Value,
) -> Result<Response, AppError> {
    let (jar, notice) = flash::take(jar);
    let html = templates::render(templates, name, context! { me, notice, ..ctx })?;
    Ok((jar, html).into_response())
}
