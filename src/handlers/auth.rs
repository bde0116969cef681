// src/handlers/auth.rs

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    handlers::render_page,
    models::user::{
        LoginForm, RegisterForm, Role, USER_COLUMNS, User, UserStatus, normalize_email,
        split_name,
    },
    utils::{
        flash::{self, Notice},
        hash::{hash_password, verify_password},
        session::{self, Session},
        templates::Templates,
    },
};

pub async fn login_page(
    State(templates): State<Templates>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    render_page(&templates, jar, None, "login.html", context! {})
}

/// Authenticates by email and password and starts a session.
///
/// Inactive accounts are refused before the password is checked, and never get a session.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = match authenticate(&pool, &form).await {
        Ok(user) => user,
        Err(err) => return err.bounce(jar, "/login"),
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
    {
        tracing::warn!("Failed to record last login for user {}: {:?}", user.id, e);
    }

    let jar = session::establish(jar, &Session::for_user(&user), &config)?;
    Ok((jar, Redirect::to("/")).into_response())
}

async fn authenticate(pool: &PgPool, form: &LoginForm) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(normalize_email(&form.email))
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?
    .ok_or(AppError::InvalidCredentials)?;

    if user.status != UserStatus::Active {
        return Err(AppError::AccountInactive);
    }

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

pub async fn register_page(
    State(templates): State<Templates>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    render_page(&templates, jar, None, "register.html", context! {})
}

/// Self-registration. The new account is always an active viewer and is signed in
/// straight away.
pub async fn register(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let user = match create_viewer(&pool, form).await {
        Ok(user) => user,
        Err(err) => return err.bounce(jar, "/register"),
    };

    tracing::info!("Registered user {} ({})", user.id, user.email);

    let jar = session::establish(jar, &Session::for_user(&user), &config)?;
    Ok(flash::redirect(
        jar,
        Notice::success("Registration successful."),
        "/",
    ))
}

async fn create_viewer(pool: &PgPool, form: RegisterForm) -> Result<User, AppError> {
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required.".to_string()));
    }
    if form.password.is_empty() {
        return Err(AppError::Validation("Password is required.".to_string()));
    }
    if form.password != form.confirm_password {
        return Err(AppError::Validation(
            "Password and Confirm Password do not match.".to_string(),
        ));
    }

    let form = RegisterForm {
        email: normalize_email(&form.email),
        ..form
    };
    form.validate()?;
    let (first_name, last_name) = split_name(&name)?;

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&form.email)
        .fetch_one(pool)
        .await?;
    if taken {
        return Err(AppError::Conflict("Email already exists.".to_string()));
    }

    let password_hash = hash_password(&form.password)?;

    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (first_name, last_name, email, password_hash, role, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(first_name)
    .bind(last_name)
    .bind(&form.email)
    .bind(password_hash)
    .bind(Role::Viewer.as_str())
    .bind(UserStatus::Active.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already exists.".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (session::destroy(jar), Redirect::to("/login"))
}
