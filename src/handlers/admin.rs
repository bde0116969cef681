// src/handlers/admin.rs
//
// User administration. Every route here sits behind `require_admin`.

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::render_page,
    models::{
        FormMode, ListPageParams, search_pattern,
        user::{Role, USER_COLUMNS, User, UserForm, UserStatus, normalize_email},
    },
    utils::{
        flash::{self, Notice},
        hash::hash_password,
        session::Session,
        templates::Templates,
    },
};

async fn find_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found.".to_string()))
}

async fn email_taken(pool: &PgPool, email: &str, except: Option<i64>) -> Result<bool, AppError> {
    let taken = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
    )
    .bind(email)
    .bind(except)
    .fetch_one(pool)
    .await?;

    Ok(taken)
}

fn user_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Email already exists.".to_string())
    } else {
        tracing::error!("Failed to write user: {:?}", e);
        AppError::from(e)
    }
}

/// The single users page: the filtered list plus an optional inline create/edit form.
async fn render_users_page(
    pool: &PgPool,
    templates: &Templates,
    jar: CookieJar,
    me: &Session,
    q: Option<&str>,
    mode: Option<FormMode>,
    edit_user: Option<User>,
) -> Result<Response, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE $1::TEXT IS NULL
           OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1 OR role ILIKE $1
        ORDER BY id DESC
        "#
    ))
    .bind(search_pattern(q))
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    render_page(
        templates,
        jar,
        Some(me),
        "users.html",
        context! {
            users,
            q => q.unwrap_or_default().trim(),
            mode,
            u => edit_user,
            roles => Role::ALL,
            statuses => UserStatus::ALL,
        },
    )
}

/// `GET /users?q=&mode=create|edit&user_id=`
pub async fn list_users(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Query(params): Query<ListPageParams>,
) -> Result<Response, AppError> {
    let (mode, user_id) = params.form(params.user_id.as_deref());
    let edit_user = match user_id {
        Some(id) => match find_user(&pool, id).await {
            Ok(user) => Some(user),
            Err(err) => return err.bounce(jar, "/users"),
        },
        None => None,
    };

    render_users_page(&pool, &templates, jar, &me, params.q.as_deref(), mode, edit_user).await
}

pub async fn new_user_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    render_users_page(&pool, &templates, jar, &me, None, Some(FormMode::Create), None).await
}

pub async fn create_user(
    State(pool): State<PgPool>,
    jar: CookieJar,
    Form(form): Form<UserForm>,
) -> Result<Response, AppError> {
    match insert_user(&pool, form).await {
        Ok(user) => {
            tracing::info!("Admin created user {} ({})", user.id, user.email);
            Ok(flash::redirect(
                jar,
                Notice::success("User created successfully."),
                "/users",
            ))
        }
        Err(err) => err.bounce(jar, "/users?mode=create"),
    }
}

/// An unknown role becomes viewer and an unknown status becomes Active.
async fn insert_user(pool: &PgPool, form: UserForm) -> Result<User, AppError> {
    let role = Role::parse(&form.role).unwrap_or(Role::Viewer);
    let status = UserStatus::parse(&form.status).unwrap_or(UserStatus::Active);
    let form = UserForm {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: normalize_email(&form.email),
        ..form
    };

    if form.first_name.is_empty() {
        return Err(AppError::Validation("First name is required.".to_string()));
    }
    if form.email.is_empty() {
        return Err(AppError::Validation("Email is required.".to_string()));
    }
    if form.password.is_empty() {
        return Err(AppError::Validation("Password is required.".to_string()));
    }
    if form.password != form.confirm_password {
        return Err(AppError::Validation(
            "Password and Confirm Password do not match.".to_string(),
        ));
    }
    form.validate()?;

    if email_taken(pool, &form.email, None).await? {
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
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(&form.email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(status.as_str())
    .fetch_one(pool)
    .await
    .map_err(user_write_error)
}

pub async fn edit_user_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = match find_user(&pool, id).await {
        Ok(user) => user,
        Err(err) => return err.bounce(jar, "/users"),
    };
    render_users_page(&pool, &templates, jar, &me, None, Some(FormMode::Edit), Some(user)).await
}

pub async fn update_user(
    State(pool): State<PgPool>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<UserForm>,
) -> Result<Response, AppError> {
    let user = match find_user(&pool, id).await {
        Ok(user) => user,
        Err(err) => return err.bounce(jar, "/users"),
    };
    match apply_user_edit(&pool, &user, form).await {
        Ok(()) => Ok(flash::redirect(
            jar,
            Notice::success("User updated successfully."),
            "/users",
        )),
        Err(err) => err.bounce(jar, &format!("/users?mode=edit&user_id={id}")),
    }
}

/// Blank or unknown role/status keep the stored values. The password changes only when
/// either password field is filled in.
async fn apply_user_edit(pool: &PgPool, user: &User, form: UserForm) -> Result<(), AppError> {
    let role = Role::parse(&form.role).unwrap_or(user.role);
    let status = UserStatus::parse(&form.status).unwrap_or(user.status);
    let form = UserForm {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: normalize_email(&form.email),
        ..form
    };

    if form.first_name.is_empty() {
        return Err(AppError::Validation("First name is required.".to_string()));
    }
    if form.email.is_empty() {
        return Err(AppError::Validation("Email is required.".to_string()));
    }
    form.validate()?;

    if email_taken(pool, &form.email, Some(user.id)).await? {
        return Err(AppError::Conflict("Email already exists.".to_string()));
    }

    let new_password_hash = if form.password.is_empty() && form.confirm_password.is_empty() {
        None
    } else if form.password != form.confirm_password {
        return Err(AppError::Validation(
            "Password and Confirm Password do not match.".to_string(),
        ));
    } else {
        Some(hash_password(&form.password)?)
    };

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    separated.push("first_name = ");
    separated.push_bind_unseparated(form.first_name);
    separated.push("last_name = ");
    separated.push_bind_unseparated(form.last_name);
    separated.push("email = ");
    separated.push_bind_unseparated(form.email);
    separated.push("role = ");
    separated.push_bind_unseparated(role.as_str());
    separated.push("status = ");
    separated.push_bind_unseparated(status.as_str());

    if let Some(password_hash) = new_password_hash {
        separated.push("password_hash = ");
        separated.push_bind_unseparated(password_hash);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(user.id);

    let result = builder
        .build()
        .execute(pool)
        .await
        .map_err(user_write_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".to_string()));
    }

    Ok(())
}

/// Hard delete. Authored posts and comments keep their rows with the author cleared.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    if id == me.user_id {
        return AppError::Validation(
            "You cannot delete your own account while logged in.".to_string(),
        )
        .bounce(jar, "/users");
    }

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user {}: {:?}", id, e);
            AppError::from(e)
        })?
        .rows_affected();

    if deleted == 0 {
        return AppError::NotFound("User not found.".to_string()).bounce(jar, "/users");
    }

    tracing::info!("Admin {} deleted user {}", me.user_id, id);
    Ok(flash::redirect(
        jar,
        Notice::success("User deleted successfully."),
        "/users",
    ))
}
