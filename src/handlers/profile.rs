use axum::{
    Extension,
    extract::{Multipart, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    handlers::render_page,
    models::user::{ProfileForm, USER_COLUMNS, User},
    utils::{
        flash::{self, Notice},
        session::Session,
        templates::Templates,
        upload::store_profile_picture,
    },
};

const USERNAME_TAKEN: &str = "Username already taken.";

async fn current_user(pool: &PgPool, me: &Session) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(me.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found.".to_string()))
}

/// The signed-in user's profile with a few activity counts.
pub async fn show_profile(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user = current_user(&pool, &me).await?;

    let (posts_count, likes_received): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE author_id = $1 AND NOT is_deleted),
            (SELECT COUNT(*) FROM likes l JOIN posts p ON l.post_id = p.id
              WHERE p.author_id = $1 AND NOT p.is_deleted)
        "#,
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    render_page(
        &templates,
        jar,
        Some(&me),
        "profile.html",
        context! { u => user, posts_count, likes_received },
    )
}

pub async fn edit_profile_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user = current_user(&pool, &me).await?;
    render_page(&templates, jar, Some(&me), "profile_edit.html", context! { u => user })
}

/// An uploaded file as received.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Reads the multipart profile form. A file input left empty yields no upload.
async fn read_profile_form(
    mut multipart: Multipart,
) -> Result<(ProfileForm, Option<Upload>), AppError> {
    let mut form = ProfileForm::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        AppError::Validation("Could not read the submitted form.".to_string())
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "profile_pic" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| {
                tracing::debug!("Failed to read profile picture: {}", e);
                AppError::Validation("Profile picture must be at most 5 MB.".to_string())
            })?;
            if !file_name.is_empty() && !bytes.is_empty() {
                upload = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let text = field.text().await.map_err(|e| {
            tracing::debug!("Failed to read field {}: {}", name, e);
            AppError::Validation("Could not read the submitted form.".to_string())
        })?;
        let text = text.trim().to_string();

        match name.as_str() {
            "first_name" => form.first_name = text,
            "last_name" => form.last_name = text,
            "username" => form.username = Some(text).filter(|u| !u.is_empty()),
            "bio" => form.bio = Some(text).filter(|b| !b.is_empty()),
            _ => tracing::debug!("Ignoring unknown field: {}", name),
        }
    }

    Ok((form, upload))
}

pub async fn update_profile(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, AppError> {
    match apply_profile_edit(&pool, &config, &me, multipart).await {
        Ok(()) => Ok(flash::redirect(
            jar,
            Notice::success("Profile updated successfully."),
            "/profile",
        )),
        Err(err) => err.bounce(jar, "/profile/edit"),
    }
}

/// A blank username keeps the current one; a blank bio clears it.
async fn apply_profile_edit(
    pool: &PgPool,
    config: &Config,
    me: &Session,
    multipart: Multipart,
) -> Result<(), AppError> {
    let (form, upload) = read_profile_form(multipart).await?;
    form.validate()?;

    if let Some(username) = &form.username {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)",
        )
        .bind(username)
        .bind(me.user_id)
        .fetch_one(pool)
        .await?;
        if taken {
            return Err(AppError::Conflict(USERNAME_TAKEN.to_string()));
        }
    }

    let profile_pic = match upload {
        Some(upload) => {
            Some(store_profile_picture(&config.media_root, &upload.file_name, &upload.bytes).await?)
        }
        None => None,
    };

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    separated.push("first_name = ");
    separated.push_bind_unseparated(form.first_name);
    separated.push("last_name = ");
    separated.push_bind_unseparated(form.last_name);
    separated.push("bio = ");
    separated.push_bind_unseparated(form.bio);

    if let Some(username) = form.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(path) = profile_pic {
        separated.push("profile_pic = ");
        separated.push_bind_unseparated(path);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(me.user_id);

    builder.build().execute(pool).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(USERNAME_TAKEN.to_string())
        } else {
            tracing::error!("Failed to update profile: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok(())
}
