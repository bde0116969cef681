use axum::{
    Extension, Form,
    extract::{Path, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::render_page,
    models::{
        comment::{COMMENT_SELECT, Comment, CommentForm, CommentStatus},
        post::PostStatus,
        user::Role,
    },
    utils::{
        flash::{self, Notice},
        session::Session,
        templates::Templates,
    },
};

const COMMENT_REQUIRED: &str = "Comment cannot be empty.";
const COMMENT_DENIED: &str = "You can change only your own comments.";

/// Adds a comment, or a reply when `parent_id` names a live comment on the same post.
pub async fn add_comment(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(slug): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let back = format!("/blog/{slug}");
    match insert_comment(&pool, &me, &slug, form).await {
        Ok(is_reply) => {
            let message = if is_reply { "Reply added." } else { "Comment added." };
            Ok(flash::redirect(jar, Notice::success(message), &back))
        }
        Err(err) => err.bounce(jar, &back),
    }
}

/// Returns whether the new comment was attached as a reply.
async fn insert_comment(
    pool: &PgPool,
    me: &Session,
    slug: &str,
    form: CommentForm,
) -> Result<bool, AppError> {
    if me.role != Role::Viewer {
        return Err(AppError::Forbidden("Only viewer can add comment.".to_string()));
    }

    let post_id: i64 = sqlx::query_scalar(
        "SELECT id FROM posts WHERE slug = $1 AND status = 'Published' AND NOT is_deleted",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Post not found.".to_string()))?;

    let body = form.comment.trim().to_string();
    if body.is_empty() {
        return Err(AppError::Validation(COMMENT_REQUIRED.to_string()));
    }
    form.validate()?;

    // A parent that is gone or belongs to another post makes a top-level comment.
    let parent_id: Option<i64> = match form.parent_id() {
        Some(candidate) => sqlx::query_scalar(
            "SELECT id FROM comments WHERE id = $1 AND post_id = $2 AND NOT is_deleted",
        )
        .bind(candidate)
        .bind(post_id)
        .fetch_optional(pool)
        .await?,
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, body, status, parent_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(post_id)
    .bind(me.user_id)
    .bind(body)
    .bind(CommentStatus::Approved.as_str())
    .bind(parent_id)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to add comment: {:?}", e);
        AppError::from(e)
    })?;

    Ok(parent_id.is_some())
}

/// Toggle Like on a post.
pub async fn toggle_like(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> Result<Response, AppError> {
    let post: Option<(String, String)> =
        sqlx::query_as("SELECT slug, status FROM posts WHERE id = $1 AND NOT is_deleted")
            .bind(post_id)
            .fetch_optional(&pool)
            .await?;
    let Some((slug, status)) = post else {
        return AppError::NotFound("Post not found.".to_string()).bounce(jar, "/");
    };
    if PostStatus::parse(&status) != Some(PostStatus::Published) {
        return AppError::Validation("Only published blogs can be liked.".to_string())
            .bounce(jar, &format!("/blog/{slug}"));
    }

    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to open transaction: {:?}", e);
        AppError::from(e)
    })?;

    let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(me.user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        // A concurrent like from the same user already holds the row: nothing to add.
        sqlx::query(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT (post_id, user_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(me.user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit like toggle: {:?}", e);
        AppError::from(e)
    })?;

    let notice = if removed == 0 {
        Notice::success("Liked.")
    } else {
        Notice::success("Like removed.")
    };
    Ok(flash::redirect(jar, notice, &format!("/blog/{slug}")))
}

/// A live comment together with the slug of its post.
async fn find_comment(pool: &PgPool, id: i64) -> Result<(Comment, String), AppError> {
    let comment = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.id = $1 AND NOT c.is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found.".to_string()))?;

    let slug: String = sqlx::query_scalar("SELECT slug FROM posts WHERE id = $1 AND NOT is_deleted")
        .bind(comment.post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found.".to_string()))?;

    Ok((comment, slug))
}

pub async fn edit_comment_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let (comment, post_slug) = match find_comment(&pool, id).await {
        Ok(found) => found,
        Err(err) => return err.bounce(jar, "/"),
    };
    if !me.may_modify(comment.author_id) {
        return AppError::Forbidden(COMMENT_DENIED.to_string())
            .bounce(jar, &format!("/blog/{post_slug}"));
    }

    render_page(
        &templates,
        jar,
        Some(&me),
        "comment_form.html",
        context! { comment, post_slug },
    )
}

pub async fn update_comment(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let (comment, slug) = match find_comment(&pool, id).await {
        Ok(found) => found,
        Err(err) => return err.bounce(jar, "/"),
    };
    let back = format!("/blog/{slug}");
    if !me.may_modify(comment.author_id) {
        return AppError::Forbidden(COMMENT_DENIED.to_string()).bounce(jar, &back);
    }

    let body = form.comment.trim().to_string();
    if body.is_empty() {
        return AppError::Validation(COMMENT_REQUIRED.to_string())
            .bounce(jar, &format!("/comments/{id}/edit"));
    }
    if let Err(errors) = form.validate() {
        return AppError::from(errors).bounce(jar, &format!("/comments/{id}/edit"));
    }

    sqlx::query("UPDATE comments SET body = $1, updated_at = NOW() WHERE id = $2")
        .bind(body)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update comment {}: {:?}", id, e);
            AppError::from(e)
        })?;

    Ok(flash::redirect(jar, Notice::success("Comment updated."), &back))
}

/// Soft delete; replies stay attached but are no longer shown under a hidden parent.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let (comment, slug) = match find_comment(&pool, id).await {
        Ok(found) => found,
        Err(err) => return err.bounce(jar, "/"),
    };
    let back = format!("/blog/{slug}");
    if !me.may_modify(comment.author_id) {
        return AppError::Forbidden(COMMENT_DENIED.to_string()).bounce(jar, &back);
    }

    sqlx::query("UPDATE comments SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete comment {}: {:?}", id, e);
            AppError::from(e)
        })?;

    Ok(flash::redirect(jar, Notice::success("Comment deleted."), &back))
}
