use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use minijinja::context;
use sqlx::PgPool;

use crate::{
    config::HOME_PAGE_SIZE,
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    handlers::render_page,
    models::{
        category::{CATEGORY_SELECT, Category},
        comment::{COMMENT_SELECT, Comment},
        post::{POST_SELECT, Post, PostForm, PostInput, PostListParams, PostStatus},
        search_pattern,
        user::Role,
    },
    utils::{
        comment_tree::build_forest,
        flash::{self, Notice},
        html::clean_html,
        session::Session,
        slug::{POST_FALLBACK, make_slug, unique_slug},
        templates::Templates,
    },
};

const EDIT_DENIED: &str = "You can edit only your own blogs.";
const DELETE_DENIED: &str = "You can delete only your own blogs.";
const CONTENT_REQUIRED: &str = "Title and Content are required.";

/// Active categories in display order, for filters and the post form.
pub(crate) async fn active_categories(pool: &PgPool) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "{CATEGORY_SELECT} WHERE c.status = 'Active' ORDER BY c.sort_order, c.name"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list categories: {:?}", e);
        AppError::from(e)
    })?;

    Ok(categories)
}

/// Looks up a non-deleted post by id.
async fn find_post(pool: &PgPool, id: i64) -> Result<Post, AppError> {
    sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1 AND NOT p.is_deleted"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found.".to_string()))
}

async fn post_slug_taken(pool: &PgPool, slug: String) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1)")
        .bind(slug)
        .fetch_one(pool)
        .await
}

/// Maps constraint failures on post writes to user-facing errors.
fn post_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("A blog with this title already exists. Please try again.".to_string())
    } else if is_foreign_key_violation(&e) {
        let constraint = e.as_database_error().and_then(|db| db.constraint());
        if constraint.is_some_and(|name| name.contains("author_id") || name.contains("modified_by")) {
            // The account was deleted after the session check.
            AppError::Unauthenticated
        } else {
            AppError::Validation("Selected category does not exist.".to_string())
        }
    } else {
        tracing::error!("Failed to write post: {:?}", e);
        AppError::from(e)
    }
}

/// Home page: latest published posts, optionally searched and filtered by category.
pub async fn home(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Query(params): Query<PostListParams>,
) -> Result<Response, AppError> {
    let category_id = params.category_id();

    let posts = sqlx::query_as::<_, Post>(&format!(
        r#"
        {POST_SELECT}
        WHERE p.status = 'Published' AND NOT p.is_deleted
          AND ($1::TEXT IS NULL
               OR p.title ILIKE $1 OR p.excerpt ILIKE $1 OR p.content ILIKE $1 OR p.slug ILIKE $1)
          AND ($2::BIGINT IS NULL OR p.category_id = $2)
        ORDER BY p.published_at DESC NULLS LAST, p.updated_at DESC
        LIMIT $3
        "#
    ))
    .bind(search_pattern(params.q.as_deref()))
    .bind(category_id)
    .bind(HOME_PAGE_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::from(e)
    })?;

    let categories = active_categories(&pool).await?;

    render_page(
        &templates,
        jar,
        Some(&me),
        "home.html",
        context! {
            posts,
            categories,
            q => params.q.as_deref().unwrap_or_default().trim(),
            cat => category_id,
        },
    )
}

/// Post page with likes and the threaded comments.
///
/// Drafts exist only for admins and their author; everyone else gets a 404.
pub async fn detail(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let mut post = sqlx::query_as::<_, Post>(&format!(
        "{POST_SELECT} WHERE p.slug = $1 AND NOT p.is_deleted"
    ))
    .bind(&slug)
    .fetch_optional(&pool)
    .await?
    .filter(|post| post.status == PostStatus::Published || me.may_modify(post.author_id))
    .ok_or(AppError::NotFound("Post not found.".to_string()))?;

    if post.status == PostStatus::Published {
        match sqlx::query_scalar::<_, i32>(
            "UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING views",
        )
        .bind(post.id)
        .fetch_one(&pool)
        .await
        {
            Ok(views) => post.views = views,
            Err(e) => tracing::warn!("Failed to count view of post {}: {:?}", post.id, e),
        }
    }

    let comments = sqlx::query_as::<_, Comment>(&format!(
        r#"
        {COMMENT_SELECT}
        WHERE c.post_id = $1 AND NOT c.is_deleted AND c.status = 'Approved'
        ORDER BY c.created_at DESC, c.id DESC
        "#
    ))
    .bind(post.id)
    .fetch_all(&pool)
    .await?;

    let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
        .bind(post.id)
        .fetch_one(&pool)
        .await?;
    let liked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
    )
    .bind(post.id)
    .bind(me.user_id)
    .fetch_one(&pool)
    .await?;

    let can_modify = me.role != Role::Viewer && me.may_modify(post.author_id);

    render_page(
        &templates,
        jar,
        Some(&me),
        "detail.html",
        context! {
            post,
            comments => build_forest(comments),
            likes,
            liked,
            can_modify,
        },
    )
}

pub async fn new_post_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let categories = active_categories(&pool).await?;
    render_page(&templates, jar, Some(&me), "post_form.html", context! { categories })
}

/// Creates a post authored by the session user.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    match insert_post(&pool, &me, form).await {
        Ok(slug) => Ok(flash::redirect(
            jar,
            Notice::success("Blog created."),
            &format!("/blog/{slug}"),
        )),
        Err(err) => err.bounce(jar, "/posts/new"),
    }
}

async fn insert_post(pool: &PgPool, me: &Session, form: PostForm) -> Result<String, AppError> {
    let input = PostInput::from_form(form)?;
    let content = clean_html(&input.content);
    if content.trim().is_empty() {
        return Err(AppError::Validation(CONTENT_REQUIRED.to_string()));
    }

    let base = make_slug(&input.title, POST_FALLBACK);
    let slug = unique_slug(&base, |candidate| post_slug_taken(pool, candidate)).await?;
    let published_at = (input.status == PostStatus::Published).then(Utc::now);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts
            (title, slug, content, excerpt, featured_image, status, author_id, category_id, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(&input.title)
    .bind(&slug)
    .bind(content)
    .bind(&input.excerpt)
    .bind(&input.featured_image)
    .bind(input.status.as_str())
    .bind(me.user_id)
    .bind(input.category_id)
    .bind(published_at)
    .fetch_one(pool)
    .await
    .map_err(post_write_error)?;

    tracing::info!("User {} created post {} ({})", me.user_id, id, slug);
    Ok(slug)
}

pub async fn edit_post_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let post = match find_post(&pool, id).await {
        Ok(post) => post,
        Err(err) => return err.bounce(jar, "/"),
    };
    if !me.may_modify(post.author_id) {
        return AppError::Forbidden(EDIT_DENIED.to_string())
            .bounce(jar, &format!("/blog/{}", post.slug));
    }

    let categories = active_categories(&pool).await?;
    render_page(
        &templates,
        jar,
        Some(&me),
        "post_form.html",
        context! { post, categories },
    )
}

/// Updates the editable fields of a post. Slug and status never change here.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    let post = match find_post(&pool, id).await {
        Ok(post) => post,
        Err(err) => return err.bounce(jar, "/"),
    };
    let back = format!("/blog/{}", post.slug);
    if !me.may_modify(post.author_id) {
        return AppError::Forbidden(EDIT_DENIED.to_string()).bounce(jar, &back);
    }

    match apply_post_edit(&pool, &me, id, form).await {
        Ok(()) => Ok(flash::redirect(jar, Notice::success("Blog updated."), &back)),
        Err(err) => err.bounce(jar, &format!("/posts/{id}/edit")),
    }
}

async fn apply_post_edit(
    pool: &PgPool,
    me: &Session,
    id: i64,
    form: PostForm,
) -> Result<(), AppError> {
    let input = PostInput::from_form(form)?;
    let content = clean_html(&input.content);
    if content.trim().is_empty() {
        return Err(AppError::Validation(CONTENT_REQUIRED.to_string()));
    }

    // A blank category keeps the current one.
    sqlx::query(
        r#"
        UPDATE posts
        SET title = $1, excerpt = $2, content = $3, featured_image = $4,
            category_id = COALESCE($5, category_id),
            modified_by = $6, updated_at = NOW()
        WHERE id = $7 AND NOT is_deleted
        "#,
    )
    .bind(&input.title)
    .bind(&input.excerpt)
    .bind(content)
    .bind(&input.featured_image)
    .bind(input.category_id)
    .bind(me.user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(post_write_error)?;

    Ok(())
}

/// Moves a draft to Published and stamps `published_at`.
pub async fn publish_post(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let post = match find_post(&pool, id).await {
        Ok(post) => post,
        Err(err) => return err.bounce(jar, "/"),
    };
    let back = format!("/blog/{}", post.slug);
    if !me.may_modify(post.author_id) {
        return AppError::Forbidden(EDIT_DENIED.to_string()).bounce(jar, &back);
    }

    let published = sqlx::query(
        r#"
        UPDATE posts
        SET status = 'Published', published_at = NOW(), modified_by = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'Draft' AND NOT is_deleted
        "#,
    )
    .bind(id)
    .bind(me.user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to publish post {}: {:?}", id, e);
        AppError::from(e)
    })?
    .rows_affected();

    let notice = if published > 0 {
        tracing::info!("User {} published post {}", me.user_id, id);
        Notice::success("Blog published.")
    } else {
        Notice::warning("Blog is already published.")
    };
    Ok(flash::redirect(jar, notice, &back))
}

/// Soft delete: the row stays but disappears from every listing.
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let post = match find_post(&pool, id).await {
        Ok(post) => post,
        Err(err) => return err.bounce(jar, "/"),
    };
    if !me.may_modify(post.author_id) {
        return AppError::Forbidden(DELETE_DENIED.to_string())
            .bounce(jar, &format!("/blog/{}", post.slug));
    }

    sqlx::query("UPDATE posts SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post {}: {:?}", id, e);
            AppError::from(e)
        })?;

    tracing::info!("User {} deleted post {}", me.user_id, id);
    Ok(flash::redirect(jar, Notice::success("Blog deleted."), "/"))
}

/// Drafts awaiting publication. Writers see only their own.
pub async fn dashboard(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Query(params): Query<PostListParams>,
) -> Result<Response, AppError> {
    let author_filter = (!me.is_admin()).then_some(me.user_id);

    let drafts = sqlx::query_as::<_, Post>(&format!(
        r#"
        {POST_SELECT}
        WHERE p.status = 'Draft' AND NOT p.is_deleted
          AND ($1::BIGINT IS NULL OR p.author_id = $1)
          AND ($2::TEXT IS NULL
               OR p.title ILIKE $2 OR p.slug ILIKE $2 OR p.excerpt ILIKE $2 OR p.content ILIKE $2)
        ORDER BY p.updated_at DESC, p.id DESC
        "#
    ))
    .bind(author_filter)
    .bind(search_pattern(params.q.as_deref()))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list drafts: {:?}", e);
        AppError::from(e)
    })?;

    render_page(
        &templates,
        jar,
        Some(&me),
        "dashboard.html",
        context! {
            drafts,
            q => params.q.as_deref().unwrap_or_default().trim(),
        },
    )
}
