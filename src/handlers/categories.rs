// src/handlers/categories.rs
//
// Category administration (admin only).

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    handlers::render_page,
    models::{
        FormMode, ListPageParams,
        category::{CATEGORY_SELECT, Category, CategoryForm, CategoryStatus, parse_sort_order},
        parse_optional_id, search_pattern,
    },
    utils::{
        flash::{self, Notice},
        session::Session,
        slug::{CATEGORY_FALLBACK, make_slug, unique_slug},
        templates::Templates,
    },
};

async fn find_category(pool: &PgPool, id: i64) -> Result<Category, AppError> {
    sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Category not found.".to_string()))
}

async fn category_slug_taken(
    pool: &PgPool,
    slug: String,
    except: Option<i64>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
    )
    .bind(slug)
    .bind(except)
    .fetch_one(pool)
    .await
}

fn category_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("A category with this name already exists. Please try again.".to_string())
    } else if is_foreign_key_violation(&e) {
        AppError::Validation("Parent category does not exist.".to_string())
    } else {
        tracing::error!("Failed to write category: {:?}", e);
        AppError::from(e)
    }
}

/// Fields shared by create and edit after the required checks.
struct CategoryInput {
    name: String,
    description: Option<String>,
    sort_order: i32,
    parent_id: Option<i64>,
}

impl CategoryInput {
    fn from_form(form: &CategoryForm) -> Result<Self, AppError> {
        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Category name is required.".to_string()));
        }
        form.validate()?;

        let description = Some(form.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self {
            name,
            description,
            sort_order: parse_sort_order(&form.sort_order),
            parent_id: parse_optional_id(&form.parent_id, "parent category")?,
        })
    }
}

/// Rejects a parent that does not exist, or (when editing `id`) one that is `id` itself
/// or sits somewhere below it.
async fn check_parent(pool: &PgPool, id: Option<i64>, parent_id: i64) -> Result<(), AppError> {
    if id == Some(parent_id) {
        return Err(AppError::Validation(
            "Category cannot be its own parent.".to_string(),
        ));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(parent_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::Validation(
            "Parent category does not exist.".to_string(),
        ));
    }

    let Some(id) = id else {
        return Ok(());
    };

    // Walk up from the proposed parent; meeting `id` on the way means a cycle.
    let cycle: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE ancestors AS (
            SELECT id, parent_id FROM categories WHERE id = $1
            UNION
            SELECT c.id, c.parent_id FROM categories c
            JOIN ancestors a ON c.id = a.parent_id
        )
        SELECT EXISTS(SELECT 1 FROM ancestors WHERE id = $2)
        "#,
    )
    .bind(parent_id)
    .bind(id)
    .fetch_one(pool)
    .await?;

    if cycle {
        return Err(AppError::Validation(
            "Category cannot be placed under one of its own subcategories.".to_string(),
        ));
    }

    Ok(())
}

async fn render_categories_page(
    pool: &PgPool,
    templates: &Templates,
    jar: CookieJar,
    me: &Session,
    q: Option<&str>,
    mode: Option<FormMode>,
    edit_category: Option<Category>,
) -> Result<Response, AppError> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        r#"
        {CATEGORY_SELECT}
        WHERE $1::TEXT IS NULL OR c.name ILIKE $1 OR c.slug ILIKE $1 OR c.description ILIKE $1
        ORDER BY c.sort_order, c.name
        "#
    ))
    .bind(search_pattern(q))
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list categories: {:?}", e);
        AppError::from(e)
    })?;

    let parent_choices =
        sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} ORDER BY c.name"))
            .fetch_all(pool)
            .await?;

    render_page(
        templates,
        jar,
        Some(me),
        "categories.html",
        context! {
            categories,
            parent_choices,
            q => q.unwrap_or_default().trim(),
            mode,
            c => edit_category,
            statuses => CategoryStatus::ALL,
        },
    )
}

/// `GET /categories?q=&mode=create|edit&category_id=`
pub async fn list_categories(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Query(params): Query<ListPageParams>,
) -> Result<Response, AppError> {
    let (mode, category_id) = params.form(params.category_id.as_deref());
    let edit_category = match category_id {
        Some(id) => match find_category(&pool, id).await {
            Ok(category) => Some(category),
            Err(err) => return err.bounce(jar, "/categories"),
        },
        None => None,
    };

    render_categories_page(
        &pool,
        &templates,
        jar,
        &me,
        params.q.as_deref(),
        mode,
        edit_category,
    )
    .await
}

pub async fn new_category_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    render_categories_page(&pool, &templates, jar, &me, None, Some(FormMode::Create), None).await
}

pub async fn create_category(
    State(pool): State<PgPool>,
    jar: CookieJar,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    match insert_category(&pool, form).await {
        Ok(slug) => {
            tracing::info!("Created category {}", slug);
            Ok(flash::redirect(
                jar,
                Notice::success("Category created successfully."),
                "/categories",
            ))
        }
        Err(err) => err.bounce(jar, "/categories?mode=create"),
    }
}

async fn insert_category(pool: &PgPool, form: CategoryForm) -> Result<String, AppError> {
    let input = CategoryInput::from_form(&form)?;
    let status = CategoryStatus::parse(&form.status).unwrap_or(CategoryStatus::Active);
    if let Some(parent_id) = input.parent_id {
        check_parent(pool, None, parent_id).await?;
    }

    let base = make_slug(&input.name, CATEGORY_FALLBACK);
    let slug = unique_slug(&base, |candidate| category_slug_taken(pool, candidate, None)).await?;

    sqlx::query(
        r#"
        INSERT INTO categories (name, slug, description, status, parent_id, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&input.name)
    .bind(&slug)
    .bind(&input.description)
    .bind(status.as_str())
    .bind(input.parent_id)
    .bind(input.sort_order)
    .execute(pool)
    .await
    .map_err(category_write_error)?;

    Ok(slug)
}

pub async fn edit_category_page(
    State(pool): State<PgPool>,
    State(templates): State<Templates>,
    Extension(me): Extension<Session>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let category = match find_category(&pool, id).await {
        Ok(category) => category,
        Err(err) => return err.bounce(jar, "/categories"),
    };
    render_categories_page(
        &pool,
        &templates,
        jar,
        &me,
        None,
        Some(FormMode::Edit),
        Some(category),
    )
    .await
}

/// Any rejected edit leaves the row untouched.
pub async fn update_category(
    State(pool): State<PgPool>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    let category = match find_category(&pool, id).await {
        Ok(category) => category,
        Err(err) => return err.bounce(jar, "/categories"),
    };
    match apply_category_edit(&pool, &category, form).await {
        Ok(()) => Ok(flash::redirect(
            jar,
            Notice::success("Category updated successfully."),
            "/categories",
        )),
        Err(err) => err.bounce(jar, &format!("/categories?mode=edit&category_id={id}")),
    }
}

async fn apply_category_edit(
    pool: &PgPool,
    category: &Category,
    form: CategoryForm,
) -> Result<(), AppError> {
    let input = CategoryInput::from_form(&form)?;
    let status = CategoryStatus::parse(&form.status).unwrap_or(category.status);
    if let Some(parent_id) = input.parent_id {
        check_parent(pool, Some(category.id), parent_id).await?;
    }

    // The row's own slug never counts as taken, so an unchanged name keeps it.
    let base = make_slug(&input.name, CATEGORY_FALLBACK);
    let slug = unique_slug(&base, |candidate| {
        category_slug_taken(pool, candidate, Some(category.id))
    })
    .await?;

    sqlx::query(
        r#"
        UPDATE categories
        SET name = $1, slug = $2, description = $3, status = $4, parent_id = $5,
            sort_order = $6, updated_at = NOW()
        WHERE id = $7
        "#,
    )
    .bind(&input.name)
    .bind(&slug)
    .bind(&input.description)
    .bind(status.as_str())
    .bind(input.parent_id)
    .bind(input.sort_order)
    .bind(category.id)
    .execute(pool)
    .await
    .map_err(category_write_error)?;

    Ok(())
}

/// Hard delete, falling back to marking the category Inactive while posts still use it.
pub async fn delete_category(
    State(pool): State<PgPool>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            AppError::NotFound("Category not found.".to_string()).bounce(jar, "/categories")
        }
        Ok(_) => {
            tracing::info!("Deleted category {}", id);
            Ok(flash::redirect(
                jar,
                Notice::success("Category deleted successfully."),
                "/categories",
            ))
        }
        Err(e) if is_foreign_key_violation(&e) => {
            sqlx::query(
                "UPDATE categories SET status = 'Inactive', updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to deactivate category {}: {:?}", id, e);
                AppError::from(e)
            })?;

            tracing::info!("Category {} is referenced by posts; marked Inactive", id);
            Ok(flash::redirect(
                jar,
                Notice::warning("Category is used in blogs, so it was marked Inactive instead."),
                "/categories",
            ))
        }
        Err(e) => {
            tracing::error!("Failed to delete category {}: {:?}", id, e);
            Err(AppError::from(e))
        }
    }
}
