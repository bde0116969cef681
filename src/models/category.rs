use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

text_enum! {
    CategoryStatus {
        Active => "Active",
        Inactive => "Inactive",
    }
}

/// Selects every [`Category`] column, with the parent's name joined in.
pub const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.status, c.parent_id,
           p.name AS parent_name, c.sort_order, c.created_at, c.updated_at
    FROM categories c
    LEFT JOIN categories p ON p.id = c.parent_id
"#;

/// Represents the 'categories' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CategoryStatus,
    pub parent_id: Option<i64>,
    pub parent_name: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating or editing a category. Every field arrives as raw text.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CategoryForm {
    #[validate(length(max = 150, message = "Category name is too long."))]
    pub name: String,
    #[validate(length(max = 255, message = "Description is too long."))]
    pub description: String,
    pub status: String,
    pub sort_order: String,
    pub parent_id: String,
}

/// Integer sort order; anything unparsable counts as 0.
pub fn parse_sort_order(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or(0)
}
