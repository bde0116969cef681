use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use crate::{error::AppError, models::parse_optional_id};

text_enum! {
    PostStatus {
        Draft => "Draft",
        Published => "Published",
    }
}

/// Selects every [`Post`] column with the author and category names joined in.
/// Callers append their own `WHERE` clause; soft-deleted rows must always be excluded.
pub const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image, p.status,
           p.views, p.author_id,
           NULLIF(TRIM(CONCAT(u.first_name, ' ', u.last_name)), '') AS author_name,
           p.modified_by, p.category_id, c.name AS category_name,
           p.date_added, p.updated_at, p.published_at
    FROM posts p
    LEFT JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// Represents a non-deleted row of the 'posts' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,

    /// Sanitised HTML.
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: PostStatus,

    pub views: i32,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub modified_by: Option<i64>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,

    pub date_added: NaiveDate,
    pub updated_at: DateTime<Utc>,

    /// Set when the post first becomes Published.
    pub published_at: Option<DateTime<Utc>>,
}

/// DTO for the create/edit post form.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PostForm {
    #[validate(length(max = 255, message = "Title must be at most 255 characters."))]
    pub title: String,
    #[validate(length(max = 300, message = "Excerpt must be at most 300 characters."))]
    pub excerpt: String,
    #[validate(length(max = 100_000, message = "Content is too long."))]
    pub content: String,
    #[validate(length(max = 500, message = "Featured image URL is too long."))]
    pub featured_image: String,
    pub category_id: String,
    pub status: String,
}

/// A post form after trimming, required-field checks and parsing.
#[derive(Debug, PartialEq)]
pub struct PostInput {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
    /// Unknown or blank values become Draft.
    pub status: PostStatus,
}

impl PostInput {
    pub fn from_form(form: PostForm) -> Result<Self, AppError> {
        let title = form.title.trim().to_string();
        let content = form.content.trim().to_string();
        if title.is_empty() || content.is_empty() {
            return Err(AppError::Validation(
                "Title and Content are required.".to_string(),
            ));
        }

        let form = PostForm {
            title,
            content,
            excerpt: form.excerpt.trim().to_string(),
            featured_image: form.featured_image.trim().to_string(),
            ..form
        };
        form.validate()?;

        let featured_image = match form.featured_image.as_str() {
            "" => None,
            raw => Some(parse_image_url(raw)?),
        };

        Ok(Self {
            category_id: parse_optional_id(&form.category_id, "category")?,
            status: PostStatus::parse(&form.status).unwrap_or(PostStatus::Draft),
            title: form.title,
            excerpt: form.excerpt,
            content: form.content,
            featured_image,
        })
    }
}

/// Column width of `featured_image`.
const IMAGE_URL_MAX_CHARS: usize = 500;

/// Normalises the URL; percent-encoding can make it longer than what was typed.
fn parse_image_url(raw: &str) -> Result<String, AppError> {
    let url = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url.to_string(),
        _ => {
            return Err(AppError::Validation(
                "Featured image must be an http(s) URL.".to_string(),
            ));
        }
    };

    if url.chars().count() > IMAGE_URL_MAX_CHARS {
        return Err(AppError::Validation(
            "Featured image URL is too long.".to_string(),
        ));
    }
    Ok(url)
}

/// Query parameters for the home page and the drafts dashboard.
#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    /// Free-text search across title, excerpt, content and slug.
    pub q: Option<String>,

    /// Category id; ignored unless numeric.
    pub cat: Option<String>,
}

impl PostListParams {
    pub fn category_id(&self) -> Option<i64> {
        self.cat.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, content: &str) -> PostForm {
        PostForm {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    #[test]
    fn title_and_content_are_required() {
        for (title, content) in [("", "body"), ("Title", "   "), (" ", "")] {
            let err = PostInput::from_form(form(title, content)).unwrap_err();
            assert_eq!(err.message(), "Title and Content are required.");
        }
    }

    #[test]
    fn status_defaults_to_draft() {
        let input = PostInput::from_form(form(" Hello ", " World ")).unwrap();
        assert_eq!(input.title, "Hello");
        assert_eq!(input.content, "World");
        assert_eq!(input.status, PostStatus::Draft);
        assert_eq!(input.category_id, None);

        let mut published = form("Hello", "World");
        published.status = "published".into();
        published.category_id = "3".into();
        let input = PostInput::from_form(published).unwrap();
        assert_eq!(input.status, PostStatus::Published);
        assert_eq!(input.category_id, Some(3));
    }

    #[test]
    fn featured_image_must_be_a_web_url() {
        let mut with_image = form("Hello", "World");
        with_image.featured_image = "javascript:alert(1)".into();
        assert!(PostInput::from_form(with_image).is_err());

        let mut with_image = form("Hello", "World");
        with_image.featured_image = "https://cdn.example.com/a.png".into();
        assert_eq!(
            PostInput::from_form(with_image).unwrap().featured_image.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[test]
    fn featured_image_is_measured_after_normalising() {
        // 300 spaces pass the raw length check but encode to 900 characters.
        let mut with_image = form("Hello", "World");
        with_image.featured_image = format!("https://cdn.example.com/{}x.png", " ".repeat(300));
        let err = PostInput::from_form(with_image).unwrap_err();
        assert_eq!(err.message(), "Featured image URL is too long.");
    }

    #[test]
    fn non_numeric_category_filter_is_ignored() {
        let params = PostListParams {
            q: None,
            cat: Some("tech".into()),
        };
        assert_eq!(params.category_id(), None);
    }
}
