use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

text_enum! {
    /// New comments are always Approved; Pending exists for rows moderated elsewhere.
    CommentStatus {
        Approved => "Approved",
        Pending => "Pending",
    }
}

/// Selects every [`Comment`] column with the author's display name joined in.
pub const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id,
           NULLIF(TRIM(CONCAT(u.first_name, ' ', u.last_name)), '') AS author_name,
           c.body, c.status, c.parent_id, c.created_at, c.updated_at
    FROM comments c
    LEFT JOIN users u ON u.id = c.author_id
"#;

/// Represents the 'comments' table joined with the author's display name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub status: CommentStatus,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for posting a comment or a reply from the detail page.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(max = 5000, message = "Comment is too long."))]
    pub comment: String,

    /// The comment being replied to. Anything unusable makes a top-level comment.
    pub parent_id: String,
}

impl CommentForm {
    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id.trim().parse().ok()
    }
}
