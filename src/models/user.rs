// src/models/user.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

text_enum! {
    /// Access level, lowest privilege last.
    Role {
        Admin => "admin",
        Writer => "writer",
        Viewer => "viewer",
    }
}

text_enum! {
    UserStatus {
        Active => "Active",
        Inactive => "Inactive",
    }
}

/// Column list matching [`User`].
pub const USER_COLUMNS: &str = "id, first_name, last_name, email, username, password_hash, \
     role, status, bio, profile_pic, created_at, updated_at, last_login";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]{3,100}$").expect("static username pattern"));

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,

    /// Unique, stored lower-cased.
    pub email: String,

    /// Optional unique handle, set from the profile page.
    pub username: Option<String>,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    #[sqlx(try_from = "String")]
    pub role: Role,

    #[sqlx(try_from = "String")]
    pub status: UserStatus,

    pub bio: Option<String>,

    /// Path relative to the media root, e.g. `profile_pics/<uuid>.png`.
    pub profile_pic: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Trimmed, lower-cased email as stored and looked up.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Column width of `first_name` and `last_name`.
const NAME_MAX_CHARS: usize = 100;

/// Splits a display name into first name and the remaining words, rejecting either half
/// when it is wider than its column.
pub fn split_name(name: &str) -> Result<(String, String), AppError> {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");

    if first.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation("First name is too long.".to_string()));
    }
    if last.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation("Last name is too long.".to_string()));
    }
    Ok((first, last))
}

/// DTO for user login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// DTO for self-registration. The role is never taken from the client.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    #[validate(length(max = 200, message = "Name is too long."))]
    pub name: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 150, message = "Email is too long.")
    )]
    pub email: String,
    #[validate(length(max = 128, message = "Password is too long."))]
    pub password: String,
    pub confirm_password: String,
}

/// DTO for an admin creating or editing a user.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UserForm {
    #[validate(length(max = 100, message = "First name is too long."))]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name is too long."))]
    pub last_name: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 150, message = "Email is too long.")
    )]
    pub email: String,
    pub role: String,
    pub status: String,
    #[validate(length(max = 128, message = "Password is too long."))]
    pub password: String,
    pub confirm_password: String,
}

/// Fields of the self-service profile form (sent as multipart).
#[derive(Debug, Default, Validate)]
pub struct ProfileForm {
    #[validate(length(max = 100, message = "First name is too long."))]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name is too long."))]
    pub last_name: String,
    /// `None` keeps the current username.
    #[validate(regex(
        path = *USERNAME_RE,
        message = "Username must be 3-100 letters, digits or @.+-_ characters."
    ))]
    pub username: Option<String>,
    /// `None` clears the bio.
    #[validate(length(max = 2000, message = "Bio is too long."))]
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_split_on_first_word() {
        assert_eq!(split_name("Jane Doe").unwrap(), ("Jane".into(), "Doe".into()));
        assert_eq!(
            split_name("  Mary  Ann   Smith ").unwrap(),
            ("Mary".into(), "Ann Smith".into())
        );
        assert_eq!(split_name("Cher").unwrap(), ("Cher".into(), String::new()));
    }

    #[test]
    fn name_halves_must_fit_their_columns() {
        let long_word = "N".repeat(150);
        let err = split_name(&long_word).unwrap_err();
        assert_eq!(err.message(), "First name is too long.");

        let many_words = vec!["Ann"; 40].join(" ");
        let err = split_name(&format!("Jane {many_words}")).unwrap_err();
        assert_eq!(err.message(), "Last name is too long.");

        assert!(split_name(&"N".repeat(100)).is_ok());
    }

    #[test]
    fn emails_longer_than_the_column_are_rejected() {
        // Well-formed, but 161 characters long.
        let long_email = format!(
            "jane@{}.{}.{}.com",
            "a".repeat(60),
            "b".repeat(60),
            "c".repeat(30)
        );
        let length_error = |errors: validator::ValidationErrors| {
            errors.field_errors()["email"]
                .iter()
                .any(|e| e.code == "length")
        };

        let form = RegisterForm {
            name: "Jane Doe".into(),
            email: long_email.clone(),
            password: "secret".into(),
            confirm_password: "secret".into(),
        };
        assert!(length_error(form.validate().unwrap_err()));

        let form = UserForm {
            first_name: "Jane".into(),
            email: long_email,
            ..Default::default()
        };
        assert!(length_error(form.validate().unwrap_err()));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Jane@X.com "), "jane@x.com");
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(Role::parse(" Writer "), Some(Role::Writer));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::try_from("viewer".to_string()).unwrap(), Role::Viewer);
        assert!(UserStatus::try_from("Suspended".to_string()).is_err());
    }

    #[test]
    fn usernames_are_checked_only_when_given() {
        let mut form = ProfileForm {
            first_name: "Jane".into(),
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        form.username = Some("jane.doe".into());
        assert!(form.validate().is_ok());

        form.username = Some("no spaces".into());
        assert!(form.validate().is_err());
    }
}
