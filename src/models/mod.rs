// src/models/mod.rs

use std::fmt;

use crate::error::AppError;

/// Returned when a stored text column holds a value outside its enum.
#[derive(Debug)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares an enum persisted as a TEXT column.
///
/// Rows decode it with `#[sqlx(try_from = "String")]`; templates see the text form.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Case-insensitive, whitespace-tolerant lookup of the text form.
            pub fn parse(raw: &str) -> Option<Self> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(raw))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value).ok_or($crate::models::UnknownVariant {
                    kind: stringify!($name),
                    value,
                })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

pub mod category;
pub mod comment;
pub mod post;
pub mod user;

/// `%term%` for ILIKE substring filters, or `None` when the search box is blank.
///
/// `%`, `_` and `\` in the term are escaped with ILIKE's default `\` escape character,
/// so they only match themselves.
pub fn search_pattern(q: Option<&str>) -> Option<String> {
    let q = q.map(str::trim).filter(|q| !q.is_empty())?;

    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for ch in q.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

/// Parses an optional numeric id from a form field; blank means "none".
pub fn parse_optional_id(raw: &str, label: &str) -> Result<Option<i64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| AppError::Validation(format!("Invalid {label}.")))
}

/// Which inline form a list page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    Create,
    Edit,
}

impl FormMode {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("create") => Some(FormMode::Create),
            Some("edit") => Some(FormMode::Edit),
            _ => None,
        }
    }
}

/// Query string shared by the users and categories pages.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListPageParams {
    pub q: Option<String>,
    pub mode: Option<String>,
    pub user_id: Option<String>,
    pub category_id: Option<String>,
}

impl ListPageParams {
    /// Resolves `mode` plus the id it needs. `edit` without a positive id shows no form.
    pub fn form(&self, id: Option<&str>) -> (Option<FormMode>, Option<i64>) {
        match FormMode::parse(self.mode.as_deref()) {
            Some(FormMode::Edit) => match id.and_then(|raw| raw.trim().parse::<i64>().ok()) {
                Some(id) if id > 0 => (Some(FormMode::Edit), Some(id)),
                _ => (None, None),
            },
            mode => (mode, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_has_no_pattern() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some(" rust ")), Some("%rust%".to_string()));
    }

    #[test]
    fn search_wildcards_match_literally() {
        assert_eq!(search_pattern(Some("_")), Some(r"%\_%".to_string()));
        assert_eq!(search_pattern(Some("100%")), Some(r"%100\%%".to_string()));
        assert_eq!(search_pattern(Some(r"a\b")), Some(r"%a\\b%".to_string()));
    }

    #[test]
    fn optional_ids_accept_blank_and_reject_garbage() {
        assert_eq!(parse_optional_id("", "category").unwrap(), None);
        assert_eq!(parse_optional_id(" 12 ", "category").unwrap(), Some(12));
        assert!(matches!(
            parse_optional_id("twelve", "category"),
            Err(AppError::Validation(msg)) if msg == "Invalid category."
        ));
    }

    #[test]
    fn edit_mode_requires_a_positive_id() {
        let params = ListPageParams {
            mode: Some("EDIT".into()),
            user_id: Some("4".into()),
            ..Default::default()
        };
        assert_eq!(
            params.form(params.user_id.as_deref()),
            (Some(FormMode::Edit), Some(4))
        );

        let params = ListPageParams {
            mode: Some("edit".into()),
            user_id: Some("0".into()),
            ..Default::default()
        };
        assert_eq!(params.form(params.user_id.as_deref()), (None, None));

        let params = ListPageParams {
            mode: Some("bogus".into()),
            ..Default::default()
        };
        assert_eq!(params.form(None), (None, None));

        let params = ListPageParams {
            mode: Some("create".into()),
            ..Default::default()
        };
        assert_eq!(params.form(None), (Some(FormMode::Create), None));
    }
}
