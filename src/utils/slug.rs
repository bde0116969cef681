//! URL slugs for posts and categories.

use std::future::Future;

pub const POST_FALLBACK: &str = "post";
pub const CATEGORY_FALLBACK: &str = "category";

/// Leaves room for a numeric suffix inside the 255/200-char slug columns.
const MAX_SLUG_CHARS: usize = 180;

/// Lower-cases `text` and joins its alphanumeric runs with single `-`.
///
/// Returns `fallback` when nothing alphanumeric is left.
pub fn make_slug(text: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut chars = 0;
    let mut separator_pending = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if !ch.is_alphanumeric() {
            separator_pending = true;
            continue;
        }

        let needs_separator = separator_pending && !slug.is_empty();
        let width = if needs_separator { 2 } else { 1 };
        if chars + width > MAX_SLUG_CHARS {
            break;
        }
        if needs_separator {
            slug.push('-');
        }
        slug.push(ch);
        chars += width;
        separator_pending = false;
    }

    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Finds the first of `base`, `base-2`, `base-3`, ... for which `exists` reports false.
///
/// Only as strong as the check: two concurrent writers can both get the same answer,
/// so callers still rely on the column's unique constraint.
pub async fn unique_slug<F, Fut, E>(base: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut candidate = base.to_string();
    let mut suffix: u32 = 2;

    while exists(candidate.clone()).await? {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    async fn unique_among(base: &str, taken: &[&str]) -> String {
        let taken: HashSet<String> = taken.iter().map(|s| s.to_string()).collect();
        unique_slug(base, |candidate| {
            let hit = taken.contains(&candidate);
            async move { Ok::<_, Infallible>(hit) }
        })
        .await
        .unwrap()
    }

    #[test]
    fn slugs_collapse_punctuation_and_whitespace() {
        assert_eq!(make_slug("Tech News", CATEGORY_FALLBACK), "tech-news");
        assert_eq!(make_slug("Tech News!!", CATEGORY_FALLBACK), "tech-news");
        assert_eq!(make_slug("  --Hello,   World--  ", POST_FALLBACK), "hello-world");
        assert_eq!(make_slug("Rust 2024: what's new?", POST_FALLBACK), "rust-2024-what-s-new");
        assert_eq!(make_slug("Ünïcode Café", POST_FALLBACK), "ünïcode-café");
    }

    #[test]
    fn empty_slugs_fall_back() {
        assert_eq!(make_slug("", POST_FALLBACK), "post");
        assert_eq!(make_slug("!!! ---", CATEGORY_FALLBACK), "category");
    }

    #[test]
    fn slugs_are_always_well_formed() {
        let long = "long title ".repeat(40);
        let inputs = [
            "",
            "-",
            "a",
            "A--B",
            "__init__",
            "x  y\tz\n",
            "İstanbul",
            "emoji 🚀 launch",
            "ends with dash-",
            long.as_str(),
        ];
        for input in inputs {
            let slug = make_slug(input, POST_FALLBACK);
            assert!(!slug.is_empty(), "{input:?}");
            assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{input:?} -> {slug}");
            assert!(!slug.contains("--"), "{input:?} -> {slug}");
            assert!(slug.chars().count() <= MAX_SLUG_CHARS, "{input:?}");
            assert!(
                slug.chars()
                    .all(|c| c == '-' || (c.is_alphanumeric() && !c.is_uppercase())),
                "{input:?} -> {slug}"
            );
        }
    }

    #[tokio::test]
    async fn free_base_is_returned_unchanged() {
        assert_eq!(unique_among("tech-news", &["other"]).await, "tech-news");
    }

    #[tokio::test]
    async fn taken_base_gets_the_next_free_suffix() {
        assert_eq!(unique_among("tech-news", &["tech-news"]).await, "tech-news-2");
        assert_eq!(
            unique_among("a", &["a", "a-2", "a-3"]).await,
            "a-4"
        );
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let result = unique_slug("x", |_| async { Err::<bool, &str>("store down") }).await;
        assert_eq!(result, Err("store down"));
    }
}
