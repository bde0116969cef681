/// Sanitises a post body before it is stored.
///
/// Whitelist based: formatting tags such as `<p>` and `<b>` survive, while `<script>`
/// (including its content), `<iframe>` and event-handler attributes are stripped.
/// Templates render the stored body with `|safe`, so nothing else may write to
/// `posts.content`.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_handlers_are_removed() {
        let cleaned = clean_html(r#"<p onclick="steal()">Hi <b>there</b></p><script>alert(1)</script>"#);
        assert_eq!(cleaned, "<p>Hi <b>there</b></p>");
    }

    #[test]
    fn plain_text_is_kept() {
        assert_eq!(clean_html("just words"), "just words");
    }
}
