//! Page templates, compiled once at startup.

use std::sync::Arc;

use axum::response::Html;
use minijinja::{Environment, Value};

use crate::error::AppError;

pub type Templates = Arc<Environment<'static>>;

const PAGES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("register.html", include_str!("../../templates/register.html")),
    ("home.html", include_str!("../../templates/home.html")),
    ("detail.html", include_str!("../../templates/detail.html")),
    ("post_form.html", include_str!("../../templates/post_form.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("users.html", include_str!("../../templates/users.html")),
    ("categories.html", include_str!("../../templates/categories.html")),
    ("profile.html", include_str!("../../templates/profile.html")),
    ("profile_edit.html", include_str!("../../templates/profile_edit.html")),
    ("comment_form.html", include_str!("../../templates/comment_form.html")),
];

pub fn load() -> Result<Templates, minijinja::Error> {
    let mut env = Environment::new();
    for &(name, source) in PAGES {
        env.add_template(name, source)?;
    }
    Ok(Arc::new(env))
}

/// Renders `name`; `.html` templates auto-escape every interpolated value.
pub fn render(templates: &Environment<'_>, name: &str, ctx: Value) -> Result<Html<String>, AppError> {
    let template = templates.get_template(name)?;
    Ok(Html(template.render(ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            comment::{Comment, CommentStatus},
            user::Role,
        },
        utils::{comment_tree::build_forest, flash::Notice, session::Session},
    };
    use chrono::Utc;
    use minijinja::context;

    fn comment(id: i64, parent_id: Option<i64>, body: &str) -> Comment {
        Comment {
            id,
            post_id: 1,
            author_id: Some(2),
            author_name: None,
            body: body.into(),
            status: CommentStatus::Approved,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn every_page_compiles() {
        let templates = load().unwrap();
        for (name, _) in PAGES {
            assert!(templates.get_template(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn login_page_shows_the_pending_notice_escaped() {
        let templates = load().unwrap();
        let html = render(
            &templates,
            "login.html",
            context! { notice => Notice::error("<b>Invalid email or password</b>") },
        )
        .unwrap()
        .0;
        assert!(html.contains("&lt;b&gt;Invalid email or password&lt;/b&gt;"));
    }

    #[test]
    fn detail_page_renders_nested_replies() {
        let templates = load().unwrap();
        let me = Session {
            user_id: 2,
            role: Role::Viewer,
            email: "v@example.com".into(),
        };
        let post = context! {
            id => 1, title => "Hello", slug => "hello", content => "<p>Body</p>",
            excerpt => "", status => "Published", views => 0, author_id => 5,
            author_name => "Wri Ter", category_name => (), featured_image => (),
            published_at => "2025-01-01T00:00:00Z", updated_at => "2025-01-01T00:00:00Z",
        };
        let comments = build_forest(vec![
            comment(3, Some(2), "deep reply"),
            comment(2, Some(1), "first reply"),
            comment(1, None, "top level"),
        ]);

        let html = render(
            &templates,
            "detail.html",
            context! { me, post, comments, likes => 0, liked => false, can_modify => false },
        )
        .unwrap()
        .0;

        assert!(html.contains("<p>Body</p>"));
        for body in ["top level", "first reply", "deep reply"] {
            assert!(html.contains(body), "{body}");
        }
        assert!(html.find("top level") < html.find("deep reply"));
    }

    #[test]
    fn detail_page_renders_a_long_reply_chain() {
        let templates = load().unwrap();
        let me = Session {
            user_id: 2,
            role: Role::Viewer,
            email: "v@example.com".into(),
        };
        let post = context! {
            id => 1, title => "Hello", slug => "hello", content => "<p>Body</p>",
            excerpt => "", status => "Published", views => 0, author_id => 5,
            author_name => "Wri Ter", category_name => (), featured_image => (),
            published_at => "2025-01-01T00:00:00Z", updated_at => "2025-01-01T00:00:00Z",
        };
        let chain = (1..=1_200)
            .rev()
            .map(|id| comment(id, (id > 1).then(|| id - 1), &format!("link {id}")))
            .collect();
        let comments = build_forest(chain);

        let html = render(
            &templates,
            "detail.html",
            context! { me, post, comments, likes => 0, liked => false, can_modify => false },
        )
        .unwrap()
        .0;

        assert!(html.contains("link 1<"));
        assert!(html.contains("link 1200<"));
    }
}
