// tests/gate_tests.rs
//
// Drives the router in-process. The pool connects lazily and is never touched: every
// request here is answered before a session reaches the account lookup, or by a static
// page. Role gates need a stored account and live in blog_tests.rs.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use blogdesk::{
    config::Config,
    models::user::Role,
    routes,
    state::AppState,
    utils::session::{Session, sign},
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

const SECRET: &str = "gate-test-secret";

fn app() -> Router {
    let config = Config {
        database_url: "postgres://nobody@127.0.0.1:1/unused".to_string(),
        session_secret: SECRET.to_string(),
        session_ttl_seconds: 600,
        cookie_secure: false,
        media_root: std::env::temp_dir().join("blogdesk-gate-media"),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        rust_log: "error".to_string(),
        admin_email: None,
        admin_password: None,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    let state = AppState::new(pool, config).expect("templates compile");
    routes::create_router(state)
}

fn session_cookie(role: Role) -> String {
    let session = Session {
        user_id: 42,
        role,
        email: "someone@example.com".to_string(),
    };
    format!("session={}", sign(&session, SECRET, 600).unwrap())
}

async fn send(method: &str, uri: &str, cookie: Option<String>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .expect("oneshot")
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn login_and_register_pages_are_public() {
    for uri in ["/login", "/register"] {
        let response = send("GET", uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_login_with_a_notice() {
    for (method, uri) in [
        ("GET", "/"),
        ("GET", "/blog/hello-world"),
        ("GET", "/dashboard"),
        ("GET", "/users"),
        ("GET", "/profile"),
        ("POST", "/posts/1/delete"),
        ("POST", "/posts/1/like"),
    ] {
        let response = send(method, uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{method} {uri}");
        assert_eq!(location(&response), "/login", "{method} {uri}");
        assert!(
            set_cookies(&response).iter().any(|c| c.starts_with("flash=")),
            "{method} {uri}"
        );
    }
}

#[tokio::test]
async fn forged_session_is_rejected_and_cleared() {
    let forged = {
        let session = Session {
            user_id: 1,
            role: Role::Admin,
            email: "admin@example.com".to_string(),
        };
        format!("session={}", sign(&session, "not-the-secret", 600).unwrap())
    };

    let response = send("GET", "/users", Some(forged)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("session=;") && c.contains("Max-Age=0"))
    );
}

#[tokio::test]
async fn logout_clears_the_session() {
    let response = send("GET", "/logout", Some(session_cookie(Role::Writer))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("session=;") && c.contains("Max-Age=0"))
    );
}
