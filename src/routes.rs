// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::MAX_PROFILE_PIC_BYTES,
    handlers::{admin, auth, blog, categories, interaction, profile},
    state::AppState,
    utils::session::{auth_middleware, require_admin, require_author},
};

/// Room for the text fields of the profile form next to the picture.
const PROFILE_FORM_LIMIT: usize = MAX_PROFILE_PIC_BYTES + 64 * 1024;

/// Assembles the main application router.
///
/// * Public: login, registration, logout and uploaded media.
/// * Everything else requires a session; post authoring additionally requires the
///   admin or writer role, user and category administration the admin role.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout).post(auth::logout));

    let author_routes = Router::new()
        .route("/posts/new", get(blog::new_post_page).post(blog::create_post))
        .route(
            "/posts/{id}/edit",
            get(blog::edit_post_page).post(blog::update_post),
        )
        .route("/posts/{id}/delete", post(blog::delete_post))
        .route("/posts/{id}/publish", post(blog::publish_post))
        .route("/dashboard", get(blog::dashboard))
        .route_layer(middleware::from_fn(require_author));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/new", get(admin::new_user_page).post(admin::create_user))
        .route(
            "/users/{id}/edit",
            get(admin::edit_user_page).post(admin::update_user),
        )
        .route("/users/{id}/delete", post(admin::delete_user))
        .route("/categories", get(categories::list_categories))
        .route(
            "/categories/new",
            get(categories::new_category_page).post(categories::create_category),
        )
        .route(
            "/categories/{id}/edit",
            get(categories::edit_category_page).post(categories::update_category),
        )
        .route("/categories/{id}/delete", post(categories::delete_category))
        .route_layer(middleware::from_fn(require_admin));

    // Auth runs first (outermost), then the role checks above.
    let member_routes = Router::new()
        .route("/", get(blog::home))
        .route(
            "/blog/{slug}",
            get(blog::detail).post(interaction::add_comment),
        )
        .route("/posts/{id}/like", post(interaction::toggle_like))
        .route(
            "/comments/{id}/edit",
            get(interaction::edit_comment_page).post(interaction::update_comment),
        )
        .route("/comments/{id}/delete", post(interaction::delete_comment))
        .route("/profile", get(profile::show_profile))
        .route(
            "/profile/edit",
            get(profile::edit_profile_page)
                .post(profile::update_profile)
                .layer(DefaultBodyLimit::max(PROFILE_FORM_LIMIT)),
        )
        .merge(author_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .nest_service("/media", ServeDir::new(&state.config.media_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
