// src/utils/session.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    config::Config,
    error::AppError,
    models::user::{Role, User, UserStatus},
};

pub const SESSION_COOKIE: &str = "session";

/// Signed token payload stored in the session cookie.
#[derive(Debug, Deserialize, Serialize, Clone)]
struct Claims {
    /// Subject - Stores the User ID (as string).
    sub: String,
    role: String,
    email: String,
    /// Expiration time as Unix timestamp.
    exp: usize,
}

/// The authenticated identity attached to a request.
///
/// Inserted into the request extensions by [`auth_middleware`]; handlers take it with
/// `Extension<Session>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
    pub email: String,
}

impl Session {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may change anything; everyone else only what they authored.
    pub fn may_modify(&self, author_id: Option<i64>) -> bool {
        self.is_admin() || author_id == Some(self.user_id)
    }
}

pub fn sign(session: &Session, secret: &str, ttl_seconds: u64) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs()
        + ttl_seconds;

    let claims = Claims {
        sub: session.user_id.to_string(),
        role: session.role.as_str().to_owned(),
        email: session.email.clone(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a session token. Any defect yields `Unauthenticated`.
pub fn verify(token: &str, secret: &str) -> Result<Session, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;

    let claims = token_data.claims;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthenticated)?;
    let role = Role::parse(&claims.role).ok_or(AppError::Unauthenticated)?;

    Ok(Session {
        user_id,
        role,
        email: claims.email,
    })
}

/// Adds a freshly signed session cookie to the jar.
pub fn establish(jar: CookieJar, session: &Session, config: &Config) -> Result<CookieJar, AppError> {
    let token = sign(session, &config.session_secret, config.session_ttl_seconds)?;
    Ok(jar.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(config.cookie_secure)
            .same_site(SameSite::Lax),
    ))
}

pub fn destroy(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
}

/// Axum Middleware: Authentication.
///
/// Reads the session cookie and, if it verifies and the account is still active, injects
/// the `Session` into the request extensions. Otherwise redirects to the login page with
/// a notice and drops the cookie.
pub async fn auth_middleware(
    State(config): State<Config>,
    State(pool): State<PgPool>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return AppError::Unauthenticated
            .bounce(jar, "/login")
            .into_response();
    };

    let verified = match verify(&token, &config.session_secret) {
        Ok(session) => current_account(&pool, session).await,
        Err(err) => Err(err),
    };

    match verified {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(err) => err.bounce(destroy(jar), "/login").into_response(),
    }
}

/// Re-reads the account behind a verified token. A deleted or deactivated account loses
/// its session, and a changed role applies from the next request on.
async fn current_account(pool: &PgPool, session: Session) -> Result<Session, AppError> {
    let account: Option<(String, String)> =
        sqlx::query_as("SELECT role, status FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session user {}: {:?}", session.user_id, e);
                AppError::from(e)
            })?;

    let Some((role, status)) = account else {
        tracing::info!("Session refers to deleted user {}", session.user_id);
        return Err(AppError::Unauthenticated);
    };
    if UserStatus::parse(&status) != Some(UserStatus::Active) {
        return Err(AppError::AccountInactive);
    }
    let role = Role::parse(&role).ok_or(AppError::Unauthenticated)?;

    Ok(Session { role, ..session })
}

/// Must run after [`auth_middleware`]. Lets the request through only if the session
/// role is in `allowed`.
pub async fn require_role(allowed: &'static [Role], req: Request, next: Next) -> Response {
    let permitted = req
        .extensions()
        .get::<Session>()
        .is_some_and(|session| allowed.contains(&session.role));

    if !permitted {
        return AppError::Forbidden("Access denied.".to_string())
            .bounce(CookieJar::new(), "/")
            .into_response();
    }

    next.run(req).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_role(&[Role::Admin], req, next).await
}

/// Admins and writers: the roles that author posts.
pub async fn require_author(req: Request, next: Next) -> Response {
    require_role(&[Role::Admin, Role::Writer], req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: 7,
            role,
            email: "w@example.com".to_string(),
        }
    }

    #[test]
    fn signed_token_verifies_back_to_the_same_session() {
        let original = session(Role::Writer);
        let token = sign(&original, "secret", 60).unwrap();
        assert_eq!(verify(&token, "secret").unwrap(), original);
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let token = sign(&session(Role::Admin), "secret", 60).unwrap();
        assert!(matches!(
            verify(&token, "other"),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            verify("not-a-token", "secret"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn writers_modify_only_their_own_content() {
        let writer = session(Role::Writer);
        assert!(writer.may_modify(Some(7)));
        assert!(!writer.may_modify(Some(8)));
        assert!(!writer.may_modify(None));
    }

    #[test]
    fn admins_modify_anything() {
        let admin = session(Role::Admin);
        assert!(admin.may_modify(Some(8)));
        assert!(admin.may_modify(None));
    }
}
