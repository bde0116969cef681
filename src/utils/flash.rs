//! One-shot notices carried across a redirect in a short-lived cookie.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use url::form_urlencoded;

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(Level::Success),
            "warning" => Some(Level::Warning),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("level", self.level.as_str())
            .append_pair("message", &self.message)
            .finish()
    }

    fn decode(raw: &str) -> Option<Self> {
        let mut level = None;
        let mut message = None;
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "level" => level = Level::parse(&value),
                "message" => message = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            level: level?,
            message: message?,
        })
    }
}

/// Queues `notice` for the next rendered page.
pub fn push(jar: CookieJar, notice: Notice) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, notice.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Reads the pending notice, if any, and clears it.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Notice>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };
    let notice = Notice::decode(cookie.value());
    (jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/")), notice)
}

/// 303 redirect to `to` carrying `notice`.
pub fn redirect(jar: CookieJar, notice: Notice, to: &str) -> Response {
    (push(jar, notice), Redirect::to(to)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_survives_cookie_encoding() {
        let notice = Notice::warning("Category is used in blogs, so it was marked Inactive; 100% sure?");
        let jar = push(CookieJar::new(), notice.clone());

        let (jar, taken) = take(jar);
        assert_eq!(taken, Some(notice));

        // Taking again yields nothing: the cookie was replaced by a removal.
        let (_, again) = take(jar);
        assert_eq!(again, None);
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "level=loud"));
        let (_, taken) = take(jar);
        assert_eq!(taken, None);
    }
}
