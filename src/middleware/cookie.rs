// HttpOnly cookie carrying the identity token

use axum_extra::extract::cookie::{Cookie, SameSite};

/// Cookie name for the identity token
pub const TOKEN_COOKIE: &str = "token";

/// Attributes shared by the issuing and the clearing cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl CookieSettings {
    /// Production serves the SPA from another origin over HTTPS, so the
    /// cookie must be `Secure; SameSite=None`. Local development runs over
    /// plain HTTP on the same site.
    pub fn for_environment(production: bool) -> Self {
        Self {
            secure: production,
            same_site: if production { SameSite::None } else { SameSite::Strict },
            path: "/".to_string(),
        }
    }
}

fn base_cookie(value: String, settings: &CookieSettings) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, value))
        .path(settings.path.clone())
        .http_only(true)
        .secure(settings.secure)
        .same_site(settings.same_site)
        .build()
}

pub fn auth_cookie(token: String, settings: &CookieSettings) -> Cookie<'static> {
    base_cookie(token, settings)
}

/// Expired cookie with matching attributes; browsers drop the stored token.
pub fn logout_cookie(settings: &CookieSettings) -> Cookie<'static> {
    let mut cookie = base_cookie(String::new(), settings);
    cookie.make_removal();
    cookie
}
