//! Identity tokens and the gate in front of user-scoped routes.
//!
//! `POST /jwt` signs an HS256 token carrying the caller's email and returns
//! it in an HttpOnly cookie. Gated handlers take an [`AuthUser`] argument;
//! the extractor rejects the request with 401 before the handler runs when
//! the cookie is missing, forged or expired.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cookie::{CookieSettings, TOKEN_COOKIE};
use crate::config::AuthConfig;
use crate::models::AppState;
use crate::types::{AppError, AppResult};

const UNAUTHORIZED: &str = "unauthorized access";

/// Identity claim embedded in the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing material and cookie attributes, built once at startup.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    cookies: CookieSettings,
}

impl TokenKeys {
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl: Duration::days(config.token_ttl_days),
            cookies: CookieSettings::for_environment(config.is_production()),
        }
    }

    pub fn cookie_settings(&self) -> &CookieSettings {
        &self.cookies
    }

    pub fn issue(&self, email: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected identity token: {}", e);
                AppError::unauthorized(UNAUTHORIZED)
            })
    }
}

/// Caller identity taken from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
}

impl AuthUser {
    /// Scope check for routes keyed by an email path parameter.
    pub fn require_email(&self, email: &str) -> AppResult<()> {
        if self.email != email {
            warn!(caller = %self.email, requested = %email, "Identity does not match requested user");
            return Err(AppError::unauthorized(UNAUTHORIZED));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(TOKEN_COOKIE).map(|c| c.value()).ok_or_else(|| {
            debug!(path = %parts.uri.path(), "Request without identity cookie");
            AppError::unauthorized(UNAUTHORIZED)
        })?;

        let claims = state.keys.verify(token)?;
        Ok(AuthUser { email: claims.email })
    }
}
