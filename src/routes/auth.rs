// Identity cookie issue and removal

use axum::{extract::State, routing::{get, post}, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::middleware::{auth_cookie, logout_cookie};
use crate::models::{AppState, IdentityRequest};
use crate::types::{AppResult, JsonBody};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jwt", post(issue_token))
        .route("/logout", get(logout))
}

async fn issue_token(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(request): JsonBody<IdentityRequest>,
) -> AppResult<(CookieJar, Json<Value>)> {
    request.validate()?;

    let token = state.keys.issue(&request.email)?;
    info!(email = %request.email, "Issued identity token");

    let cookie = auth_cookie(token, state.keys.cookie_settings());
    Ok((jar.add(cookie), Json(json!({ "success": true }))))
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let cookie = logout_cookie(state.keys.cookie_settings());
    (jar.add(cookie), Json(json!({ "success": true })))
}
