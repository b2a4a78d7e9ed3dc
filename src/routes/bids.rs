// Bid endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::middleware::AuthUser;
use crate::models::{AppState, Bid, BidFilter, InsertResult, NewBid, StatusUpdate, UpdateResult};
use crate::types::{parse_id, AppResult, JsonBody};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add-bid", post(add_bid))
        .route("/bids/{email}", get(bids_for_user))
        .route("/bid-status-update/{id}", patch(update_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct BidListParams {
    pub buyer: Option<String>,
}

impl BidListParams {
    /// `?buyer=true` (or any value other than empty, `false`, `0`) lists
    /// incoming bids on the caller's jobs instead of bids the caller placed.
    pub fn filter_for(&self, email: String) -> BidFilter {
        match self.buyer.as_deref().map(str::trim) {
            None | Some("") | Some("false") | Some("0") => BidFilter::Bidder(email),
            Some(_) => BidFilter::Buyer(email),
        }
    }
}

async fn add_bid(
    State(state): State<AppState>,
    JsonBody(bid): JsonBody<NewBid>,
) -> AppResult<(StatusCode, Json<InsertResult>)> {
    let bid = bid.into_document()?;
    let result = state.store.place_bid(bid).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn bids_for_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
    Query(params): Query<BidListParams>,
) -> AppResult<Json<Vec<Bid>>> {
    user.require_email(&email)?;
    let filter = params.filter_for(email);
    Ok(Json(state.store.find_bids(&filter).await?))
}

async fn update_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> AppResult<Json<UpdateResult>> {
    let id = parse_id(&id)?;
    let result = state.store.update_bid_status(id, &update.status).await?;
    info!(bid_id = %id, by = %user.email, status = %update.status, matched = result.matched_count, "Bid status update");
    Ok(Json(result))
}
