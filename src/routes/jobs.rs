//! Job endpoints.
//!
//! Creating, browsing and searching jobs is public. Reading, changing and
//! deleting a single job, and the per-buyer listing, require an identity
//! cookie.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::db::JobQuery;
use crate::middleware::AuthUser;
use crate::models::{AppState, DeleteResult, InsertResult, Job, JobDocument, UpdateResult};
use crate::types::{non_empty, parse_id, AppError, AppResult, JsonBody, SortOrder};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add-job", post(add_job))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{email}", get(jobs_by_buyer))
        .route("/job/{id}", get(get_job).delete(delete_job))
        .route("/update-job/{id}", put(update_job))
        .route("/all-jobs", get(search_jobs))
}

/// Query string of `GET /all-jobs`. Blank values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct JobSearchParams {
    /// Category to restrict to.
    pub filter: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl From<JobSearchParams> for JobQuery {
    fn from(params: JobSearchParams) -> Self {
        JobQuery {
            buyer_email: None,
            category: non_empty(params.filter),
            search: non_empty(params.search),
            sort: SortOrder::from_param(params.sort.as_deref()),
        }
    }
}

async fn add_job(
    State(state): State<AppState>,
    JsonBody(doc): JsonBody<JobDocument>,
) -> AppResult<(StatusCode, Json<InsertResult>)> {
    let doc = doc.for_insert()?;
    let result = state.store.insert_job(doc).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn list_jobs(State(state): State<AppState>) -> AppResult<Json<Vec<Job>>> {
    Ok(Json(state.store.find_jobs(&JobQuery::all()).await?))
}

async fn jobs_by_buyer(
    user: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<Job>>> {
    user.require_email(&email)?;
    Ok(Json(state.store.find_jobs(&JobQuery::by_buyer(email)).await?))
}

async fn get_job(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Job>> {
    let id = parse_id(&id)?;
    state
        .store
        .find_job(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("job not found"))
}

async fn delete_job(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResult>> {
    let id = parse_id(&id)?;
    let result = state.store.delete_job(id).await?;
    info!(job_id = %id, by = %user.email, deleted = result.deleted_count, "Job delete");
    Ok(Json(result))
}

async fn update_job(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Map<String, Value>>,
) -> AppResult<Json<UpdateResult>> {
    let id = parse_id(&id)?;
    let result = state.store.upsert_job(id, patch).await?;
    info!(
        job_id = %id,
        by = %user.email,
        matched = result.matched_count,
        upserted = result.upserted_count,
        "Job update"
    );
    Ok(Json(result))
}

async fn search_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobSearchParams>,
) -> AppResult<Json<Vec<Job>>> {
    let query = JobQuery::from(params);
    Ok(Json(state.store.find_jobs(&query).await?))
}
