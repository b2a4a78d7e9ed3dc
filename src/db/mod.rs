//! Document storage for jobs and bids.
//!
//! Handlers only see the [`Store`] trait object held in `AppState`. Two
//! implementations exist:
//! - [`PgStore`] - PostgreSQL, jobs as JSONB documents, bids as rows with a
//!   unique `(email, job_id)` index
//! - [`MemoryStore`] - process-local collections for development and tests

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{
    Bid, BidDocument, BidFilter, DeleteResult, InsertResult, Job, JobDocument, UpdateResult,
};
use crate::types::AppResult;

pub use memory::*;
pub use operations::*;
pub use pool::*;
pub use query::*;

pub mod memory;
pub mod operations;
pub mod pool;
pub mod query;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert an already validated job; the store assigns the id.
    async fn insert_job(&self, doc: JobDocument) -> AppResult<InsertResult>;

    async fn find_jobs(&self, query: &JobQuery) -> AppResult<Vec<Job>>;

    async fn find_job(&self, id: Uuid) -> AppResult<Option<Job>>;

    async fn delete_job(&self, id: Uuid) -> AppResult<DeleteResult>;

    /// Merge `patch` into the job, creating it when absent.
    async fn upsert_job(&self, id: Uuid, patch: Map<String, Value>) -> AppResult<UpdateResult>;
}

#[async_trait]
pub trait BidStore: Send + Sync {
    async fn find_bid(&self, email: &str, job_id: Uuid) -> AppResult<Option<Bid>>;

    /// Reject a second bid for the same `(email, job_id)`, otherwise insert
    /// the bid and increment the job's `bidCount`.
    async fn place_bid(&self, bid: BidDocument) -> AppResult<InsertResult>;

    async fn find_bids(&self, filter: &BidFilter) -> AppResult<Vec<Bid>>;

    async fn update_bid_status(&self, id: Uuid, status: &str) -> AppResult<UpdateResult>;
}

#[async_trait]
pub trait Store: JobStore + BidStore {
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> AppResult<()>;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config
        .url
        .as_deref()
        .context("DATABASE_URL must be set for the postgres backend")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.query_timeout())
        .connect(url)
        .await?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}
