use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnection, Postgres};
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use super::{health_check, BidStore, JobQuery, JobStore, Store};
use crate::models::{
    Bid, BidDocument, BidFilter, DeleteResult, InsertResult, Job, JobDocument, UpdateResult,
};
use crate::types::{AppError, AppResult};
use crate::utils::with_deadline;

// Note: runtime `query_as` with `FromRow` so the crate builds without a
// database at compile time.

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    doc: Json<JobDocument>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            doc: row.doc.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BidRow {
    id: Uuid,
    job_id: Uuid,
    email: String,
    buyer: String,
    status: String,
    extra: Json<Map<String, Value>>,
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid {
            id: row.id,
            doc: BidDocument {
                job_id: row.job_id,
                email: row.email,
                buyer: row.buyer,
                status: row.status,
                extra: row.extra.0,
            },
        }
    }
}

const BID_COLUMNS: &str = "id, job_id, email, buyer, status, extra";

/// A concurrent insert that lost the race on `bids_email_job_id_key` is a
/// duplicate bid, not a server fault.
fn conflict_on_unique(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::duplicate_bid(),
        _ => AppError::Database(e),
    }
}

/// PostgreSQL-backed store. Every call runs under the configured deadline.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn push_job_query<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a JobQuery) {
        builder.push("SELECT id, doc FROM jobs WHERE TRUE");

        if let Some(email) = &query.buyer_email {
            builder.push(" AND doc -> 'buyer' ->> 'email' = ").push_bind(email);
        }
        if let Some(category) = &query.category {
            builder.push(" AND doc ->> 'category' = ").push_bind(category);
        }
        if let Some(search) = &query.search {
            // strpos instead of LIKE so % and _ in the search text stay literal
            builder
                .push(" AND strpos(lower(doc ->> 'title'), lower(")
                .push_bind(search)
                .push(")) > 0");
        }

        match query.sort {
            Some(order) => {
                builder
                    .push(" ORDER BY (doc ->> 'deadline') COLLATE \"C\" ")
                    .push(order.as_sql())
                    .push(", created_at ASC");
            }
            None => {
                builder.push(" ORDER BY created_at ASC");
            }
        }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, doc: JobDocument) -> AppResult<InsertResult> {
        let id: Uuid = with_deadline(
            self.timeout,
            sqlx::query_scalar("INSERT INTO jobs (doc) VALUES ($1) RETURNING id")
                .bind(Json(&doc))
                .fetch_one(&self.pool),
        )
        .await?;

        info!(job_id = %id, buyer = %doc.buyer.email, "Job created");
        Ok(InsertResult::new(id))
    }

    async fn find_jobs(&self, query: &JobQuery) -> AppResult<Vec<Job>> {
        let mut builder = QueryBuilder::new("");
        Self::push_job_query(&mut builder, query);

        let rows: Vec<JobRow> = with_deadline(
            self.timeout,
            builder.build_query_as::<JobRow>().fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn find_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        let row: Option<JobRow> = with_deadline(
            self.timeout,
            sqlx::query_as::<_, JobRow>("SELECT id, doc FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(Job::from))
    }

    async fn delete_job(&self, id: Uuid) -> AppResult<DeleteResult> {
        let result = with_deadline(
            self.timeout,
            sqlx::query("DELETE FROM jobs WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn upsert_job(&self, id: Uuid, patch: Map<String, Value>) -> AppResult<UpdateResult> {
        let pool = &self.pool;
        let operation = async move {
            let mut tx = pool.begin().await?;

            let result = match lock_job(&mut *tx, id).await? {
                Some(previous) => update_job_doc(&mut *tx, id, previous, patch).await?,
                None => {
                    let created = JobDocument::merged(None, patch.clone())?;
                    // Waits on a concurrent insert of the same id, then skips.
                    let inserted: Option<Uuid> = sqlx::query_scalar(
                        "INSERT INTO jobs (id, doc) VALUES ($1, $2) \
                         ON CONFLICT (id) DO NOTHING RETURNING id",
                    )
                    .bind(id)
                    .bind(Json(&created))
                    .fetch_optional(&mut *tx)
                    .await?;

                    match inserted {
                        Some(_) => UpdateResult::upserted(id),
                        None => {
                            let previous = lock_job(&mut *tx, id).await?.ok_or_else(|| {
                                AppError::Internal(format!("job {} vanished during upsert", id))
                            })?;
                            update_job_doc(&mut *tx, id, previous, patch).await?
                        }
                    }
                }
            };

            tx.commit().await?;
            Ok::<_, AppError>(result)
        };

        with_deadline(self.timeout, operation).await
    }
}

async fn lock_job(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<JobDocument>> {
    let doc: Option<Json<JobDocument>> =
        sqlx::query_scalar("SELECT doc FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(doc.map(|doc| doc.0))
}

/// Merge `patch` into a locked job, writing only when something changed.
async fn update_job_doc(
    conn: &mut PgConnection,
    id: Uuid,
    previous: JobDocument,
    patch: Map<String, Value>,
) -> AppResult<UpdateResult> {
    let merged = JobDocument::merged(Some(&previous), patch)?;
    let modified = previous != merged;
    if modified {
        sqlx::query("UPDATE jobs SET doc = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(&merged))
            .execute(conn)
            .await?;
    }
    Ok(UpdateResult::matched(modified))
}

#[async_trait]
impl BidStore for PgStore {
    async fn find_bid(&self, email: &str, job_id: Uuid) -> AppResult<Option<Bid>> {
        let sql = format!("SELECT {BID_COLUMNS} FROM bids WHERE email = $1 AND job_id = $2");
        let row: Option<BidRow> = with_deadline(
            self.timeout,
            sqlx::query_as::<_, BidRow>(&sql)
                .bind(email)
                .bind(job_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(Bid::from))
    }

    async fn place_bid(&self, bid: BidDocument) -> AppResult<InsertResult> {
        let pool = &self.pool;
        let operation = async move {
            let mut tx = pool.begin().await?;

            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM bids WHERE email = $1 AND job_id = $2")
                    .bind(&bid.email)
                    .bind(bid.job_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if existing.is_some() {
                return Err(AppError::duplicate_bid());
            }

            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO bids (job_id, email, buyer, status, extra) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(bid.job_id)
            .bind(&bid.email)
            .bind(&bid.buyer)
            .bind(&bid.status)
            .bind(Json(&bid.extra))
            .fetch_one(&mut *tx)
            .await
            .map_err(conflict_on_unique)?;

            let bumped = sqlx::query(
                "UPDATE jobs \
                 SET doc = jsonb_set(doc, '{bidCount}', to_jsonb(COALESCE((doc ->> 'bidCount')::bigint, 0) + 1)), \
                     updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(bid.job_id)
            .execute(&mut *tx)
            .await?;

            if bumped.rows_affected() == 0 {
                warn!(job_id = %bid.job_id, "Bid placed on a job that does not exist");
            }

            tx.commit().await?;
            info!(bid_id = %id, job_id = %bid.job_id, bidder = %bid.email, "Bid placed");
            Ok::<_, AppError>(InsertResult::new(id))
        };

        with_deadline(self.timeout, operation).await
    }

    async fn find_bids(&self, filter: &BidFilter) -> AppResult<Vec<Bid>> {
        let (column, email) = match filter {
            BidFilter::Buyer(email) => ("buyer", email),
            BidFilter::Bidder(email) => ("email", email),
        };
        let sql = format!("SELECT {BID_COLUMNS} FROM bids WHERE {column} = $1 ORDER BY created_at ASC");

        let rows: Vec<BidRow> = with_deadline(
            self.timeout,
            sqlx::query_as::<_, BidRow>(&sql).bind(email).fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().map(Bid::from).collect())
    }

    async fn update_bid_status(&self, id: Uuid, status: &str) -> AppResult<UpdateResult> {
        let previous: Option<String> = with_deadline(
            self.timeout,
            sqlx::query_scalar(
                "WITH old AS (SELECT id, status FROM bids WHERE id = $1) \
                 UPDATE bids SET status = $2, updated_at = NOW() \
                 FROM old WHERE bids.id = old.id \
                 RETURNING old.status",
            )
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(match previous {
            Some(old) => UpdateResult::matched(old != status),
            None => UpdateResult::unmatched(),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AppResult<()> {
        with_deadline(self.timeout, health_check(&self.pool)).await?;
        Ok(())
    }
}
