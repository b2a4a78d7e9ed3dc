//! In-process document store.
//!
//! Both collections sit behind one lock, so bid placement (check, insert,
//! counter increment) is atomic here just as it is inside a Postgres
//! transaction. Data does not survive a restart.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::{BidStore, JobQuery, JobStore, Store};
use crate::models::{
    Bid, BidDocument, BidFilter, DeleteResult, InsertResult, Job, JobDocument, UpdateResult,
};
use crate::types::{AppError, AppResult};

#[derive(Default)]
struct Collections {
    jobs: Vec<Job>,
    bids: Vec<Bid>,
}

/// Number of store calls served, split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub reads: u64,
    pub writes: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op_counts(&self) -> OpCounts {
        OpCounts {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, doc: JobDocument) -> AppResult<InsertResult> {
        self.record_write();
        let id = Uuid::new_v4();
        info!(job_id = %id, buyer = %doc.buyer.email, "Job created");

        self.data.write().await.jobs.push(Job { id, doc });
        Ok(InsertResult::new(id))
    }

    async fn find_jobs(&self, query: &JobQuery) -> AppResult<Vec<Job>> {
        self.record_read();
        Ok(query.apply(&self.data.read().await.jobs))
    }

    async fn find_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        self.record_read();
        let data = self.data.read().await;
        Ok(data.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn delete_job(&self, id: Uuid) -> AppResult<DeleteResult> {
        self.record_write();
        let mut data = self.data.write().await;
        let before = data.jobs.len();
        data.jobs.retain(|j| j.id != id);
        Ok(DeleteResult::new((before - data.jobs.len()) as u64))
    }

    async fn upsert_job(&self, id: Uuid, patch: Map<String, Value>) -> AppResult<UpdateResult> {
        self.record_write();
        let mut data = self.data.write().await;

        match data.jobs.iter_mut().find(|j| j.id == id) {
            Some(job) => {
                let merged = JobDocument::merged(Some(&job.doc), patch)?;
                let modified = merged != job.doc;
                job.doc = merged;
                Ok(UpdateResult::matched(modified))
            }
            None => {
                let doc = JobDocument::merged(None, patch)?;
                data.jobs.push(Job { id, doc });
                Ok(UpdateResult::upserted(id))
            }
        }
    }
}

#[async_trait]
impl BidStore for MemoryStore {
    async fn find_bid(&self, email: &str, job_id: Uuid) -> AppResult<Option<Bid>> {
        self.record_read();
        let data = self.data.read().await;
        Ok(data
            .bids
            .iter()
            .find(|b| b.doc.email == email && b.doc.job_id == job_id)
            .cloned())
    }

    async fn place_bid(&self, bid: BidDocument) -> AppResult<InsertResult> {
        self.record_write();
        let mut data = self.data.write().await;

        if data
            .bids
            .iter()
            .any(|b| b.doc.email == bid.email && b.doc.job_id == bid.job_id)
        {
            return Err(AppError::duplicate_bid());
        }

        let id = Uuid::new_v4();
        let job_id = bid.job_id;
        info!(bid_id = %id, job_id = %job_id, bidder = %bid.email, "Bid placed");
        data.bids.push(Bid { id, doc: bid });

        match data.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) => job.doc.bid_count += 1,
            None => warn!(job_id = %job_id, "Bid placed on a job that does not exist"),
        }

        Ok(InsertResult::new(id))
    }

    async fn find_bids(&self, filter: &BidFilter) -> AppResult<Vec<Bid>> {
        self.record_read();
        let data = self.data.read().await;
        Ok(data
            .bids
            .iter()
            .filter(|b| match filter {
                BidFilter::Buyer(email) => &b.doc.buyer == email,
                BidFilter::Bidder(email) => &b.doc.email == email,
            })
            .cloned()
            .collect())
    }

    async fn update_bid_status(&self, id: Uuid, status: &str) -> AppResult<UpdateResult> {
        self.record_write();
        let mut data = self.data.write().await;

        Ok(match data.bids.iter_mut().find(|b| b.id == id) {
            Some(bid) => {
                let modified = bid.doc.status != status;
                bid.doc.status = status.to_string();
                UpdateResult::matched(modified)
            }
            None => UpdateResult::unmatched(),
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{bid_doc, job_doc};
    use serde_json::json;
    use std::sync::Arc;

    async fn store_with_job() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let id = store
            .insert_job(job_doc("a@x.com", "Logo", "design", "2024-01-01"))
            .await
            .unwrap()
            .inserted_id;
        (store, id)
    }

    #[tokio::test]
    async fn test_insert_then_find_returns_same_fields() {
        let (store, id) = store_with_job().await;
        let job = store.find_job(id).await.unwrap().unwrap();
        assert_eq!(job.doc, job_doc("a@x.com", "Logo", "design", "2024-01-01"));
    }

    #[tokio::test]
    async fn test_place_bid_increments_count_once() {
        let (store, job_id) = store_with_job().await;

        store.place_bid(bid_doc("b@x.com", job_id, "a@x.com")).await.unwrap();
        let err = store
            .place_bid(bid_doc("b@x.com", job_id, "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let bids = store.find_bids(&BidFilter::Bidder("b@x.com".into())).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(store.find_job(job_id).await.unwrap().unwrap().doc.bid_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_bids_admit_one() {
        let (store, job_id) = store_with_job().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.place_bid(bid_doc("b@x.com", job_id, "a@x.com")).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.find_job(job_id).await.unwrap().unwrap().doc.bid_count, 1);
    }

    #[tokio::test]
    async fn test_bid_on_missing_job_is_still_recorded() {
        let store = MemoryStore::new();
        let ghost = Uuid::new_v4();
        store.place_bid(bid_doc("b@x.com", ghost, "a@x.com")).await.unwrap();
        assert!(store.find_bid("b@x.com", ghost).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_merges_or_creates() {
        let (store, id) = store_with_job().await;

        let patch = json!({ "title": "Logo v2" }).as_object().unwrap().clone();
        let result = store.upsert_job(id, patch.clone()).await.unwrap();
        assert_eq!(result, UpdateResult::matched(true));
        assert_eq!(store.upsert_job(id, patch).await.unwrap(), UpdateResult::matched(false));

        let job = store.find_job(id).await.unwrap().unwrap();
        assert_eq!(job.doc.title, "Logo v2");
        assert_eq!(job.doc.category, "design");

        let fresh = Uuid::new_v4();
        let full = json!({
            "buyer": { "email": "c@x.com" },
            "title": "Copywriting",
            "category": "writing",
            "deadline": "2024-05-05",
        });
        let created = store
            .upsert_job(fresh, full.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(created, UpdateResult::upserted(fresh));
        assert!(store.find_job(fresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bid_listing_by_role_and_status_update() {
        let (store, job_id) = store_with_job().await;
        let placed = store
            .place_bid(bid_doc("b@x.com", job_id, "a@x.com"))
            .await
            .unwrap();

        let incoming = store.find_bids(&BidFilter::Buyer("a@x.com".into())).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert!(store.find_bids(&BidFilter::Bidder("a@x.com".into())).await.unwrap().is_empty());

        let update = store
            .update_bid_status(placed.inserted_id, "in progress")
            .await
            .unwrap();
        assert_eq!(update, UpdateResult::matched(true));
        let bid = store.find_bid("b@x.com", job_id).await.unwrap().unwrap();
        assert_eq!(bid.doc.status, "in progress");

        let missing = store.update_bid_status(Uuid::new_v4(), "done").await.unwrap();
        assert_eq!(missing, UpdateResult::unmatched());
    }

    #[tokio::test]
    async fn test_delete_counts_and_op_counters() {
        let (store, id) = store_with_job().await;
        assert_eq!(store.delete_job(id).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete_job(id).await.unwrap().deleted_count, 0);
        assert_eq!(store.op_counts(), OpCounts { reads: 0, writes: 3 });
    }
}
