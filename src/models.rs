use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db::Store;
use crate::middleware::TokenKeys;
use crate::types::{parse_id, AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub keys: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let keys = Arc::new(TokenKeys::from_config(&config.auth));
        Self { store, config, keys }
    }
}

// Job documents
//
// Known fields are typed; anything else the client sends rides along in
// `extra` and is stored and returned untouched.

const JOB_ID_FIELD: &str = "_id";
const BID_COUNT_FIELD: &str = "bidCount";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Buyer {
    #[validate(email(message = "buyer.email must be a valid email address"))]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct JobDocument {
    #[validate(nested)]
    pub buyer: Buyer,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,
    /// `YYYY-MM-DD` or a UTC timestamp in millisecond precision once stored.
    pub deadline: String,
    #[serde(rename = "bidCount", default)]
    pub bid_count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobDocument {
    /// Validate a caller-supplied job and reset its bid counter.
    pub fn for_insert(mut self) -> AppResult<Self> {
        self.normalize()?;
        self.extra.remove(JOB_ID_FIELD);
        self.bid_count = 0;
        Ok(self)
    }

    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        canonical_deadline(&self.deadline)?;
        Ok(())
    }

    /// Validate and rewrite `deadline` into its stored form.
    fn normalize(&mut self) -> AppResult<()> {
        self.validate()?;
        self.deadline = canonical_deadline(&self.deadline)?;
        Ok(())
    }

    pub fn to_fields(&self) -> AppResult<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppError::Internal("job did not serialize to an object".into())),
            Err(e) => Err(AppError::Internal(e.to_string())),
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> AppResult<Self> {
        let mut doc: JobDocument = serde_json::from_value(Value::Object(fields))?;
        doc.normalize()?;
        Ok(doc)
    }

    /// Apply a partial update with `$set` semantics.
    ///
    /// Top-level keys in `patch` overwrite the existing document. `_id` and
    /// `bidCount` are never taken from the patch. With no existing document
    /// the patch alone has to form a complete job (upsert).
    pub fn merged(existing: Option<&JobDocument>, mut patch: Map<String, Value>) -> AppResult<Self> {
        patch.remove(JOB_ID_FIELD);
        patch.remove(BID_COUNT_FIELD);

        let mut fields = match existing {
            Some(doc) => doc.to_fields()?,
            None => Map::new(),
        };
        fields.extend(patch);
        fields.insert(
            BID_COUNT_FIELD.to_string(),
            Value::from(existing.map(|d| d.bid_count).unwrap_or(0)),
        );

        Self::from_fields(fields)
    }
}

const DEADLINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Dates stay `YYYY-MM-DD`; timestamps become UTC with millisecond precision.
/// Both stores order by the stored string, which is then chronological.
fn canonical_deadline(raw: &str) -> AppResult<String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).format(DEADLINE_TIMESTAMP_FORMAT).to_string())
        .map_err(|_| {
            AppError::bad_request(format!(
                "deadline '{}' is not an ISO-8601 date or timestamp",
                raw
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub doc: JobDocument,
}

// Bids

fn default_status() -> String {
    "pending".to_string()
}

/// Body of `POST /add-bid`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBid {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[validate(email(message = "buyer must be the job owner's email address"))]
    pub buyer: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewBid {
    pub fn into_document(mut self) -> AppResult<BidDocument> {
        self.validate()?;
        let job_id = parse_id(&self.job_id)?;
        self.extra.remove("_id");
        Ok(BidDocument {
            job_id,
            email: self.email,
            buyer: self.buyer,
            status: self.status,
            extra: self.extra,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidDocument {
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
    /// Bidder.
    pub email: String,
    /// Owner of the job, copied from the job for listing.
    pub buyer: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub doc: BidDocument,
}

/// Body of `PATCH /bid-status-update/:id`. Any status string is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Whose bids a listing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidFilter {
    /// Incoming bids on jobs owned by this email.
    Buyer(String),
    /// Bids placed by this email.
    Bidder(String),
}

// Auth

/// Body of `POST /jwt`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentityRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
}

// Store acknowledgements

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertResult {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Uuid>,
}

impl UpdateResult {
    pub fn matched(modified: bool) -> Self {
        Self {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn upserted(id: Uuid) -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn job_doc(email: &str, title: &str, category: &str, deadline: &str) -> JobDocument {
        serde_json::from_value(json!({
            "buyer": { "email": email, "name": "Buyer" },
            "title": title,
            "category": category,
            "deadline": deadline,
            "bidCount": 0,
            "min_price": 100,
        }))
        .unwrap()
    }

    pub fn bid_doc(email: &str, job_id: Uuid, buyer: &str) -> BidDocument {
        BidDocument {
            job_id,
            email: email.to_string(),
            buyer: buyer.to_string(),
            status: default_status(),
            extra: Map::new(),
        }
    }
}
