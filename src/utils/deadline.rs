// Deadline for calls into the document store

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::types::{AppError, AppResult};

/// Run a store call, failing with `AppError::Timeout` once `limit` elapses.
pub async fn with_deadline<T, E, F>(limit: Duration, operation: F) -> AppResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match timeout(limit, operation).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            warn!("Store call exceeded {:?}", limit);
            Err(AppError::Timeout(limit))
        }
    }
}
