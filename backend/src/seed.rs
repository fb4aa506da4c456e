use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::ListingRecord;
use crate::platform::ListingStore;

/// Loads a JSON array of listing records into the store. Records whose id
/// already exists are left untouched.
pub async fn load_listings(path: impl AsRef<Path>, store: &dyn ListingStore) -> Result<usize> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    let records: Vec<ListingRecord> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("Invalid seed file {}: {}", path.display(), e)))?;

    let count = records.len();
    for record in records {
        store.insert(record).await?;
    }
    log::info!("Seeded {} listings from {}", count, path.display());
    Ok(count)
}
