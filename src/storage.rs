//! # Object Storage
//!
//! The storage boundary used by the dashboard and the signed-URL route. Only
//! four operations are needed: list by prefix, put, delete and get.
//! [`R2Store`] implements them over the R2 bucket binding.

use async_trait::async_trait;
use chrono::DateTime;
use worker::{Bucket, HttpMetadata};

use crate::constants::LIST_PAGE_LIMIT;
use crate::errors::{AppError, AppResult};
use crate::models::{ListPage, ObjectBody, StoredObject};

#[async_trait(?Send)]
pub trait ObjectStore {
    /// Lists one page of objects under `prefix`, starting at `cursor`.
    async fn list_page(&self, prefix: &str, cursor: Option<&str>) -> AppResult<ListPage>;

    /// Writes `bytes` to `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn get(&self, key: &str) -> AppResult<Option<ObjectBody>>;
}

pub struct R2Store {
    bucket: Bucket,
}

impl R2Store {
    pub fn new(bucket: Bucket) -> Self {
        Self { bucket }
    }
}

fn backend(operation: &str, error: worker::Error) -> AppError {
    AppError::Backend(format!("R2 {} failed: {}", operation, error))
}

#[async_trait(?Send)]
impl ObjectStore for R2Store {
    async fn list_page(&self, prefix: &str, cursor: Option<&str>) -> AppResult<ListPage> {
        let mut request = self.bucket.list().prefix(prefix).limit(LIST_PAGE_LIMIT);
        if let Some(cursor) = cursor {
            request = request.cursor(cursor);
        }
        let listing = request.execute().await.map_err(|e| backend("list", e))?;

        let objects = listing
            .objects()
            .into_iter()
            .map(|object| StoredObject {
                key: object.key(),
                last_modified: DateTime::from_timestamp_millis(object.uploaded().as_millis() as i64),
                size: u64::from(object.size()),
            })
            .collect();
        let cursor = if listing.truncated() {
            listing.cursor()
        } else {
            None
        };

        Ok(ListPage { objects, cursor })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<()> {
        self.bucket
            .put(key, bytes)
            .http_metadata(HttpMetadata {
                content_type: Some(content_type.to_string()),
                ..Default::default()
            })
            .execute()
            .await
            .map_err(|e| backend("put", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.bucket
            .delete(key)
            .await
            .map_err(|e| backend("delete", e))
    }

    async fn get(&self, key: &str) -> AppResult<Option<ObjectBody>> {
        let Some(object) = self
            .bucket
            .get(key)
            .execute()
            .await
            .map_err(|e| backend("get", e))?
        else {
            return Ok(None);
        };

        let content_type = object
            .http_metadata()
            .content_type
            .filter(|value| !value.is_empty());
        let bytes = match object.body() {
            Some(body) => body.bytes().await.map_err(|e| backend("read", e))?,
            None => Vec::new(),
        };

        Ok(Some(ObjectBody {
            bytes,
            content_type,
        }))
    }
}
