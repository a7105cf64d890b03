use crate::error::{Result, StoreError};
use crate::record::{NewUrl, Owner, UrlRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Per-item result of [`Store::bulk_create`].
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The correlation token of the request item, if it had one.
    pub correlation_id: Option<String>,
    /// The created record, or the error `create` would have returned for
    /// this item. Duplicates surface as [`StoreError::AlreadyExists`].
    pub result: Result<UrlRecord>,
}

impl BatchOutcome {
    /// The short code the item resolves to, whether freshly created or
    /// already stored.
    pub fn short_code(&self) -> Option<&ShortCode> {
        match &self.result {
            Ok(record) => Some(&record.id),
            Err(StoreError::AlreadyExists(existing)) => Some(&existing.id),
            Err(_) => None,
        }
    }
}

/// Aggregate counters over live records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub urls: usize,
    pub users: usize,
}

/// The capability contract every storage backend satisfies.
///
/// Stores generate short codes themselves; a create either yields a fresh
/// record or fails with [`StoreError::AlreadyExists`] carrying the live
/// record already stored for the same original URL.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Persists a new record under a freshly generated short code.
    async fn create(&self, url: NewUrl) -> Result<UrlRecord>;

    /// Fails with `NotFound` if absent and `IsDeleted` if soft-deleted.
    async fn get_by_id(&self, id: &ShortCode) -> Result<UrlRecord>;

    /// Returns every live record of the owner; empty when there are none.
    async fn list_by_owner(&self, owner: &Owner) -> Result<Vec<UrlRecord>>;

    /// Creates many records, reporting one outcome per input in input order.
    async fn bulk_create(&self, urls: Vec<NewUrl>) -> Result<Vec<BatchOutcome>>;

    /// Marks the owner's records with the given ids deleted.
    ///
    /// Unknown ids and ids owned by someone else are ignored.
    async fn bulk_soft_delete(&self, ids: &[ShortCode], owner: &Owner) -> Result<()>;

    /// Counts live urls and the distinct owners holding them.
    async fn stats(&self) -> Result<StoreStats>;

    async fn ping(&self) -> Result<()>;

    /// Releases resources. Fails with `AlreadyClosed` when called twice.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn create(&self, url: NewUrl) -> Result<UrlRecord> {
        (**self).create(url).await
    }

    async fn get_by_id(&self, id: &ShortCode) -> Result<UrlRecord> {
        (**self).get_by_id(id).await
    }

    async fn list_by_owner(&self, owner: &Owner) -> Result<Vec<UrlRecord>> {
        (**self).list_by_owner(owner).await
    }

    async fn bulk_create(&self, urls: Vec<NewUrl>) -> Result<Vec<BatchOutcome>> {
        (**self).bulk_create(urls).await
    }

    async fn bulk_soft_delete(&self, ids: &[ShortCode], owner: &Owner) -> Result<()> {
        (**self).bulk_soft_delete(ids, owner).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        (**self).stats().await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
