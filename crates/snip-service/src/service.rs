use crate::error::ServiceError;
use snip_core::{NewUrl, Owner, ShortCode, Store, StoreError, StoreStats, UrlRecord};
use snip_poller::{DeletionPoller, PollerConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub original_url: String,
}

/// Outcome of one batch entry, in request order.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub correlation_id: String,
    pub result: Result<String, ServiceError>,
}

/// A live URL as listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Shortener entry point shared by request handlers.
///
/// Owns the store and a [`DeletionPoller`] draining into it. Deletions are
/// acknowledged as soon as they are queued and applied later.
#[derive(Debug)]
pub struct ShortenerService<S> {
    store: Arc<S>,
    poller: DeletionPoller,
    base_url: String,
}

impl<S: Store> ShortenerService<S> {
    /// Creates a service with the default poller settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: S, base_url: impl Into<String>) -> Self {
        Self::with_poller_config(store, base_url, PollerConfig::default())
    }

    pub fn with_poller_config(
        store: S,
        base_url: impl Into<String>,
        config: PollerConfig,
    ) -> Self {
        let store = Arc::new(store);
        let poller = DeletionPoller::spawn(Arc::clone(&store), config);
        Self {
            store,
            poller,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Renders the public short URL for `code`.
    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    /// Shortens `original_url` on behalf of `owner`, or the anonymous owner.
    pub async fn shorten(
        &self,
        original_url: &str,
        owner: Option<Owner>,
    ) -> Result<UrlRecord, ServiceError> {
        let url = NewUrl::new(original_url, Owner::or_anonymous(owner))?;
        let record = self
            .store
            .create(url)
            .await
            .map_err(|e| self.map_store_error(e))?;

        info!(code = %record.id, owner = %record.owner, "shortened url");
        Ok(record)
    }

    /// Shortens a batch of URLs. Each entry succeeds or fails on its own.
    ///
    /// Only a store-wide failure (e.g. a rolled back transaction) fails the
    /// whole call.
    pub async fn shorten_many(
        &self,
        requests: Vec<BatchRequest>,
        owner: Option<Owner>,
    ) -> Result<Vec<BatchResponse>, ServiceError> {
        let owner = Owner::or_anonymous(owner);

        let mut responses: Vec<Option<BatchResponse>> = Vec::with_capacity(requests.len());
        let mut valid = Vec::new();
        for request in requests {
            match NewUrl::new(request.original_url, owner.clone()) {
                Ok(url) => {
                    valid.push(url.with_correlation_id(request.correlation_id));
                    responses.push(None);
                }
                Err(err) => responses.push(Some(BatchResponse {
                    correlation_id: request.correlation_id,
                    result: Err(err.into()),
                })),
            }
        }

        let outcomes = self
            .store
            .bulk_create(valid)
            .await
            .map_err(|e| self.map_store_error(e))?;

        let mut outcomes = outcomes.into_iter();
        let responses = responses
            .into_iter()
            .map(|slot| match slot {
                Some(invalid) => Some(invalid),
                None => outcomes.next().map(|outcome| BatchResponse {
                    correlation_id: outcome.correlation_id.unwrap_or_default(),
                    result: outcome
                        .result
                        .map(|record| self.short_url(&record.id))
                        .map_err(|e| self.map_store_error(e)),
                }),
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ServiceError::Store(StoreError::InvalidData(
                    "batch outcome count does not match request".to_string(),
                ))
            })?;

        debug!(owner = %owner, count = responses.len(), "shortened batch");
        Ok(responses)
    }

    /// Looks up the original URL behind `code`.
    pub async fn resolve(&self, code: &ShortCode) -> Result<String, ServiceError> {
        self.store
            .get_by_id(code)
            .await
            .map(|record| record.original_url)
            .map_err(|e| self.map_store_error(e))
    }

    pub async fn list_for_owner(&self, owner: &Owner) -> Result<Vec<OwnedUrl>, ServiceError> {
        let records = self
            .store
            .list_by_owner(owner)
            .await
            .map_err(|e| self.map_store_error(e))?;

        Ok(records
            .into_iter()
            .map(|record| OwnedUrl {
                short_url: self.short_url(&record.id),
                original_url: record.original_url,
            })
            .collect())
    }

    /// Queues a soft delete of `ids` owned by `owner`.
    ///
    /// Returns once the request is queued. Codes not owned by `owner` are
    /// silently skipped when the request is applied.
    pub async fn delete_many(&self, ids: Vec<ShortCode>, owner: Owner) -> Result<(), ServiceError> {
        self.poller.submit(ids, owner).await?;
        Ok(())
    }

    /// Soft deletes `ids` right away, bypassing the poller queue.
    pub async fn delete_many_now(
        &self,
        ids: &[ShortCode],
        owner: &Owner,
    ) -> Result<(), ServiceError> {
        self.store
            .bulk_soft_delete(ids, owner)
            .await
            .map_err(|e| self.map_store_error(e))
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.store.ping().await.map_err(ServiceError::Store)
    }

    pub async fn stats(&self) -> Result<StoreStats, ServiceError> {
        self.store.stats().await.map_err(ServiceError::Store)
    }

    /// Stops the poller, then closes the store.
    ///
    /// The store is closed even when stopping the poller fails.
    pub async fn close(&self) -> Result<(), ServiceError> {
        let poller = self.poller.close().await;
        if let Err(err) = &poller {
            warn!(error = %err, "failed to stop deletion poller");
        }

        self.store.close().await.map_err(ServiceError::Store)?;
        info!("shortener service closed");
        poller.map_err(ServiceError::from)
    }

    fn map_store_error(&self, err: StoreError) -> ServiceError {
        match err {
            StoreError::AlreadyExists(existing) => ServiceError::AlreadyShortened {
                short_url: self.short_url(&existing.id),
                code: existing.id.to_string(),
            },
            StoreError::NotFound(code) => ServiceError::NotFound(code),
            StoreError::IsDeleted(code) => ServiceError::Gone(code),
            StoreError::Validation(err) => ServiceError::InvalidUrl(err),
            other => ServiceError::Store(other),
        }
    }
}
