use crate::codes::{next_free_code, DEFAULT_MAX_CODE_ATTEMPTS};
use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::{
    BatchOutcome, NewUrl, Owner, Result, ShortCode, Store, StoreError, StoreStats, UrlRecord,
};
use snip_generator::{Generator, RandomHexGenerator};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct State {
    urls: HashMap<ShortCode, UrlRecord>,
    /// Original URL -> code of its live record.
    live_by_url: HashMap<String, ShortCode>,
    closed: bool,
}

impl State {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }

    fn insert<G: Generator>(
        &mut self,
        generator: &G,
        max_attempts: usize,
        url: NewUrl,
    ) -> Result<UrlRecord> {
        if let Some(existing) = self
            .live_by_url
            .get(url.original_url())
            .and_then(|code| self.urls.get(code))
        {
            return Err(StoreError::AlreadyExists(Box::new(existing.clone())));
        }

        let code = next_free_code(generator, max_attempts, |candidate| {
            self.urls.contains_key(candidate)
        })?;
        let record = url.into_record(code.clone());
        self.live_by_url
            .insert(record.original_url.clone(), code.clone());
        self.urls.insert(code, record.clone());
        Ok(record)
    }
}

/// In-memory implementation of the [`Store`] contract.
///
/// A single mutex guards the whole map, which makes the collision check and
/// the insert of a new code atomic with respect to other writers. Data is
/// lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryStore<G = RandomHexGenerator> {
    state: Mutex<State>,
    generator: G,
    max_code_attempts: usize,
}

impl InMemoryStore<RandomHexGenerator> {
    /// Creates an empty store generating 16-character hex codes.
    pub fn new() -> Self {
        Self::with_generator(RandomHexGenerator::new())
    }
}

impl Default for InMemoryStore<RandomHexGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Generator> InMemoryStore<G> {
    pub fn with_generator(generator: G) -> Self {
        Self {
            state: Mutex::new(State::default()),
            generator,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }

    /// Caps how many candidates a single insert may draw.
    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts;
        self
    }
}

#[async_trait]
impl<G: Generator> Store for InMemoryStore<G> {
    async fn create(&self, url: NewUrl) -> Result<UrlRecord> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        let record = state.insert(&self.generator, self.max_code_attempts, url)?;
        debug!(code = %record.id, owner = %record.owner, "stored url");
        Ok(record)
    }

    async fn get_by_id(&self, id: &ShortCode) -> Result<UrlRecord> {
        let state = self.state.lock();
        state.ensure_open()?;

        match state.urls.get(id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(record) if record.is_deleted => Err(StoreError::IsDeleted(id.to_string())),
            Some(record) => Ok(record.clone()),
        }
    }

    async fn list_by_owner(&self, owner: &Owner) -> Result<Vec<UrlRecord>> {
        let state = self.state.lock();
        state.ensure_open()?;

        Ok(state
            .urls
            .values()
            .filter(|record| &record.owner == owner && !record.is_deleted)
            .cloned()
            .collect())
    }

    async fn bulk_create(&self, urls: Vec<NewUrl>) -> Result<Vec<BatchOutcome>> {
        self.state.lock().ensure_open()?;

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let correlation_id = url.correlation_id().map(str::to_owned);
            // Lock per item so a large batch doesn't starve other writers.
            let result = {
                let mut state = self.state.lock();
                state
                    .ensure_open()
                    .and_then(|()| state.insert(&self.generator, self.max_code_attempts, url))
            };
            outcomes.push(BatchOutcome {
                correlation_id,
                result,
            });
        }
        Ok(outcomes)
    }

    async fn bulk_soft_delete(&self, ids: &[ShortCode], owner: &Owner) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let State {
            urls, live_by_url, ..
        } = &mut *state;
        for id in ids {
            let Some(record) = urls.get_mut(id) else {
                trace!(code = %id, "skipping unknown short code");
                continue;
            };
            if &record.owner != owner || record.is_deleted {
                continue;
            }
            record.is_deleted = true;
            live_by_url.remove(&record.original_url);
            debug!(code = %id, owner = %owner, "soft deleted url");
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.lock();
        state.ensure_open()?;

        let live = state.urls.values().filter(|record| !record.is_deleted);
        let mut users = HashSet::new();
        let mut urls = 0;
        for record in live {
            urls += 1;
            users.insert(&record.owner);
        }
        Ok(StoreStats {
            urls,
            users: users.len(),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.state.lock().ensure_open()
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_generator::ScriptedGenerator;
    use std::sync::Arc;

    fn url(original: &str, owner: &str) -> NewUrl {
        NewUrl::new(original, Owner::new(owner)).unwrap()
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = InMemoryStore::new();

        let created = store.create(url("https://example.com", "u1")).await.unwrap();
        let got = store.get_by_id(&created.id).await.unwrap();

        assert_eq!(got.original_url, "https://example.com");
        assert_eq!(got.owner, Owner::new("u1"));
        assert!(!got.is_deleted);
        assert_eq!(got.id.as_str().len(), 16);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let store = InMemoryStore::new();

        let err = store.get_by_id(&ShortCode::new("nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn collision_regenerates_code() {
        let generator = ScriptedGenerator::new(["aa", "aa", "aa", "bb"]);
        let store = InMemoryStore::with_generator(generator);

        let first = store.create(url("https://one.example", "u1")).await.unwrap();
        let second = store.create(url("https://two.example", "u1")).await.unwrap();

        assert_eq!(first.id.as_str(), "aa");
        assert_eq!(second.id.as_str(), "bb");
        assert_eq!(store.generator.calls(), 4);
    }

    #[tokio::test]
    async fn unsafe_candidates_are_skipped() {
        let generator = ScriptedGenerator::new(["q+/w==", "ok"]);
        let store = InMemoryStore::with_generator(generator);

        let created = store.create(url("https://one.example", "u1")).await.unwrap();
        assert_eq!(created.id.as_str(), "ok");
    }

    #[tokio::test]
    async fn duplicate_url_keeps_first_writer() {
        let store = InMemoryStore::new();

        let first = store.create(url("https://a.example", "u1")).await.unwrap();
        let err = store.create(url("https://a.example", "u2")).await.unwrap_err();

        let existing = err.existing().expect("already exists");
        assert_eq!(existing.id, first.id);
        assert_eq!(existing.owner, Owner::new("u1"));
    }

    #[tokio::test]
    async fn deleted_url_can_be_shortened_again() {
        let store = InMemoryStore::new();
        let owner = Owner::new("u1");

        let first = store.create(url("https://a.example", "u1")).await.unwrap();
        store
            .bulk_soft_delete(std::slice::from_ref(&first.id), &owner)
            .await
            .unwrap();
        let second = store.create(url("https://a.example", "u1")).await.unwrap();

        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn one_byte_keyspace_under_concurrency() {
        let generator = snip_generator::RandomHexGenerator::builder().bytes(1).build();
        let store = Arc::new(InMemoryStore::with_generator(generator));
        let mut handles = vec![];

        for i in 0..200u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create(url(&format!("https://example{}.com", i), "u1"))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(store.stats().await.unwrap().urls, 200);
    }

    #[tokio::test]
    async fn full_keyspace_reports_exhaustion() {
        let generator = snip_generator::RandomHexGenerator::builder().bytes(1).build();
        let store = InMemoryStore::with_generator(generator);

        for i in 0..256u32 {
            store
                .create(url(&format!("https://example{i}.com"), "u1"))
                .await
                .unwrap();
        }

        let err = store
            .create(url("https://one-too-many.example", "u1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::CodeSpaceExhausted {
                attempts: DEFAULT_MAX_CODE_ATTEMPTS
            }
        ));

        // The guard is released, so the store keeps serving.
        assert_eq!(store.stats().await.unwrap().urls, 256);
    }

    #[tokio::test]
    async fn generator_without_usable_codes_fails_fast() {
        let store = InMemoryStore::with_generator(ScriptedGenerator::new(["a/b"; 3]))
            .with_max_code_attempts(3);

        let err = store.create(url("https://a.example", "u1")).await.unwrap_err();
        assert!(matches!(err, StoreError::CodeSpaceExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let store = InMemoryStore::new();

        store.close().await.unwrap();

        assert!(matches!(store.ping().await, Err(StoreError::AlreadyClosed)));
        assert!(matches!(store.close().await, Err(StoreError::AlreadyClosed)));
        assert!(matches!(
            store.create(url("https://a.example", "u1")).await,
            Err(StoreError::AlreadyClosed)
        ));
    }
}
