use crate::codes::{next_free_code, DEFAULT_MAX_CODE_ATTEMPTS};
use async_trait::async_trait;
use snip_core::{
    BatchOutcome, NewUrl, Owner, Result, ShortCode, Store, StoreError, StoreStats, UrlRecord,
};
use snip_generator::{Generator, RandomHexGenerator};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File-backed implementation of the [`Store`] contract.
///
/// Records are kept as JSON lines, one full record per line, with no index.
/// Every operation reopens the file and scans it from the top; writes are
/// serialised by an async mutex held across the scan and the append.
#[derive(Debug)]
pub struct FileStore<G = RandomHexGenerator> {
    path: PathBuf,
    lock: Mutex<()>,
    closed: AtomicBool,
    generator: G,
    max_code_attempts: usize,
}

impl FileStore<RandomHexGenerator> {
    /// Opens (creating if needed) the store file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_generator(path, RandomHexGenerator::new()).await
    }
}

impl<G: Generator> FileStore<G> {
    pub async fn open_with_generator(path: impl Into<PathBuf>, generator: G) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(StoreError::NotAccessible(
                "file storage path is empty".to_string(),
            ));
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::NotAccessible(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), "opened file-based store");
        Ok(Self {
            path,
            lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            generator,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        })
    }

    /// Caps how many candidates a single insert may draw.
    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<UrlRecord>> {
        let contents = fs::read_to_string(&self.path).await?;
        let torn = !contents.is_empty() && !contents.ends_with('\n');

        let mut records = Vec::new();
        let mut lines = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .peekable();
        while let Some((n, line)) = lines.next() {
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                // An interrupted append leaves a partial last line behind.
                Err(e) if torn && lines.peek().is_none() => {
                    warn!(
                        path = %self.path.display(),
                        line = n + 1,
                        error = %e,
                        "ignoring torn final line"
                    );
                }
                Err(e) => {
                    return Err(StoreError::InvalidData(format!(
                        "{} line {}: {e}",
                        self.path.display(),
                        n + 1
                    )))
                }
            }
        }
        Ok(records)
    }

    async fn append(&self, record: &UrlRecord) -> Result<()> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| StoreError::InvalidData(e.to_string()))?;
        line.push(b'\n');

        let contents = fs::read(&self.path).await?;
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        if let Some(start) = torn_tail(&contents) {
            if serde_json::from_slice::<UrlRecord>(&contents[start..]).is_ok() {
                line.insert(0, b'\n');
            } else {
                warn!(
                    path = %self.path.display(),
                    bytes = contents.len() - start,
                    "truncating torn final line"
                );
                file.set_len(start as u64).await?;
            }
        }

        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replaces the file contents atomically via a sibling temp file.
    async fn rewrite(&self, records: &[UrlRecord]) -> Result<()> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            buf.push(b'\n');
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &buf).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Claims a code for `url` against the already-loaded `records` and
    /// appends it. Callers hold the write lock.
    async fn insert(
        &self,
        records: &mut Vec<UrlRecord>,
        taken: &mut HashSet<ShortCode>,
        url: NewUrl,
    ) -> Result<UrlRecord> {
        if let Some(existing) = records
            .iter()
            .find(|r| !r.is_deleted && r.original_url == url.original_url())
        {
            return Err(StoreError::AlreadyExists(Box::new(existing.clone())));
        }

        let code = next_free_code(&self.generator, self.max_code_attempts, |candidate| {
            taken.contains(candidate)
        })?;
        let record = url.into_record(code);
        self.append(&record).await?;

        taken.insert(record.id.clone());
        records.push(record.clone());
        Ok(record)
    }
}

/// Offset of a final line that lacks its newline, if there is one.
fn torn_tail(contents: &[u8]) -> Option<usize> {
    match contents.last() {
        None | Some(b'\n') => None,
        Some(_) => Some(
            contents
                .iter()
                .rposition(|b| *b == b'\n')
                .map_or(0, |i| i + 1),
        ),
    }
}

#[async_trait]
impl<G: Generator> Store for FileStore<G> {
    async fn create(&self, url: NewUrl) -> Result<UrlRecord> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        let mut records = self.read_all().await?;
        let mut taken: HashSet<ShortCode> = records.iter().map(|r| r.id.clone()).collect();
        let record = self.insert(&mut records, &mut taken, url).await?;
        debug!(code = %record.id, owner = %record.owner, "stored url");
        Ok(record)
    }

    async fn get_by_id(&self, id: &ShortCode) -> Result<UrlRecord> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        match self.read_all().await?.into_iter().find(|r| &r.id == id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(record) if record.is_deleted => Err(StoreError::IsDeleted(id.to_string())),
            Some(record) => Ok(record),
        }
    }

    async fn list_by_owner(&self, owner: &Owner) -> Result<Vec<UrlRecord>> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| &r.owner == owner && !r.is_deleted)
            .collect())
    }

    async fn bulk_create(&self, urls: Vec<NewUrl>) -> Result<Vec<BatchOutcome>> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        let mut records = self.read_all().await?;
        let mut taken: HashSet<ShortCode> = records.iter().map(|r| r.id.clone()).collect();
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let correlation_id = url.correlation_id().map(str::to_owned);
            let result = self.insert(&mut records, &mut taken, url).await;
            if let Err(err) = &result {
                if err.existing().is_none() {
                    warn!(error = %err, "batch item failed");
                }
            }
            outcomes.push(BatchOutcome {
                correlation_id,
                result,
            });
        }
        Ok(outcomes)
    }

    async fn bulk_soft_delete(&self, ids: &[ShortCode], owner: &Owner) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        let ids: HashSet<&ShortCode> = ids.iter().collect();
        let mut records = self.read_all().await?;
        let mut changed = 0;
        for record in records.iter_mut() {
            if !record.is_deleted && &record.owner == owner && ids.contains(&record.id) {
                record.is_deleted = true;
                changed += 1;
            }
        }

        if changed > 0 {
            self.rewrite(&records).await?;
        }
        debug!(owner = %owner, changed, "soft deleted urls");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let _guard = self.lock.lock().await;
        self.ensure_open()?;

        let records = self.read_all().await?;
        let live: Vec<_> = records.iter().filter(|r| !r.is_deleted).collect();
        let users: HashSet<_> = live.iter().map(|r| &r.owner).collect();
        Ok(StoreStats {
            urls: live.len(),
            users: users.len(),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        fs::metadata(&self.path)
            .await
            .map_err(|e| StoreError::NotAccessible(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }
}
