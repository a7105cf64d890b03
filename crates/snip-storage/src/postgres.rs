use crate::codes::{next_safe_code, DEFAULT_MAX_CODE_ATTEMPTS};
use async_trait::async_trait;
use snip_core::{
    BatchOutcome, NewUrl, Owner, Result, ShortCode, Store, StoreError, StoreStats, UrlRecord,
};
use snip_generator::{Generator, RandomHexGenerator};
use sqlx::postgres::{PgConnection, PgExecutor, PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Schema applied by [`PostgresStore::migrate`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

const PRIMARY_KEY: &str = "urls_pkey";
const LIVE_URL_INDEX: &str = "urls_original_url_live_idx";

const SELECT_COLUMNS: &str = "SELECT id, original_url, created_by, correlation_id, is_deleted FROM urls";

/// PostgreSQL implementation of the [`Store`] contract.
///
/// Uniqueness is enforced by the database: the primary key on `id` and a
/// partial unique index on `original_url` over live rows. Inserts are
/// optimistic; a violation of the URL index is turned into
/// [`StoreError::AlreadyExists`] by reading the live row back, while a
/// violation of the primary key means the generated code collided and a new
/// one is drawn.
#[derive(Debug)]
pub struct PostgresStore<G = RandomHexGenerator> {
    pool: PgPool,
    generator: G,
    max_code_attempts: usize,
    closed: AtomicBool,
}

impl PostgresStore<RandomHexGenerator> {
    /// Creates a store from an existing pool. The schema is assumed to exist.
    pub fn new(pool: PgPool) -> Self {
        Self::with_generator(pool, RandomHexGenerator::new())
    }

    /// Opens a pool, checks connectivity and applies the schema.
    ///
    /// Any failure here is reported as [`StoreError::NotAccessible`].
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::NotAccessible(e.to_string()))?;

        let store = Self::new(pool);
        store
            .migrate()
            .await
            .map_err(|e| StoreError::NotAccessible(e.to_string()))?;
        info!("connected to postgres store");
        Ok(store)
    }
}

impl<G: Generator> PostgresStore<G> {
    pub fn with_generator(pool: PgPool, generator: G) -> Self {
        Self {
            pool,
            generator,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            closed: AtomicBool::new(false),
        }
    }

    /// Caps how many candidates a single insert may draw, counting both
    /// unsafe candidates and primary key collisions.
    pub fn with_max_code_attempts(mut self, attempts: usize) -> Self {
        self.max_code_attempts = attempts;
        self
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `urls` table and its indexes if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }

    /// Inserts `url` on `conn`, retrying on code collisions.
    ///
    /// Each attempt runs inside a savepoint, so a failed attempt leaves an
    /// enclosing transaction usable.
    async fn insert(&self, conn: &mut PgConnection, url: &NewUrl) -> Result<UrlRecord> {
        for _ in 0..self.max_code_attempts {
            let code = next_safe_code(&self.generator, self.max_code_attempts)?;

            let mut savepoint = conn.begin().await.map_err(map_sqlx_error)?;
            let inserted = insert_row(&mut *savepoint, &code, url).await;
            match inserted {
                Ok(()) => {
                    savepoint.commit().await.map_err(map_sqlx_error)?;
                    return Ok(url.clone().into_record(code));
                }
                Err(err) if violates(&err, PRIMARY_KEY) => {
                    savepoint.rollback().await.map_err(map_sqlx_error)?;
                    debug!(code = %code, "short code collision, regenerating");
                }
                Err(err) if violates(&err, LIVE_URL_INDEX) => {
                    savepoint.rollback().await.map_err(map_sqlx_error)?;
                    // The conflicting row may have been soft-deleted since;
                    // in that case the next attempt goes through.
                    if let Some(existing) = find_live_by_url(&mut *conn, url.original_url()).await?
                    {
                        return Err(StoreError::AlreadyExists(Box::new(existing)));
                    }
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        warn!(attempts = self.max_code_attempts, "gave up inserting url");
        Err(StoreError::CodeSpaceExhausted {
            attempts: self.max_code_attempts,
        })
    }
}

async fn insert_row<'e, E: PgExecutor<'e>>(
    executor: E,
    code: &ShortCode,
    url: &NewUrl,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO urls (id, original_url, created_by, correlation_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(code.as_str())
    .bind(url.original_url())
    .bind(url.owner().as_str())
    .bind(url.correlation_id())
    .execute(executor)
    .await?;
    Ok(())
}

async fn find_live_by_url<'e, E: PgExecutor<'e>>(
    executor: E,
    original_url: &str,
) -> Result<Option<UrlRecord>> {
    let row = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE original_url = $1 AND NOT is_deleted LIMIT 1"
    ))
    .bind(original_url)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.as_ref().map(record_from_row).transpose()
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let created_by: String = row.try_get("created_by").map_err(map_sqlx_error)?;
    let correlation_id: Option<String> = row.try_get("correlation_id").map_err(map_sqlx_error)?;
    let is_deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        id: ShortCode::new(id),
        original_url,
        owner: Owner::new(created_by),
        correlation_id,
        is_deleted,
    })
}

fn count_from_row(row: &PgRow, column: &str) -> Result<usize> {
    let value: i64 = row.try_get(column).map_err(map_sqlx_error)?;
    usize::try_from(value)
        .map_err(|e| StoreError::InvalidData(format!("invalid {column} count '{value}': {e}")))
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_unique_violation() && db.constraint() == Some(constraint)
    })
}

/// Maps driver errors onto the store taxonomy.
///
/// Server-side errors are classified by SQLSTATE: connection (`08`),
/// resource (`53`) and operator intervention (`57`) classes mean the database
/// is unavailable, except `57014` which is a cancelled statement.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let Some(code) = err.as_database_error().and_then(|db| db.code()) {
        let message = err.to_string();
        return match code.as_ref() {
            "57014" => StoreError::Timeout(message),
            c if c.starts_with("08") || c.starts_with("53") || c.starts_with("57") => {
                StoreError::NotAccessible(message)
            }
            c if c.starts_with("22") => StoreError::InvalidData(message),
            _ => StoreError::Query(message),
        };
    }

    let message = err.to_string();
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed => StoreError::AlreadyClosed,
        sqlx::Error::Configuration(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::NotAccessible(message),
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_) => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

#[async_trait]
impl<G: Generator> Store for PostgresStore<G> {
    async fn create(&self, url: NewUrl) -> Result<UrlRecord> {
        self.ensure_open()?;

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        let record = self.insert(&mut conn, &url).await?;
        debug!(code = %record.id, owner = %record.owner, "stored url");
        Ok(record)
    }

    async fn get_by_id(&self, id: &ShortCode) -> Result<UrlRecord> {
        self.ensure_open()?;

        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let record = record_from_row(&row)?;
        if record.is_deleted {
            return Err(StoreError::IsDeleted(id.to_string()));
        }
        Ok(record)
    }

    async fn list_by_owner(&self, owner: &Owner) -> Result<Vec<UrlRecord>> {
        self.ensure_open()?;

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE created_by = $1 AND NOT is_deleted"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn bulk_create(&self, urls: Vec<NewUrl>) -> Result<Vec<BatchOutcome>> {
        self.ensure_open()?;
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let result = match self.insert(&mut tx, &url).await {
                Ok(record) => Ok(record),
                Err(err @ StoreError::AlreadyExists(_)) => Err(err),
                Err(err) => {
                    error!(error = %err, "bulk create failed, rolling back");
                    return Err(err);
                }
            };
            outcomes.push(BatchOutcome {
                correlation_id: url.correlation_id().map(str::to_owned),
                result,
            });
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcomes)
    }

    async fn bulk_soft_delete(&self, ids: &[ShortCode], owner: &Owner) -> Result<()> {
        self.ensure_open()?;
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE created_by = $1
              AND id = ANY($2)
              AND NOT is_deleted
            "#,
        )
        .bind(owner.as_str())
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(owner = %owner, changed = result.rows_affected(), "soft deleted urls");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.ensure_open()?;

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls, COUNT(DISTINCT created_by) AS users
            FROM urls
            WHERE NOT is_deleted
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(StoreStats {
            urls: count_from_row(&row, "urls")?,
            users: count_from_row(&row, "users")?,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::AlreadyClosed);
        }
        self.pool.close().await;
        info!("closed postgres store");
        Ok(())
    }
}
