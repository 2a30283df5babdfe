//! Transactional batch backend
//!
//! Records are written one upsert at a time inside a transaction that is
//! committed every `batch_size` records. A failing write rolls back only the
//! open transaction; batches committed before it stay in the database.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{Any, AnyConnection, AnyPool, Row, Transaction};

use super::{LinkSummary, RecordStore, resolve_link};
use crate::config::DatabaseConfig;
use crate::models::{Account, Customer, CustomerAccountLink, IdMap};

const UPSERT_CUSTOMER: &str = r#"
    INSERT INTO customers (client_id, customer_number, customer_name, address, name, email)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (customer_number) DO UPDATE SET
        client_id = EXCLUDED.client_id,
        customer_name = EXCLUDED.customer_name,
        address = EXCLUDED.address,
        name = EXCLUDED.name,
        email = EXCLUDED.email,
        updated_at = CURRENT_TIMESTAMP
    RETURNING id
"#;

const UPSERT_ACCOUNT: &str = r#"
    INSERT INTO accounts (account_number, account_name)
    VALUES ($1, $2)
    ON CONFLICT (account_number) DO UPDATE SET
        account_name = EXCLUDED.account_name,
        updated_at = CURRENT_TIMESTAMP
    RETURNING id
"#;

const INSERT_LINK: &str = r#"
    INSERT INTO customer_accounts (customer_id, account_id)
    VALUES ($1, $2)
    ON CONFLICT (customer_id, account_id) DO NOTHING
"#;

/// Relational backend over an sqlx `Any` pool (Postgres or SQLite)
#[derive(Debug)]
pub struct SqlStore {
    pool: AnyPool,
    batch_size: usize,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    records_committed: AtomicU64,
}

/// Transaction counters since the store was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlStoreStats {
    /// Commits that carried at least one write
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub records_committed: u64,
}

impl SqlStore {
    /// Connect with the configured parameters and verify the connection
    pub async fn connect(config: &DatabaseConfig, batch_size: usize) -> Result<Self> {
        let url = config.connection_url();
        Self::connect_url(&url, batch_size)
            .await
            .with_context(|| format!("Failed to open database {} on {}", config.dbname, config.host))
    }

    /// Connect to an explicit sqlx URL (`postgres://...`, `sqlite://...`)
    pub async fn connect_url(url: &str, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("Batch size must be greater than zero");
        }

        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .context("Failed to connect to database")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Failed to ping database")?;

        debug!("Connected to database (batch size {})", batch_size);

        Ok(Self {
            pool,
            batch_size,
            transactions_committed: AtomicU64::new(0),
            transactions_rolled_back: AtomicU64::new(0),
            records_committed: AtomicU64::new(0),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn stats(&self) -> SqlStoreStats {
        SqlStoreStats {
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            records_committed: self.records_committed.load(Ordering::Relaxed),
        }
    }
}

/// An open transaction that commits and reopens itself every `batch_size` records
struct BatchTransaction<'a> {
    store: &'a SqlStore,
    tx: Option<Transaction<'static, Any>>,
    entity: &'static str,
    pending: usize,
}

impl<'a> BatchTransaction<'a> {
    async fn begin(store: &'a SqlStore, entity: &'static str) -> Result<Self> {
        let tx = store
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        Ok(Self {
            store,
            tx: Some(tx),
            entity,
            pending: 0,
        })
    }

    fn conn(&mut self) -> Result<&mut AnyConnection> {
        self.tx
            .as_deref_mut()
            .context("Transaction already finished")
    }

    /// Account for the record at 1-based `position`; commit on a batch boundary.
    ///
    /// `wrote` is false for records that were skipped without touching the database.
    async fn advance(&mut self, position: usize, wrote: bool) -> Result<()> {
        if wrote {
            self.pending += 1;
        }

        if position % self.store.batch_size == 0 {
            self.commit().await.context("Failed to commit batch")?;
            info!("Processed {} {}", position, self.entity);

            let tx = self
                .store
                .pool
                .begin()
                .await
                .context("Failed to begin new transaction")?;
            self.tx = Some(tx);
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            if self.pending > 0 {
                self.store
                    .transactions_committed
                    .fetch_add(1, Ordering::Relaxed);
                self.store
                    .records_committed
                    .fetch_add(self.pending as u64, Ordering::Relaxed);
            }
            self.pending = 0;
        }
        Ok(())
    }

    /// Roll back the open transaction and hand the original error back
    async fn abort(mut self, err: anyhow::Error) -> anyhow::Error {
        if let Some(tx) = self.tx.take() {
            match tx.rollback().await {
                Ok(()) => {
                    self.store
                        .transactions_rolled_back
                        .fetch_add(1, Ordering::Relaxed);
                    debug!("Rolled back {} uncommitted {}", self.pending, self.entity);
                }
                Err(e) => warn!("Rollback of {} batch failed: {}", self.entity, e),
            }
        }
        err
    }

    async fn finish(mut self) -> Result<()> {
        self.commit().await.context("Failed to commit final batch")
    }
}

async fn upsert_customer(conn: &mut AnyConnection, customer: &Customer) -> Result<i64> {
    let row = sqlx::query(UPSERT_CUSTOMER)
        .bind(customer.client_id.clone())
        .bind(customer.customer_number.clone())
        .bind(customer.customer_name.clone())
        .bind(customer.address.clone())
        .bind(customer.name.clone())
        .bind(customer.email.clone())
        .fetch_one(conn)
        .await?;

    Ok(row.try_get("id")?)
}

async fn upsert_account(conn: &mut AnyConnection, account: &Account) -> Result<i64> {
    let row = sqlx::query(UPSERT_ACCOUNT)
        .bind(account.account_number.clone())
        .bind(account.account_name.clone())
        .fetch_one(conn)
        .await?;

    Ok(row.try_get("id")?)
}

async fn insert_link(conn: &mut AnyConnection, customer_id: i64, account_id: i64) -> Result<()> {
    sqlx::query(INSERT_LINK)
        .bind(customer_id)
        .bind(account_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl RecordStore for SqlStore {
    async fn insert_customers(&self, customers: &[Customer]) -> Result<IdMap> {
        let mut ids = IdMap::with_capacity(customers.len());
        let mut batch = BatchTransaction::begin(self, "customers").await?;

        for (i, customer) in customers.iter().enumerate() {
            let result = upsert_customer(batch.conn()?, customer).await;
            let id = match result {
                Ok(id) => id,
                Err(err) => {
                    let err = err.context(format!(
                        "Failed to insert customer {}",
                        customer.customer_number
                    ));
                    return Err(batch.abort(err).await);
                }
            };

            ids.insert(customer.customer_number.clone(), id);
            batch.advance(i + 1, true).await?;
        }

        batch.finish().await?;
        Ok(ids)
    }

    async fn insert_accounts(&self, accounts: &[Account]) -> Result<IdMap> {
        let mut ids = IdMap::with_capacity(accounts.len());
        let mut batch = BatchTransaction::begin(self, "accounts").await?;

        for (i, account) in accounts.iter().enumerate() {
            let result = upsert_account(batch.conn()?, account).await;
            let id = match result {
                Ok(id) => id,
                Err(err) => {
                    let err = err.context(format!(
                        "Failed to insert account {}",
                        account.account_number
                    ));
                    return Err(batch.abort(err).await);
                }
            };

            ids.insert(account.account_number.clone(), id);
            batch.advance(i + 1, true).await?;
        }

        batch.finish().await?;
        Ok(ids)
    }

    async fn insert_customer_accounts(
        &self,
        links: &[CustomerAccountLink],
        customer_ids: &IdMap,
        account_ids: &IdMap,
    ) -> Result<LinkSummary> {
        let mut summary = LinkSummary::default();
        let mut batch = BatchTransaction::begin(self, "customer-account links").await?;

        for (i, link) in links.iter().enumerate() {
            let Some((customer_id, account_id)) = resolve_link(link, customer_ids, account_ids)
            else {
                summary.skipped += 1;
                batch.advance(i + 1, false).await?;
                continue;
            };

            let result = insert_link(batch.conn()?, customer_id, account_id).await;
            if let Err(err) = result {
                let err = err.context(format!(
                    "Failed to insert customer-account link {}-{}",
                    link.customer_number, link.account_number
                ));
                return Err(batch.abort(err).await);
            }

            summary.linked += 1;
            batch.advance(i + 1, true).await?;
        }

        batch.finish().await?;
        Ok(summary)
    }

    async fn close(&mut self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "database"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{count_rows, customers, sqlite_store};

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_dir, store) = sqlite_store(1000).await;
        let batch = customers(5);

        let first = store.insert_customers(&batch).await.unwrap();
        let second = store.insert_customers(&batch).await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert_eq!(count_rows(&store, "customers").await, 5);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_fields() {
        let (_dir, store) = sqlite_store(1000).await;
        let mut batch = customers(2);
        let ids = store.insert_customers(&batch).await.unwrap();

        batch[1].customer_name = "Renamed Corp".to_string();
        batch[1].email = None;
        let again = store.insert_customers(&batch).await.unwrap();
        assert_eq!(ids, again);

        let row = sqlx::query("SELECT customer_name, email FROM customers WHERE customer_number = $1")
            .bind("CUST000002".to_string())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.try_get::<String, _>("customer_name").unwrap(), "Renamed Corp");
        assert_eq!(row.try_get::<Option<String>, _>("email").unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_boundaries() {
        let (_dir, store) = sqlite_store(3).await;

        let ids = store.insert_customers(&customers(10)).await.unwrap();

        assert_eq!(ids.len(), 10);
        assert_eq!(count_rows(&store, "customers").await, 10);
        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 4);
        assert_eq!(stats.records_committed, 10);
        assert_eq!(stats.transactions_rolled_back, 0);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_extra_commit() {
        let (_dir, store) = sqlite_store(5).await;

        store.insert_customers(&customers(10)).await.unwrap();

        assert_eq!(store.stats().transactions_committed, 2);
        assert_eq!(count_rows(&store, "customers").await, 10);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_only_current_batch() {
        let (_dir, store) = sqlite_store(3).await;
        let mut batch = customers(8);
        // Empty names violate the test schema's CHECK constraint
        batch[4].customer_name = String::new();

        let err = store.insert_customers(&batch).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to insert customer CUST000005"));
        // First batch (1..=3) committed, second batch (4, 5) rolled back
        assert_eq!(count_rows(&store, "customers").await, 3);
        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 1);
        assert_eq!(stats.transactions_rolled_back, 1);
    }

    #[tokio::test]
    async fn test_accounts_upsert() {
        let (_dir, store) = sqlite_store(2).await;
        let accounts: Vec<Account> = (1..=3)
            .map(|i| Account {
                account_number: format!("ACC{:06}", i),
                account_name: format!("Account {}", i),
            })
            .collect();

        let first = store.insert_accounts(&accounts).await.unwrap();
        let second = store.insert_accounts(&accounts).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(count_rows(&store, "accounts").await, 3);
    }

    #[tokio::test]
    async fn test_account_failure_rolls_back_current_batch() {
        let (_dir, store) = sqlite_store(2).await;
        let mut accounts: Vec<Account> = (1..=5)
            .map(|i| Account {
                account_number: format!("ACC{:06}", i),
                account_name: format!("Account {}", i),
            })
            .collect();
        accounts[3].account_name = String::new();

        let err = store.insert_accounts(&accounts).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to insert account ACC000004"));
        // Batch (1, 2) committed, batch (3, 4) rolled back
        assert_eq!(count_rows(&store, "accounts").await, 2);
        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 1);
        assert_eq!(stats.transactions_rolled_back, 1);
    }

    #[tokio::test]
    async fn test_link_failure_rolls_back_current_batch() {
        let (_dir, store) = sqlite_store(2).await;
        let customer_ids: IdMap = [("C1", 1), ("C2", 2), ("C3", 3), ("C4", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        // A non-positive ID violates the test schema's CHECK constraint
        let account_ids: IdMap = [("A1", 10), ("A2", 20), ("A3", 30), ("BAD", -1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let links = vec![
            CustomerAccountLink::new("C1", "A1"),
            CustomerAccountLink::new("C2", "A2"),
            CustomerAccountLink::new("C3", "A3"),
            CustomerAccountLink::new("C4", "BAD"),
            CustomerAccountLink::new("C1", "A3"),
        ];

        let err = store
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to insert customer-account link C4-BAD"));
        assert_eq!(count_rows(&store, "customer_accounts").await, 2);
        let stats = store.stats();
        assert_eq!(stats.transactions_committed, 1);
        assert_eq!(stats.transactions_rolled_back, 1);
    }

    #[tokio::test]
    async fn test_link_resolution_skips_unknown_customer() {
        let (_dir, store) = sqlite_store(1000).await;
        let customer_ids: IdMap = [("C1".to_string(), 1)].into_iter().collect();
        let account_ids: IdMap = [("A1".to_string(), 10)].into_iter().collect();
        let links = vec![
            CustomerAccountLink::new("C1", "A1"),
            CustomerAccountLink::new("C2", "A1"),
        ];

        let summary = store
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap();

        assert_eq!(summary, LinkSummary { linked: 1, skipped: 1 });
        let row = sqlx::query("SELECT customer_id, account_id FROM customer_accounts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.try_get::<i64, _>("customer_id").unwrap(), 1);
        assert_eq!(row.try_get::<i64, _>("account_id").unwrap(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_links_are_ignored() {
        let (_dir, store) = sqlite_store(2).await;
        let customer_ids: IdMap = [("C1".to_string(), 1)].into_iter().collect();
        let account_ids: IdMap = [("A1".to_string(), 10), ("A2".to_string(), 11)]
            .into_iter()
            .collect();
        let links = vec![
            CustomerAccountLink::new("C1", "A1"),
            CustomerAccountLink::new("C1", "A2"),
            CustomerAccountLink::new("C1", "A1"),
        ];

        store
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap();
        store
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap();

        assert_eq!(count_rows(&store, "customer_accounts").await, 2);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/missing/import.db", dir.path().display());

        let err = SqlStore::connect_url(&url, 10).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to connect to database"));
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let err = SqlStore::connect_url("sqlite::memory:", 0).await.unwrap_err();
        assert!(err.to_string().contains("Batch size"));
    }
}
