//! Three-phase import: customers, then accounts, then the links between them
//!
//! Customers and accounts come back from the store with their surrogate IDs;
//! the link phase resolves natural keys through those maps. Any phase error
//! aborts the run. Work already committed by the store is not undone.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;

use crate::excel::read_import_workbook;
use crate::models::ImportData;
use crate::store::RecordStore;

/// Counts and timing of one import run
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub customers_read: usize,
    pub accounts_read: usize,
    pub links_read: usize,
    pub customers_upserted: usize,
    pub accounts_upserted: usize,
    pub links_inserted: usize,
    /// Links dropped because one side was not resolved
    pub links_skipped: usize,
}

/// Drives a [`RecordStore`] through one import
pub struct Importer<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Read the workbook at `path` and import it
    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let started = Instant::now();

        let data = read_import_workbook(path)?;
        info!("Read {} customers from file", data.customers.len());
        info!("Read {} accounts from file", data.accounts.len());
        info!("Read {} links from file", data.links.len());

        let mut summary = self.run(&data).await?;
        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Import already-parsed records
    pub async fn run(&self, data: &ImportData) -> Result<ImportSummary> {
        let started_at = Utc::now();
        let started = Instant::now();

        info!("Inserting customers via {}...", self.store.name());
        let customer_ids = self
            .store
            .insert_customers(&data.customers)
            .await
            .context("Failed to insert customers")?;
        info!("Inserted/Updated {} customers", customer_ids.len());

        info!("Inserting accounts...");
        let account_ids = self
            .store
            .insert_accounts(&data.accounts)
            .await
            .context("Failed to insert accounts")?;
        info!("Inserted/Updated {} accounts", account_ids.len());

        info!("Inserting customer-account links...");
        let links = self
            .store
            .insert_customer_accounts(&data.links, &customer_ids, &account_ids)
            .await
            .context("Failed to insert customer-account links")?;
        info!(
            "Inserted {} customer-account links ({} skipped)",
            links.linked, links.skipped
        );

        let duration = started.elapsed();
        info!("Import completed successfully in {:?}", duration);

        Ok(ImportSummary {
            started_at,
            duration,
            customers_read: data.customers.len(),
            accounts_read: data.accounts.len(),
            links_read: data.links.len(),
            customers_upserted: customer_ids.len(),
            accounts_upserted: account_ids.len(),
            links_inserted: links.linked,
            links_skipped: links.skipped,
        })
    }
}
