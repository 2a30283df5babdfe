//! Batch-upsert engine
//!
//! A [`RecordStore`] persists customers and accounts, hands back the surrogate
//! IDs it assigned keyed by natural key, and then writes the links between
//! them. Two backends implement it:
//!
//! - [`SqlStore`]: transactional batches against a relational database
//! - [`ApiClient`](crate::api::ApiClient): one rate-limited request per record
//!
//! The backend is picked once at startup by [`open`].

pub mod sql;

use anyhow::Result;
use async_trait::async_trait;
use log::warn;

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::models::{Account, Customer, CustomerAccountLink, IdMap};

pub use sql::{SqlStore, SqlStoreStats};

/// Outcome of the link phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    /// Links sent to the backend
    pub linked: usize,
    /// Links dropped because a customer or account number was not resolved
    pub skipped: usize,
}

/// Bulk insert-or-update of the three record sets
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert customers, returning `customer_number -> id`
    async fn insert_customers(&self, customers: &[Customer]) -> Result<IdMap>;

    /// Upsert accounts, returning `account_number -> id`
    async fn insert_accounts(&self, accounts: &[Account]) -> Result<IdMap>;

    /// Resolve each link through the two ID maps and insert it.
    ///
    /// Unresolvable links are logged and skipped; they never fail the call.
    async fn insert_customer_accounts(
        &self,
        links: &[CustomerAccountLink],
        customer_ids: &IdMap,
        account_ids: &IdMap,
    ) -> Result<LinkSummary>;

    /// Release connections held by the backend
    async fn close(&mut self) -> Result<()>;

    /// Short backend name for log lines
    fn name(&self) -> &'static str;
}

/// Look up both sides of a link, warning about the first missing key
pub fn resolve_link(
    link: &CustomerAccountLink,
    customer_ids: &IdMap,
    account_ids: &IdMap,
) -> Option<(i64, i64)> {
    let Some(&customer_id) = customer_ids.get(&link.customer_number) else {
        warn!(
            "Customer number {} not found, skipping link to {}",
            link.customer_number, link.account_number
        );
        return None;
    };

    let Some(&account_id) = account_ids.get(&link.account_number) else {
        warn!(
            "Account number {} not found, skipping link from {}",
            link.account_number, link.customer_number
        );
        return None;
    };

    Some((customer_id, account_id))
}

/// Open the backend selected by the configuration
pub async fn open(config: &AppConfig) -> Result<Box<dyn RecordStore>> {
    if config.api.use_api {
        Ok(Box::new(ApiClient::new(&config.api)?))
    } else {
        Ok(Box::new(SqlStore::connect(&config.db, config.batch_size).await?))
    }
}
