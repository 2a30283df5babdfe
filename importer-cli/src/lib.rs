//! Bulk import of customers, accounts and customer-account links
//!
//! Records are read from an Excel workbook and written through a
//! [`store::RecordStore`]: either a Postgres database in transactional batches
//! or a rate-limited HTTP API.

pub mod api;
pub mod config;
pub mod excel;
pub mod generator;
pub mod import;
pub mod mock;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
