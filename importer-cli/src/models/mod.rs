//! Record shapes shared by the spreadsheet layer, the generator and the stores

pub mod api;

use std::collections::HashMap;

pub use api::{AccountRequest, CustomerAccountLinkRequest, CustomerRequest, IdResponse};

/// Natural key -> surrogate ID, produced by one import phase and consumed by the next
pub type IdMap = HashMap<String, i64>;

/// A customer row keyed by `customer_number`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Customer {
    /// External tag from the source system
    pub client_id: Option<String>,
    /// Natural key, unique across the customer table
    pub customer_number: String,
    pub customer_name: String,
    pub address: Option<String>,
    /// Contact person
    pub name: Option<String>,
    pub email: Option<String>,
}

/// An account row keyed by `account_number`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub account_number: String,
    pub account_name: String,
}

/// Many-to-many association between a customer and an account.
///
/// Carries only the two natural keys; surrogate IDs are looked up at insert time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerAccountLink {
    pub customer_number: String,
    pub account_number: String,
}

impl CustomerAccountLink {
    pub fn new(customer_number: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            customer_number: customer_number.into(),
            account_number: account_number.into(),
        }
    }
}

/// The three record sets of one import run
#[derive(Debug, Clone, Default)]
pub struct ImportData {
    pub customers: Vec<Customer>,
    pub accounts: Vec<Account>,
    pub links: Vec<CustomerAccountLink>,
}

/// Treat empty or whitespace-only cells as absent
pub fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
