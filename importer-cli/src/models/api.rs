//! Wire shapes for the HTTP backend

use serde::{Deserialize, Serialize};

use super::{Account, Customer};

/// Body of `POST /customers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub customer_number: String,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of `POST /accounts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub account_number: String,
    pub account_name: String,
}

/// Body of `POST /customer-accounts`, referencing surrogate IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerAccountLinkRequest {
    pub customer_id: i64,
    pub account_id: i64,
}

/// Response of the create endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: i64,
}

impl From<&Customer> for CustomerRequest {
    fn from(c: &Customer) -> Self {
        Self {
            client_id: c.client_id.clone().filter(|s| !s.is_empty()),
            customer_number: c.customer_number.clone(),
            customer_name: c.customer_name.clone(),
            address: c.address.clone().filter(|s| !s.is_empty()),
            name: c.name.clone().filter(|s| !s.is_empty()),
            email: c.email.clone().filter(|s| !s.is_empty()),
        }
    }
}

impl From<&Account> for AccountRequest {
    fn from(a: &Account) -> Self {
        Self {
            account_number: a.account_number.clone(),
            account_name: a.account_name.clone(),
        }
    }
}

impl CustomerAccountLinkRequest {
    pub fn new(customer_id: i64, account_id: i64) -> Self {
        Self {
            customer_id,
            account_id,
        }
    }
}
