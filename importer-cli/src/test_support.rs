//! Fixtures shared by the test modules

use sqlx::Row;
use tempfile::TempDir;

use crate::models::Customer;
use crate::store::SqlStore;

/// Same shape as the production tables, in SQLite dialect. The CHECKs let
/// tests force a write failure: an empty name, or a non-positive link ID.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id TEXT,
        customer_number TEXT NOT NULL UNIQUE,
        customer_name TEXT NOT NULL CHECK (length(customer_name) > 0),
        address TEXT,
        name TEXT,
        email TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_number TEXT NOT NULL UNIQUE,
        account_name TEXT NOT NULL CHECK (length(account_name) > 0),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE customer_accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (customer_id, account_id),
        CHECK (customer_id > 0 AND account_id > 0)
    )"#,
];

/// `n` complete customers numbered `CUST000001..`
pub fn customers(n: usize) -> Vec<Customer> {
    (1..=n)
        .map(|i| Customer {
            client_id: Some(format!("CLI{:06}", i)),
            customer_number: format!("CUST{:06}", i),
            customer_name: format!("Customer {} Corp", i),
            address: Some(format!("{} Business St, Suite 1", i)),
            name: Some("Jane Smith".to_string()),
            email: Some(format!("contact{}@customer{}.com", i, i)),
        })
        .collect()
}

/// A store over a fresh SQLite file; keep the `TempDir` alive for the test
pub async fn sqlite_store(batch_size: usize) -> (TempDir, SqlStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("import.db").display());
    let store = SqlStore::connect_url(&url, batch_size).await.unwrap();

    for statement in SCHEMA {
        sqlx::query(statement).execute(store.pool()).await.unwrap();
    }

    (dir, store)
}

pub async fn count_rows(store: &SqlStore, table: &str) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
        .fetch_one(store.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap()
}
