//! HTTP backend
//!
//! Every record becomes one `POST` against the remote API. Calls are strictly
//! sequential and throttled by a token bucket; the first non-2xx answer aborts
//! the whole operation with the response body in the error.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::resilience::RateLimiter;
use crate::config::ApiConfig;
use crate::models::{
    Account, AccountRequest, Customer, CustomerAccountLink, CustomerAccountLinkRequest,
    CustomerRequest, IdMap, IdResponse,
};
use crate::store::{LinkSummary, RecordStore, resolve_link};

/// Idle connections kept per host
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// How long an idle pooled connection survives
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Rate-limited client for the customer/account API
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
    http: Option<reqwest::Client>,
    limiter: RateLimiter,
    progress_interval: usize,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http: Some(http),
            limiter: RateLimiter::new(config.rate_limit.clone()),
            progress_interval: config.progress_interval.max(1),
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send one record, returning the response body on 200/201.
    ///
    /// `subject` names the record in log lines and errors, e.g. `customer CUST000001`.
    async fn send<T: Serialize>(&self, path: &str, body: &T, subject: &str) -> Result<String> {
        let http = self.http.as_ref().context("API client is closed")?;

        let payload = serde_json::to_string(body)
            .with_context(|| format!("Error serializing {}", subject))?;

        self.limiter.acquire().await;

        debug!("Sending {} payload: {}", subject, payload);

        let url = format!("{}/{}", self.base_url, path);
        let response = http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("Error making request for {}", subject))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Error reading response body for {}", subject))?;

        if status != StatusCode::OK && status != StatusCode::CREATED {
            anyhow::bail!(
                "API returned status {} for {}: {}",
                status.as_u16(),
                subject,
                text
            );
        }

        Ok(text)
    }

    async fn create<T: Serialize>(&self, path: &str, body: &T, subject: &str) -> Result<i64> {
        let text = self.send(path, body, subject).await?;
        let response: IdResponse = serde_json::from_str(&text)
            .with_context(|| format!("Error decoding response for {}, body: {}", subject, text))?;
        Ok(response.id)
    }

    fn log_progress(&self, processed: usize, total: usize, entity: &str) {
        if processed % self.progress_interval == 0 {
            info!("Processed {}/{} {}", processed, total, entity);
        }
    }
}

#[async_trait]
impl RecordStore for ApiClient {
    async fn insert_customers(&self, customers: &[Customer]) -> Result<IdMap> {
        let mut ids = IdMap::with_capacity(customers.len());

        for (i, customer) in customers.iter().enumerate() {
            let subject = format!("customer {}", customer.customer_number);
            let id = self
                .create("customers", &CustomerRequest::from(customer), &subject)
                .await?;

            ids.insert(customer.customer_number.clone(), id);
            self.log_progress(i + 1, customers.len(), "customers");
        }

        Ok(ids)
    }

    async fn insert_accounts(&self, accounts: &[Account]) -> Result<IdMap> {
        let mut ids = IdMap::with_capacity(accounts.len());

        for (i, account) in accounts.iter().enumerate() {
            let subject = format!("account {}", account.account_number);
            let id = self
                .create("accounts", &AccountRequest::from(account), &subject)
                .await?;

            ids.insert(account.account_number.clone(), id);
            self.log_progress(i + 1, accounts.len(), "accounts");
        }

        Ok(ids)
    }

    async fn insert_customer_accounts(
        &self,
        links: &[CustomerAccountLink],
        customer_ids: &IdMap,
        account_ids: &IdMap,
    ) -> Result<LinkSummary> {
        let mut summary = LinkSummary::default();

        for (i, link) in links.iter().enumerate() {
            match resolve_link(link, customer_ids, account_ids) {
                Some((customer_id, account_id)) => {
                    let subject = format!("link {}-{}", link.customer_number, link.account_number);
                    let body = CustomerAccountLinkRequest::new(customer_id, account_id);
                    self.send("customer-accounts", &body, &subject).await?;
                    summary.linked += 1;
                }
                None => summary.skipped += 1,
            }

            self.log_progress(i + 1, links.len(), "links");
        }

        Ok(summary)
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the client drains its connection pool
        if self.http.take().is_some() {
            let stats = self.limiter.stats();
            debug!(
                "API client closed after {} requests ({} throttled, {:.1}%)",
                stats.requests_acquired,
                stats.requests_waited,
                stats.wait_rate() * 100.0
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resilience::RateLimitConfig;
    use crate::mock::MockApi;
    use crate::test_support::customers;

    fn config_for(base_url: String) -> ApiConfig {
        ApiConfig {
            base_url,
            api_key: "test-key".to_string(),
            rate_limit: RateLimitConfig::disabled(),
            ..ApiConfig::default()
        }
    }

    async fn client_with_mock(mock: &MockApi) -> ApiClient {
        let addr = mock.spawn().await.unwrap();
        ApiClient::new(&config_for(format!("http://{}", addr))).unwrap()
    }

    #[tokio::test]
    async fn test_insert_customers_returns_ids() {
        let mock = MockApi::new();
        let client = client_with_mock(&mock).await;

        let first = client.insert_customers(&customers(5)).await.unwrap();
        let second = client.insert_customers(&customers(5)).await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert_eq!(mock.stats().customers, 5);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_failing_record() {
        let mock = MockApi::new().fail_on(["CUST000005"]);
        let client = client_with_mock(&mock).await;

        let err = client.insert_customers(&customers(10)).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("API returned status 500 for customer CUST000005"));
        assert!(message.contains("simulated failure"));

        let received = mock.received();
        assert_eq!(received.len(), 5);
        assert_eq!(received.last().map(String::as_str), Some("CUST000005"));
    }

    #[tokio::test]
    async fn test_accounts_and_links() {
        let mock = MockApi::new();
        let client = client_with_mock(&mock).await;

        let customer_ids = client.insert_customers(&customers(1)).await.unwrap();
        let account_ids = client
            .insert_accounts(&[Account {
                account_number: "ACC000001".to_string(),
                account_name: "Account 1".to_string(),
            }])
            .await
            .unwrap();

        let links = vec![
            CustomerAccountLink::new("CUST000001", "ACC000001"),
            CustomerAccountLink::new("CUST000002", "ACC000001"),
        ];
        let summary = client
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap();

        assert_eq!(summary, LinkSummary { linked: 1, skipped: 1 });
        let stats = mock.stats();
        assert_eq!(stats.accounts, 1);
        assert_eq!(stats.links, 1);
    }

    #[tokio::test]
    async fn test_link_resolution_with_literal_ids() {
        let mock = MockApi::new();
        let client = client_with_mock(&mock).await;
        let customer_ids: IdMap = [("C1".to_string(), 1)].into_iter().collect();
        let account_ids: IdMap = [("A1".to_string(), 10)].into_iter().collect();
        let links = vec![CustomerAccountLink::new("C1", "A1"), CustomerAccountLink::new("C2", "A1")];

        let summary = client
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap();

        assert_eq!(summary, LinkSummary { linked: 1, skipped: 1 });
        assert_eq!(mock.received(), vec!["1-10".to_string()]);
    }

    #[tokio::test]
    async fn test_link_failure_stops_link_phase() {
        let mock = MockApi::new().fail_on(["2-20"]);
        let client = client_with_mock(&mock).await;
        let customer_ids: IdMap = [("C1", 1), ("C2", 2), ("C3", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let account_ids: IdMap = [("A1", 10), ("A2", 20), ("A3", 30)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let links = vec![
            CustomerAccountLink::new("C1", "A1"),
            CustomerAccountLink::new("C9", "A1"),
            CustomerAccountLink::new("C2", "A2"),
            CustomerAccountLink::new("C3", "A3"),
        ];

        let err = client
            .insert_customer_accounts(&links, &customer_ids, &account_ids)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("API returned status 500 for link C2-A2"));
        assert_eq!(mock.received(), vec!["1-10".to_string(), "2-20".to_string()]);
        assert_eq!(mock.stats().links, 1);
    }

    #[tokio::test]
    async fn test_missing_credential_is_rejected() {
        let mock = MockApi::new();
        let addr = mock.spawn().await.unwrap();
        let mut config = config_for(format!("http://{}", addr));
        config.api_key = String::new();
        let client = ApiClient::new(&config).unwrap();

        let err = client.insert_customers(&customers(1)).await.unwrap_err();
        assert!(err.to_string().contains("status 401"));
    }

    #[tokio::test]
    async fn test_closed_client_refuses_requests() {
        let mock = MockApi::new();
        let mut client = client_with_mock(&mock).await;

        client.close().await.unwrap();
        let err = client.insert_customers(&customers(1)).await.unwrap_err();

        assert!(err.to_string().contains("API client is closed"));
        assert_eq!(mock.stats().customers, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = ApiClient::new(&config_for(format!("http://{}", addr))).unwrap();

        let err = client.insert_customers(&customers(1)).await.unwrap_err();
        assert!(err.to_string().contains("Error making request for customer CUST000001"));
    }

    #[tokio::test]
    async fn test_requests_pass_through_rate_limiter() {
        let mock = MockApi::new();
        let addr = mock.spawn().await.unwrap();
        let mut config = config_for(format!("http://{}", addr));
        config.rate_limit = RateLimitConfig::per_second(1000);
        let client = ApiClient::new(&config).unwrap();

        client.insert_customers(&customers(3)).await.unwrap();

        assert!(client.limiter().is_enabled());
        assert_eq!(client.limiter().stats().requests_acquired, 3);
    }
}
