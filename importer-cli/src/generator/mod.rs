//! Synthetic test data
//!
//! Produces `N` customers, `N` accounts and a link set in which every customer
//! owns the account with its own ordinal, plus a random second (and maybe third)
//! account. The generator owns a seeded RNG so a given seed always yields the
//! same data.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Account, Customer, CustomerAccountLink, ImportData};

/// Rows between progress lines
const PROGRESS_EVERY: usize = 10_000;

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Lisa", "Robert", "Emily", "William", "Emma",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez",
];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub num_customers: usize,
    /// Probability of a second, random account per customer
    pub multi_account_chance: f32,
    /// Probability of a third account, rolled only when the second was added
    pub third_account_chance: f32,
    pub customer_prefix: String,
    pub account_prefix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_customers: 100_000,
            multi_account_chance: 0.3,
            third_account_chance: 0.1,
            customer_prefix: "CUST".to_string(),
            account_prefix: "ACC".to_string(),
        }
    }
}

/// Row counts of the last generation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub customer_count: usize,
    pub account_count: usize,
    pub link_count: usize,
}

pub struct DataGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    summary: GenerationSummary,
}

impl DataGenerator {
    pub fn new(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            summary: GenerationSummary::default(),
        }
    }

    pub fn summary(&self) -> GenerationSummary {
        self.summary
    }

    /// Customers, accounts and links in one go
    pub fn generate(&mut self) -> ImportData {
        ImportData {
            customers: self.generate_customers(),
            accounts: self.generate_accounts(),
            links: self.generate_links(),
        }
    }

    pub fn generate_customers(&mut self) -> Vec<Customer> {
        let n = self.config.num_customers;
        let mut customers = Vec::with_capacity(n);

        info!("Generating customer data...");
        for i in 1..=n {
            let street: u32 = self.rng.random_range(1..=999);
            let suite: u32 = self.rng.random_range(1..=100);
            let name = self.person_name();

            customers.push(Customer {
                client_id: Some(format!("CLI{:06}", i)),
                customer_number: self.customer_number(i),
                customer_name: format!("Customer {} Corp", i),
                address: Some(format!("{} Business St, Suite {}", street, suite)),
                name: Some(name),
                email: Some(format!("contact{}@customer{}.com", i, i)),
            });

            if i % PROGRESS_EVERY == 0 {
                info!("Generated {} customers...", i);
            }
        }

        self.summary.customer_count = customers.len();
        customers
    }

    pub fn generate_accounts(&mut self) -> Vec<Account> {
        let n = self.config.num_customers;
        let mut accounts = Vec::with_capacity(n);

        info!("Generating account data...");
        for i in 1..=n {
            accounts.push(Account {
                account_number: self.account_number(i),
                account_name: format!("Account {}", i),
            });

            if i % PROGRESS_EVERY == 0 {
                info!("Generated {} accounts...", i);
            }
        }

        self.summary.account_count = accounts.len();
        accounts
    }

    /// One principal link per customer plus random extras.
    ///
    /// An extra account that lands on the customer's own ordinal is dropped, not
    /// redrawn, and a dropped second link also skips the third roll.
    pub fn generate_links(&mut self) -> Vec<CustomerAccountLink> {
        let n = self.config.num_customers;
        let mut links = Vec::with_capacity(n * 2);

        info!("Generating customer-account links...");
        for customer in 1..=n {
            let customer_number = self.customer_number(customer);
            links.push(CustomerAccountLink::new(
                customer_number.clone(),
                self.account_number(customer),
            ));

            if self.rng.random::<f32>() < self.config.multi_account_chance {
                let extra = self.rng.random_range(1..=n);
                if extra != customer {
                    links.push(CustomerAccountLink::new(
                        customer_number.clone(),
                        self.account_number(extra),
                    ));

                    if self.rng.random::<f32>() < self.config.third_account_chance {
                        let third = self.rng.random_range(1..=n);
                        if third != customer {
                            links.push(CustomerAccountLink::new(
                                customer_number.clone(),
                                self.account_number(third),
                            ));
                        }
                    }
                }
            }

            if customer % PROGRESS_EVERY == 0 {
                info!("Generated links for {} customers...", customer);
            }
        }

        info!("Generated {} total links", links.len());
        self.summary.link_count = links.len();
        links
    }

    fn person_name(&mut self) -> String {
        let first = FIRST_NAMES[self.rng.random_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[self.rng.random_range(0..LAST_NAMES.len())];
        format!("{} {}", first, last)
    }

    fn customer_number(&self, ordinal: usize) -> String {
        format!("{}{:06}", self.config.customer_prefix, ordinal)
    }

    fn account_number(&self, ordinal: usize) -> String {
        format!("{}{:06}", self.config.account_prefix, ordinal)
    }
}
