//! Excel workbook import/export for customers, accounts and their links
//!
//! A workbook holds three sheets, each with a header row:
//!
//! | Sheet | Columns |
//! |---|---|
//! | `Customers` | Client ID, Customer Number, Customer Name, Address, Name, Email |
//! | `Account` | Account Number, Account Name |
//! | `customer account link` | Customer Number, Account Number |

mod reader;
mod writer;

pub use reader::read_import_workbook;
pub use writer::write_import_workbook;

/// Sheet names (must match between reader and writer)
pub mod sheets {
    pub const CUSTOMERS: &str = "Customers";
    pub const ACCOUNTS: &str = "Account";
    pub const LINKS: &str = "customer account link";
}

/// Column indices of the Customers sheet
mod customer_cols {
    pub const CLIENT_ID: u16 = 0;
    pub const CUSTOMER_NUMBER: u16 = 1;
    pub const CUSTOMER_NAME: u16 = 2;
    pub const ADDRESS: u16 = 3;
    pub const NAME: u16 = 4;
    pub const EMAIL: u16 = 5;
    pub const COUNT: usize = 6;
}

/// Column indices shared by the two-column sheets
mod pair_cols {
    pub const FIRST: u16 = 0;
    pub const SECOND: u16 = 1;
    pub const COUNT: usize = 2;
}
