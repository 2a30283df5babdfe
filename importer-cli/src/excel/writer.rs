//! Write import records to an Excel workbook

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use super::{customer_cols, pair_cols, sheets};
use crate::models::{Account, Customer, CustomerAccountLink, ImportData};

/// Write customers, accounts and links into a new workbook at `path`
pub fn write_import_workbook(data: &ImportData, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();

    write_customers(workbook.add_worksheet(), &data.customers)?;
    write_accounts(workbook.add_worksheet(), &data.accounts)?;
    write_links(workbook.add_worksheet(), &data.links)?;

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;

    Ok(())
}

fn write_customers(ws: &mut Worksheet, customers: &[Customer]) -> Result<()> {
    ws.set_name(sheets::CUSTOMERS)?;
    ws.write_string(0, customer_cols::CLIENT_ID, "Client ID")?;
    ws.write_string(0, customer_cols::CUSTOMER_NUMBER, "Customer Number")?;
    ws.write_string(0, customer_cols::CUSTOMER_NAME, "Customer Name")?;
    ws.write_string(0, customer_cols::ADDRESS, "Address")?;
    ws.write_string(0, customer_cols::NAME, "Name")?;
    ws.write_string(0, customer_cols::EMAIL, "Email")?;

    for (idx, customer) in customers.iter().enumerate() {
        let row = (idx + 1) as u32;
        write_optional(ws, row, customer_cols::CLIENT_ID, &customer.client_id)?;
        ws.write_string(row, customer_cols::CUSTOMER_NUMBER, &customer.customer_number)?;
        ws.write_string(row, customer_cols::CUSTOMER_NAME, &customer.customer_name)?;
        write_optional(ws, row, customer_cols::ADDRESS, &customer.address)?;
        write_optional(ws, row, customer_cols::NAME, &customer.name)?;
        write_optional(ws, row, customer_cols::EMAIL, &customer.email)?;
    }

    Ok(())
}

fn write_accounts(ws: &mut Worksheet, accounts: &[Account]) -> Result<()> {
    ws.set_name(sheets::ACCOUNTS)?;
    ws.write_string(0, pair_cols::FIRST, "Account Number")?;
    ws.write_string(0, pair_cols::SECOND, "Account Name")?;

    for (idx, account) in accounts.iter().enumerate() {
        let row = (idx + 1) as u32;
        ws.write_string(row, pair_cols::FIRST, &account.account_number)?;
        ws.write_string(row, pair_cols::SECOND, &account.account_name)?;
    }

    Ok(())
}

fn write_links(ws: &mut Worksheet, links: &[CustomerAccountLink]) -> Result<()> {
    ws.set_name(sheets::LINKS)?;
    ws.write_string(0, pair_cols::FIRST, "Customer Number")?;
    ws.write_string(0, pair_cols::SECOND, "Account Number")?;

    for (idx, link) in links.iter().enumerate() {
        let row = (idx + 1) as u32;
        ws.write_string(row, pair_cols::FIRST, &link.customer_number)?;
        ws.write_string(row, pair_cols::SECOND, &link.account_number)?;
    }

    Ok(())
}

fn write_optional(ws: &mut Worksheet, row: u32, col: u16, value: &Option<String>) -> Result<()> {
    if let Some(value) = value {
        ws.write_string(row, col, value)?;
    }
    Ok(())
}
