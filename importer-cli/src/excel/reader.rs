//! Read import records from an Excel workbook

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use log::debug;

use super::{customer_cols, pair_cols, sheets};
use crate::models::{Account, Customer, CustomerAccountLink, ImportData, non_empty};

type Workbook = Xlsx<std::io::BufReader<std::fs::File>>;

/// Read all three sheets of an import workbook
pub fn read_import_workbook(path: &Path) -> Result<ImportData> {
    let mut workbook = open(path)?;

    let customers = read_customers(&mut workbook).context("Failed to read customers")?;
    let accounts = read_accounts(&mut workbook).context("Failed to read accounts")?;
    let links = read_links(&mut workbook).context("Failed to read customer-account links")?;

    Ok(ImportData {
        customers,
        accounts,
        links,
    })
}

fn open(path: &Path) -> Result<Workbook> {
    open_workbook(path).with_context(|| format!("Failed to open Excel file: {}", path.display()))
}

fn sheet(workbook: &mut Workbook, name: &str) -> Result<Range<Data>> {
    workbook
        .worksheet_range(name)
        .with_context(|| format!("Failed to read sheet: {}", name))
}

/// Customers sheet; rows without a customer number or name are dropped
fn read_customers(workbook: &mut Workbook) -> Result<Vec<Customer>> {
    let range = sheet(workbook, sheets::CUSTOMERS)?;

    let customers: Vec<Customer> = data_rows(&range, customer_cols::COUNT)
        .filter_map(|mut row| {
            let mut take = |col: u16| row[col as usize].take();
            let customer_number = take(customer_cols::CUSTOMER_NUMBER)?;
            let customer_name = take(customer_cols::CUSTOMER_NAME)?;
            Some(Customer {
                client_id: take(customer_cols::CLIENT_ID),
                customer_number,
                customer_name,
                address: take(customer_cols::ADDRESS),
                name: take(customer_cols::NAME),
                email: take(customer_cols::EMAIL),
            })
        })
        .collect();

    debug!("Parsed {} customer rows", customers.len());
    Ok(customers)
}

/// Account sheet; rows missing either column are dropped
fn read_accounts(workbook: &mut Workbook) -> Result<Vec<Account>> {
    let range = sheet(workbook, sheets::ACCOUNTS)?;

    Ok(read_pairs(&range)
        .map(|(account_number, account_name)| Account {
            account_number,
            account_name,
        })
        .collect())
}

/// Link sheet; rows missing either key are dropped
fn read_links(workbook: &mut Workbook) -> Result<Vec<CustomerAccountLink>> {
    let range = sheet(workbook, sheets::LINKS)?;

    Ok(read_pairs(&range)
        .map(|(customer_number, account_number)| CustomerAccountLink {
            customer_number,
            account_number,
        })
        .collect())
}

fn read_pairs(range: &Range<Data>) -> impl Iterator<Item = (String, String)> + '_ {
    data_rows(range, pair_cols::COUNT).filter_map(|mut row| {
        let first = row[pair_cols::FIRST as usize].take()?;
        let second = row[pair_cols::SECOND as usize].take()?;
        Some((first, second))
    })
}

/// Cells of every row below the header, addressed from column A
fn data_rows(range: &Range<Data>, width: usize) -> impl Iterator<Item = Vec<Option<String>>> + '_ {
    let last_row = range.end().map(|(row, _)| row).unwrap_or(0);

    (1..=last_row).map(move |row| {
        (0..width as u32)
            .map(|col| range.get_value((row, col)).and_then(cell_string))
            .collect()
    })
}

fn cell_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => non_empty(s.trim()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Some((*f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        // Date-formatted cells keep their Excel serial value
        Data::DateTime(dt) => Some(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => non_empty(s.clone()),
        _ => None,
    }
}
