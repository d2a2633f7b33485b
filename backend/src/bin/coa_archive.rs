//! Interactive archive query tool.
//!
//! Console counterpart of the archive surface: list, search, export,
//! delete, and consistency check against a local archive folder.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use coa_rust::config::CoaConfig;
use coa_rust::db::{Archive, RepositoryFactory, SearchCriteria};
use coa_rust::models::RecordKey;

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_criteria() -> Result<Option<SearchCriteria>> {
    println!("For each field, enter a value OR enter nothing to skip.");
    let flight_number = prompt("flight number: ")?;
    let date = prompt("flight date (YYYY-MM-DD): ")?;
    let device_id = prompt("device id: ")?;

    let mut criteria = SearchCriteria::default();
    if !flight_number.is_empty() {
        criteria.flight_number = Some(flight_number);
    }
    if !date.is_empty() {
        criteria.date = Some(
            NaiveDate::parse_from_str(&date, "%Y-%m-%d").context("invalid date, use YYYY-MM-DD")?,
        );
    }
    if !device_id.is_empty() {
        criteria.device_id = Some(device_id);
    }

    if criteria.is_empty() {
        println!("At least one field is required.");
        return Ok(None);
    }
    Ok(Some(criteria))
}

fn read_key() -> Result<Option<RecordKey>> {
    let flight_number = prompt("flight number: ")?;
    let date = prompt("flight date (YYYY-MM-DD): ")?;
    let device_id = prompt("device id: ")?;
    if flight_number.is_empty() || date.is_empty() || device_id.is_empty() {
        println!("All three fields are required.");
        return Ok(None);
    }
    let date =
        NaiveDate::parse_from_str(&date, "%Y-%m-%d").context("invalid date, use YYYY-MM-DD")?;
    Ok(Some(RecordKey::new(flight_number, date, device_id)))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            CoaConfig::from_default_location()
                .map(|c| c.archive.root)
                .unwrap_or_else(|_| PathBuf::from("data_archive"))
        });

    println!("=== Cosmic on Air archive tool ===");
    println!("Archive root: {}", root.display());

    let index = RepositoryFactory::create_sqlite(&root)?;
    let archive = Arc::new(Archive::open(&root, index)?);

    loop {
        println!();
        println!("Enter a number to select an option:");
        println!("1. List all entries in the archive.");
        println!("2. Search entries.");
        println!("3. Export matching entries.");
        println!("4. Delete an entry.");
        println!("5. Run a consistency check.");
        println!("q. Quit.");

        let choice = prompt("")?;
        match choice.as_str() {
            "q" => break,
            "1" => {
                let ids = archive.list_ids().await?;
                for id in &ids {
                    println!("{id}");
                }
                println!("{} entries in archive.", ids.len());
            }
            "2" => {
                let Some(criteria) = read_criteria()? else { continue };
                let entries = archive.search(&criteria).await?;
                for entry in &entries {
                    println!(
                        "{} | {} -> {} | takeoff {} | fit R² {}",
                        entry.data_id,
                        entry.origin_icao.as_deref().unwrap_or("???"),
                        entry.destination_icao.as_deref().unwrap_or("???"),
                        entry.takeoff_utc.format("%Y-%m-%d %H:%M:%S"),
                        entry
                            .fit_r2
                            .map(|r| format!("{r:.4}"))
                            .unwrap_or_else(|| "???".to_string()),
                    );
                }
                println!("{} matching entries.", entries.len());
            }
            "3" => {
                let Some(criteria) = read_criteria()? else { continue };
                let dest = prompt("Destination folder: ")?;
                if !PathBuf::from(&dest).is_dir() {
                    println!("Please provide an existing folder.");
                    continue;
                }
                let exported = archive.export(&criteria, PathBuf::from(dest).as_path()).await?;
                for path in &exported {
                    println!("exported {}", path.display());
                }
            }
            "4" => {
                let Some(key) = read_key()? else { continue };
                let confirm = prompt(&format!("Confirm delete {key}. Enter YES/n: "))?;
                if confirm != "YES" {
                    println!("Cancelled.");
                    continue;
                }
                match archive.delete(&key).await {
                    Ok(()) => println!("Deleted {key}."),
                    Err(e) => println!("{e}"),
                }
            }
            "5" => {
                let report = archive.consistency_check().await?;
                if report.is_consistent() {
                    println!("Index and object store agree.");
                } else {
                    for id in &report.missing_files {
                        println!("index row without files: {id}");
                    }
                    for id in &report.orphan_files {
                        println!("file without index row: {id}");
                    }
                }
            }
            _ => println!("Please enter a valid option."),
        }
    }

    if let Ok(archive) = Arc::try_unwrap(archive) {
        archive.close();
    }
    Ok(())
}
