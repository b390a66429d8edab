#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offline CLI for the order-import pipeline.
//!
//! Provides a unified entry point letting an operator seed the
//! tax-rate catalog from static files or import a CSV file directly,
//! without standing up the HTTP gateway.

use std::path::Path;
use std::sync::Arc;

use dialoguer::{Input, Select};
use geo_tax_cache::{MemoryCacheStore, TaxRateCache};
use geo_tax_server::{AppState, DatabaseTaskStore, bootstrap_catalog_if_empty, load_resolver_and_catalog};
use geo_tax_storage::ObjectStore;
use switchy_database::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("Order Import Toolchain");
    println!();

    let tools = &["Seed tax rate catalog", "Import a CSV file"];

    let selection = Select::new()
        .with_prompt("What would you like to do?")
        .items(tools)
        .default(0)
        .interact()?;

    match selection {
        0 => seed_catalog().await?,
        1 => import_csv_file().await?,
        _ => unreachable!(),
    }

    Ok(())
}

async fn connect_and_migrate() -> Result<Arc<dyn Database>, Box<dyn std::error::Error>> {
    let db: Arc<dyn Database> = Arc::from(geo_tax_database::db::connect_from_env().await?);
    geo_tax_database::run_migrations(db.as_ref()).await?;
    Ok(db)
}

async fn seed_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let db = connect_and_migrate().await?;
    bootstrap_catalog_if_empty(db.as_ref()).await?;
    println!("Tax rate catalog seeded (skipped if already populated).");
    Ok(())
}

async fn import_csv_file() -> Result<(), Box<dyn std::error::Error>> {
    let db = connect_and_migrate().await?;

    let (resolver, catalog) = load_resolver_and_catalog(db.as_ref()).await?;
    let storage = Arc::new(ObjectStore::from_env()?);
    let cache = Arc::new(TaxRateCache::new(MemoryCacheStore::default()));

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        storage: Arc::clone(&storage),
        resolver: Arc::new(resolver),
        catalog: Arc::new(catalog),
        cache,
    });

    let file_path: String = Input::new()
        .with_prompt("Path to the CSV file to import")
        .interact_text()?;
    let user_id: i64 = Input::new()
        .with_prompt("User id to attribute the import to")
        .interact_text()?;

    let content = tokio::fs::read(&file_path).await?;
    let total_rows = i64::try_from(geo_tax_orders::count_csv_rows(&content)).unwrap_or(i64::MAX);

    let object_name = Path::new(&file_path)
        .file_name()
        .map_or_else(|| file_path.clone(), |name| name.to_string_lossy().into_owned());
    let object_name = format!("imports/{user_id}/{object_name}");
    storage.upload_bytes(&object_name, content, "text/csv").await?;
    let stored_path = format!("{}/{object_name}", storage.bucket());

    let task_id =
        geo_tax_database::queries::insert_file_task(db.as_ref(), user_id, &stored_path, total_rows).await?;

    let task_store = DatabaseTaskStore::new(Arc::clone(&db), storage);
    let services = state.executor_services();
    geo_tax_orders::process_import_task(task_id, &task_store, &services).await?;

    println!("Import task {task_id} finished.");
    Ok(())
}
