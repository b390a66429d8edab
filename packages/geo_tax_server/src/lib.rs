#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web gateway for the order import pipeline.
//!
//! Wires the core library crates (`geo_tax_resolver`, `geo_tax_rates`,
//! `geo_tax_cache`, `geo_tax_orders`) to Postgres
//! (`geo_tax_database`) and an S3-compatible object store
//! (`geo_tax_storage`), and exposes:
//!
//! - `POST /api/orders/import` -- submit a CSV file for import.
//! - `GET /api/orders` / `GET /api/orders/stats` -- list/stats endpoints
//!   over already-authorized parameters (authorization itself is out of
//!   scope for this gateway, per spec §6).
//! - `GET /ws/progress` -- the Progress Channel: a push-only websocket
//!   streaming `{"tasks": [...]}` snapshots.
//! - `GET /ws/tax-preview` -- the Tax Preview websocket: request/response
//!   tax computation without persisting an order.
//!
//! Session/authorization and object-storage bucket provisioning are
//! external collaborators per spec §6 and are not implemented here; the
//! gateway accepts an already-resolved `user_id`.

mod handlers;
mod task_store;

use std::sync::Arc;

use geo_tax_cache::{MemoryCacheStore, TaxRateCache};
use geo_tax_database::queries;
use geo_tax_models::RegionType;
use geo_tax_orders::{ExecutorServices, process_import_task};
use geo_tax_rates::TaxRateCatalog;
use geo_tax_resolver::ReportingCodeResolver;
use geo_tax_storage::ObjectStore;
use switchy_database::Database;

pub use task_store::DatabaseTaskStore;

/// `EPSG:4326` (WGS84 lon/lat), the CRS coordinates arrive in.
const SOURCE_CRS: &str = "EPSG:4326";
/// `EPSG:26918` (UTM zone 18N), the resolver's projected working CRS.
const TARGET_CRS: &str = "EPSG:26918";

/// Collaborators shared by every request handler and background worker.
pub struct AppState {
    /// Primary relational store.
    pub db: Arc<dyn Database>,
    /// Object store holding uploaded CSV files.
    pub storage: Arc<ObjectStore>,
    /// The Reporting-Code Resolver, immutable after bootstrap.
    pub resolver: Arc<ReportingCodeResolver>,
    /// The Tax-Rate Catalog, immutable after bootstrap.
    pub catalog: Arc<TaxRateCatalog>,
    /// The write-through Tax-Rate Cache.
    ///
    /// Runs against the in-process [`MemoryCacheStore`] fallback: no
    /// external distributed-cache crate is introduced, since none
    /// appears in the source dependency stack (see DESIGN.md). The
    /// cache's advisory contract (spec §4.2) holds either way.
    pub cache: Arc<TaxRateCache<MemoryCacheStore>>,
}

impl AppState {
    /// Borrows the collaborators the Import Executor needs, bound to
    /// `self`'s lifetime.
    #[must_use]
    pub fn executor_services(&self) -> ExecutorServices<'_, MemoryCacheStore> {
        ExecutorServices {
            resolver: &self.resolver,
            cache: &self.cache,
            catalog: &self.catalog,
        }
    }
}

/// Seeds `tax_regions`/`tax_rates` from static files if, and only if,
/// both tables are empty (spec §6, "Bootstrap"; SPEC_FULL §11,
/// "Bootstrap seeding order").
///
/// # Errors
///
/// Returns an error if seeding fails; seed files that are simply absent
/// are logged and skipped rather than treated as fatal, since a
/// from-scratch deployment may seed the catalog by another path (the
/// CLI, or a direct database load) before the server is ever started.
pub async fn bootstrap_catalog_if_empty(
    db: &dyn Database,
) -> Result<(), geo_tax_database::DbError> {
    if !queries::catalog_tables_are_empty(db).await? {
        log::info!("tax_regions/tax_rates already populated; skipping bootstrap seed");
        return Ok(());
    }

    let rates_path = std::env::var("TAX_RATES_SEED_PATH")
        .unwrap_or_else(|_| "static/ny_tax_rates.json".to_string());
    match std::fs::read_to_string(&rates_path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => {
                queries::seed_tax_rates(db, &value).await?;
                log::info!("seeded tax_rates from {rates_path}");
            }
            Err(err) => log::warn!("failed to parse tax rate seed {rates_path}: {err}"),
        },
        Err(err) => log::warn!("no tax rate seed file at {rates_path}: {err}"),
    }

    let regions_dir = std::env::var("TAX_REGIONS_SEED_PATH").unwrap_or_else(|_| "static/regions".to_string());
    for (file_name, region_type) in [("cities.geojson", RegionType::City), ("counties.geojson", RegionType::County)] {
        let path = std::path::Path::new(&regions_dir).join(file_name);
        match geo_tax_resolver::bootstrap::load_region_polygons(&path, region_type) {
            Ok(polygons) => {
                queries::seed_tax_regions(db, region_type, &polygons).await?;
                log::info!("seeded {} {region_type:?} tax_regions from {}", polygons.len(), path.display());
            }
            Err(err) => log::warn!("no region seed at {}: {err}", path.display()),
        }
    }

    Ok(())
}

/// Loads the resolver's polygon dataset and the rate catalog from the
/// database, ready to build the immutable [`ReportingCodeResolver`]/
/// [`TaxRateCatalog`] singletons.
///
/// # Errors
///
/// Returns an error if either the database reads or resolver/catalog
/// construction fail.
pub async fn load_resolver_and_catalog(
    db: &dyn Database,
) -> Result<(ReportingCodeResolver, TaxRateCatalog), Box<dyn std::error::Error>> {
    let cities = queries::load_tax_regions(db, RegionType::City).await?;
    let counties = queries::load_tax_regions(db, RegionType::County).await?;
    let resolver = ReportingCodeResolver::new(&cities, &counties, SOURCE_CRS, TARGET_CRS)?;

    let rates_json = queries::load_tax_rates_json(db).await?;
    let catalog = TaxRateCatalog::from_json(&rates_json)?;

    Ok((resolver, catalog))
}

/// Spawns a worker per task still in `in_progress` at process start
/// (spec §4.5, "`resume_on_startup`").
///
/// # Errors
///
/// Returns an error if the set of in-progress tasks cannot be read;
/// individual worker failures are logged by
/// [`process_import_task`] and never propagate here.
pub async fn resume_in_progress_import_tasks(
    state: Arc<AppState>,
) -> Result<usize, geo_tax_database::DbError> {
    let task_ids = queries::get_in_progress_task_ids(state.db.as_ref()).await?;
    let count = task_ids.len();

    for task_id in task_ids {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let store = DatabaseTaskStore::new(Arc::clone(&state.db), Arc::clone(&state.storage));
            let services = state.executor_services();
            if let Err(err) = process_import_task(task_id, &store, &services).await {
                log::error!("resumed import task {task_id} finished with error: {err}");
            }
        });
    }

    Ok(count)
}

/// Starts the order-import gateway.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection, migrations, object store client,
/// or bootstrap load fail -- these are all required for the server to
/// serve any request correctly, so failing fast at startup is
/// preferable to serving from a half-initialized state.
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db: Arc<dyn Database> = Arc::from(
        geo_tax_database::db::connect_from_env()
            .await
            .expect("Failed to connect to database"),
    );

    log::info!("Running migrations...");
    geo_tax_database::run_migrations(db.as_ref())
        .await
        .expect("Failed to run migrations");

    log::info!("Bootstrapping tax catalog...");
    bootstrap_catalog_if_empty(db.as_ref())
        .await
        .expect("Failed to bootstrap tax catalog");

    log::info!("Loading resolver and rate catalog...");
    let (resolver, catalog) = load_resolver_and_catalog(db.as_ref())
        .await
        .expect("Failed to load resolver and catalog");

    let storage = Arc::new(ObjectStore::from_env().expect("Failed to configure object store"));
    let cache = Arc::new(TaxRateCache::new(MemoryCacheStore::default()));

    let state = Arc::new(AppState {
        db,
        storage,
        resolver: Arc::new(resolver),
        catalog: Arc::new(catalog),
        cache,
    });

    log::info!("Resuming in-progress import tasks...");
    match resume_in_progress_import_tasks(Arc::clone(&state)).await {
        Ok(count) => log::info!("resumed {count} in-progress import tasks"),
        Err(err) => log::error!("failed to resume in-progress import tasks: {err}"),
    }

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    let app_data = actix_web::web::Data::new(state);

    actix_web::HttpServer::new(move || {
        let cors = actix_cors::Cors::permissive();

        actix_web::App::new()
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_data.clone())
            .service(
                actix_web::web::scope("/api")
                    .route("/health", actix_web::web::get().to(handlers::health))
                    .route(
                        "/orders/import",
                        actix_web::web::post().to(handlers::submit_import),
                    )
                    .route("/orders", actix_web::web::get().to(handlers::list_orders))
                    .route(
                        "/orders/stats",
                        actix_web::web::get().to(handlers::order_stats),
                    )
                    .route("/tasks", actix_web::web::get().to(handlers::list_tasks)),
            )
            .route("/ws/progress", actix_web::web::get().to(handlers::progress_ws))
            .route(
                "/ws/tax-preview",
                actix_web::web::get().to(handlers::tax_preview_ws),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
