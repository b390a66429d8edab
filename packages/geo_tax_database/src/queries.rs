//! Database query functions for the order import pipeline.
//!
//! Non-spatial queries use the typed `switchy_database` query builder
//! where practical and `query_raw_params`/`exec_raw_params` for
//! everything dynamic, following the same idiom as the query layer this
//! crate was generalized from.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime, Utc};
use geo_tax_models::RegionType;
use geo_tax_models::order::OrderComputedPayload;
use geo_tax_models::polygon::{Bbox, RegionPolygon};
use geo_tax_models::tax::JurisdictionsPayload;
use geo_tax_models::task::{FileTask, TaskStatus};
use geo_tax_orders::TaskCounters;
use moosicbox_json_utils::database::ToValue as _;
use rust_decimal::Decimal;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

fn parse_task_status(raw: &str) -> TaskStatus {
    if raw == TaskStatus::Completed.as_str() {
        TaskStatus::Completed
    } else {
        TaskStatus::InProgress
    }
}

fn row_to_file_task(row: &switchy_database::Row) -> Result<FileTask, DbError> {
    let status_raw: String = row.to_value("status").map_err(|e| DbError::Conversion {
        message: format!("failed to parse task status: {e}"),
    })?;
    let created_at_naive: NaiveDateTime =
        row.to_value("created_at").map_err(|e| DbError::Conversion {
            message: format!("failed to parse created_at: {e}"),
        })?;
    let updated_at_naive: NaiveDateTime =
        row.to_value("updated_at").map_err(|e| DbError::Conversion {
            message: format!("failed to parse updated_at: {e}"),
        })?;

    Ok(FileTask {
        id: row.to_value("id").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        user_id: row.to_value("user_id").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        file_path: row.to_value("file_path").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        total_rows: row.to_value("total_rows").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        successful_rows: row
            .to_value("successful_rows")
            .map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?,
        failed_rows: row.to_value("failed_rows").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        status: parse_task_status(&status_raw),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_at_naive, Utc),
        updated_at: DateTime::<Utc>::from_naive_utc_and_offset(updated_at_naive, Utc),
    })
}

/// Ensures a user row exists, returning its id. Matches the simplest
/// possible user model; authentication itself is out of scope for this
/// pipeline.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_user(db: &dyn Database, username: &str) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO users (username) VALUES ($1)
             ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
             RETURNING id",
            &[DatabaseValue::String(username.to_string())],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "failed to get user id from upsert".to_string(),
    })?;

    row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("failed to parse user id: {e}"),
    })
}

/// Creates a new `in_progress` file task and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_file_task(
    db: &dyn Database,
    user_id: i64,
    file_path: &str,
    total_rows: i64,
) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO file_tasks (user_id, file_path, total_rows, status)
             VALUES ($1, $2, $3, 'in_progress')
             RETURNING id",
            &[
                DatabaseValue::Int64(user_id),
                DatabaseValue::String(file_path.to_string()),
                DatabaseValue::Int64(total_rows),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "failed to get file task id from insert".to_string(),
    })?;

    row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("failed to parse file task id: {e}"),
    })
}

/// Loads a task's resumable counters, or `None` if it no longer exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn load_task_counters(
    db: &dyn Database,
    task_id: i64,
) -> Result<Option<TaskCounters>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT total_rows, successful_rows, failed_rows
             FROM file_tasks WHERE id = $1",
            &[DatabaseValue::Int64(task_id)],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    Ok(Some(TaskCounters {
        total_rows: row.to_value("total_rows").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        successful_rows: row
            .to_value("successful_rows")
            .map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?,
        failed_rows: row.to_value("failed_rows").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
    }))
}

/// Writes `successful_rows`/`failed_rows`/`status`/`updated_at` for one
/// task. Matches `_update_file_task_progress`'s targeted column update.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_file_task_progress(
    db: &dyn Database,
    task_id: i64,
    successful_rows: i64,
    failed_rows: i64,
    status: TaskStatus,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE file_tasks
         SET successful_rows = $2, failed_rows = $3, status = $4, updated_at = NOW()
         WHERE id = $1",
        &[
            DatabaseValue::Int64(task_id),
            DatabaseValue::Int64(successful_rows),
            DatabaseValue::Int64(failed_rows),
            DatabaseValue::String(status.as_str().to_string()),
        ],
    )
    .await?;

    Ok(())
}

/// Loads a task's stored object-store `file_path`, or `None` if it no
/// longer exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn load_task_file_path(
    db: &dyn Database,
    task_id: i64,
) -> Result<Option<String>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT file_path FROM file_tasks WHERE id = $1",
            &[DatabaseValue::Int64(task_id)],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    Ok(Some(row.to_value("file_path").map_err(|e| {
        DbError::Conversion {
            message: e.to_string(),
        }
    })?))
}

/// Loads the user id that submitted a task, or `None` if it no longer
/// exists. Used so bulk order inserts can attach `author_user_id`
/// without threading it through every executor call, matching the
/// source's `Order(user_id=task.user_id, **computed)`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn load_task_user_id(db: &dyn Database, task_id: i64) -> Result<Option<i64>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT user_id FROM file_tasks WHERE id = $1",
            &[DatabaseValue::Int64(task_id)],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    Ok(Some(row.to_value("user_id").map_err(|e| {
        DbError::Conversion {
            message: e.to_string(),
        }
    })?))
}

/// Returns every task id in `in_progress` state, for
/// `resume_in_progress_import_tasks`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_in_progress_task_ids(db: &dyn Database) -> Result<Vec<i64>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id FROM file_tasks WHERE status = 'in_progress'",
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| {
            row.to_value("id").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })
        })
        .collect()
}

/// Returns every file task, newest first, for the Progress Channel
/// snapshot.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_all_file_tasks(db: &dyn Database) -> Result<Vec<FileTask>, DbError> {
    let rows = db
        .query_raw_params("SELECT * FROM file_tasks ORDER BY id DESC", &[])
        .await?;

    rows.iter().map(row_to_file_task).collect()
}

/// Inserts a batch of computed orders for one author, returning the
/// number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails.
pub async fn insert_orders(
    db: &dyn Database,
    author_user_id: Option<i64>,
    orders: &[OrderComputedPayload],
) -> Result<usize, DbError> {
    let mut inserted = 0usize;

    for order in orders {
        db.exec_raw_params(
            "INSERT INTO orders (
                author_user_id, latitude, longitude, order_timestamp, subtotal,
                reporting_code, jurisdictions, composite_tax_rate,
                state_rate, county_rate, city_rate, special_rates,
                tax_amount, total_amount
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            &[
                author_user_id.map_or(DatabaseValue::Null, DatabaseValue::Int64),
                DatabaseValue::Real64(order.latitude),
                DatabaseValue::Real64(order.longitude),
                DatabaseValue::DateTime(order.timestamp.naive_utc()),
                DatabaseValue::String(order.subtotal.to_string()),
                DatabaseValue::String(order.reporting_code.clone()),
                DatabaseValue::String(
                    serde_json::to_string(&order.jurisdictions).map_err(|e| DbError::Conversion {
                        message: format!("failed to serialize jurisdictions: {e}"),
                    })?,
                ),
                DatabaseValue::String(order.composite_tax_rate.to_string()),
                DatabaseValue::String(order.state_rate.to_string()),
                DatabaseValue::String(order.county_rate.to_string()),
                DatabaseValue::String(order.city_rate.to_string()),
                DatabaseValue::String(order.special_rates.to_string()),
                DatabaseValue::String(order.tax_amount.to_string()),
                DatabaseValue::String(order.total_amount.to_string()),
            ],
        )
        .await?;
        inserted += 1;
    }

    Ok(inserted)
}

/// Sort modes `list_orders` accepts, matching `ORDERS_SORT_MAPPING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdersSort {
    /// Newest order first (default).
    NewestFirst,
    /// Oldest order first.
    OldestFirst,
    /// Highest total amount first.
    TotalDesc,
    /// Lowest total amount first.
    TotalAsc,
    /// Highest tax amount first.
    TaxDesc,
    /// Lowest tax amount first.
    TaxAsc,
}

impl OrdersSort {
    const fn sql_order_by(self) -> &'static str {
        match self {
            Self::NewestFirst => "order_timestamp DESC, id DESC",
            Self::OldestFirst => "order_timestamp ASC, id ASC",
            Self::TotalDesc => "total_amount DESC",
            Self::TotalAsc => "total_amount ASC",
            Self::TaxDesc => "tax_amount DESC",
            Self::TaxAsc => "tax_amount ASC",
        }
    }
}

/// Filters for [`list_orders`].
#[derive(Debug, Clone, Default)]
pub struct OrdersQuery {
    /// Only orders resolved to this reporting code.
    pub reporting_code: Option<String>,
    /// Only orders on/after this timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Only orders on/before this timestamp.
    pub to: Option<DateTime<Utc>>,
    /// Only orders authored by this user.
    pub author_user_id: Option<i64>,
    /// Sort order; defaults to [`OrdersSort::NewestFirst`].
    pub sort: Option<OrdersSort>,
    /// Maximum rows to return.
    pub limit: i64,
    /// Rows to skip before collecting `limit`.
    pub offset: i64,
}

/// A queried order row, minimal enough for the listing endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OrderListRow {
    /// Database-assigned identifier.
    pub id: i64,
    /// Latitude the order resolved from.
    pub latitude: f64,
    /// Longitude the order resolved from.
    pub longitude: f64,
    /// Order timestamp.
    pub order_timestamp: DateTime<Utc>,
    /// Rounded subtotal.
    pub subtotal: Decimal,
    /// Normalized reporting code.
    pub reporting_code: String,
    /// Composite tax rate applied.
    pub composite_tax_rate: Decimal,
    /// Rounded tax amount.
    pub tax_amount: Decimal,
    /// Rounded total amount.
    pub total_amount: Decimal,
}

/// Lists orders matching `query`'s filters, paginated and sorted.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_orders(
    db: &dyn Database,
    query: &OrdersQuery,
) -> Result<Vec<OrderListRow>, DbError> {
    let mut sql = String::from(
        "SELECT id, latitude, longitude, order_timestamp, subtotal, reporting_code,
                composite_tax_rate, tax_amount, total_amount
         FROM orders WHERE 1=1",
    );
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(code) = &query.reporting_code {
        write!(sql, " AND reporting_code = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(code.clone()));
        param_idx += 1;
    }
    if let Some(from) = &query.from {
        write!(sql, " AND order_timestamp >= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(from.naive_utc()));
        param_idx += 1;
    }
    if let Some(to) = &query.to {
        write!(sql, " AND order_timestamp <= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(to.naive_utc()));
        param_idx += 1;
    }
    if let Some(author_user_id) = query.author_user_id {
        write!(sql, " AND author_user_id = ${param_idx}").unwrap();
        params.push(DatabaseValue::Int64(author_user_id));
        param_idx += 1;
    }

    write!(
        sql,
        " ORDER BY {}",
        query.sort.unwrap_or(OrdersSort::NewestFirst).sql_order_by()
    )
    .unwrap();

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(query.limit));
    param_idx += 1;

    write!(sql, " OFFSET ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(query.offset));

    let rows = db.query_raw_params(&sql, &params).await?;

    rows.iter()
        .map(|row| {
            let order_timestamp_naive: NaiveDateTime =
                row.to_value("order_timestamp").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?;
            let subtotal_raw: String = row.to_value("subtotal").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
            let composite_raw: String =
                row.to_value("composite_tax_rate").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?;
            let tax_raw: String = row.to_value("tax_amount").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
            let total_raw: String = row.to_value("total_amount").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;

            Ok(OrderListRow {
                id: row.to_value("id").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?,
                latitude: row.to_value("latitude").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?,
                longitude: row.to_value("longitude").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?,
                order_timestamp: DateTime::<Utc>::from_naive_utc_and_offset(
                    order_timestamp_naive,
                    Utc,
                ),
                subtotal: subtotal_raw.parse().unwrap_or_default(),
                reporting_code: row.to_value("reporting_code").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?,
                composite_tax_rate: composite_raw.parse().unwrap_or_default(),
                tax_amount: tax_raw.parse().unwrap_or_default(),
                total_amount: total_raw.parse().unwrap_or_default(),
            })
        })
        .collect()
}

/// Aggregate stats for orders in `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrdersStats {
    /// Number of matching orders.
    pub order_count: i64,
    /// Sum of `subtotal`.
    pub subtotal_sum: Decimal,
    /// Sum of `tax_amount`.
    pub tax_amount_sum: Decimal,
    /// Sum of `total_amount`.
    pub total_amount_sum: Decimal,
}

/// Computes order count and money sums over `[from, to]`, rounded to 2
/// decimals with `ROUND_HALF_UP`, matching `orders_stats`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn orders_stats(
    db: &dyn Database,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<OrdersStats, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) as order_count,
                    COALESCE(SUM(subtotal), 0) as subtotal_sum,
                    COALESCE(SUM(tax_amount), 0) as tax_amount_sum,
                    COALESCE(SUM(total_amount), 0) as total_amount_sum
             FROM orders WHERE order_timestamp >= $1 AND order_timestamp <= $2",
            &[
                DatabaseValue::DateTime(from.naive_utc()),
                DatabaseValue::DateTime(to.naive_utc()),
            ],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(OrdersStats::default());
    };

    let parse_sum = |column: &str| -> Result<Decimal, DbError> {
        let raw: String = row.to_value(column).map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?;
        Ok(raw
            .parse::<Decimal>()
            .unwrap_or_default()
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero))
    };

    Ok(OrdersStats {
        order_count: row.to_value("order_count").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?,
        subtotal_sum: parse_sum("subtotal_sum")?,
        tax_amount_sum: parse_sum("tax_amount_sum")?,
        total_amount_sum: parse_sum("total_amount_sum")?,
    })
}

/// Returns `true` if both `tax_regions` and `tax_rates` are empty,
/// gating whether the bootstrap seed should run.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn catalog_tables_are_empty(db: &dyn Database) -> Result<bool, DbError> {
    let regions = db
        .query_raw_params("SELECT 1 FROM tax_regions LIMIT 1", &[])
        .await?;
    let rates = db
        .query_raw_params("SELECT 1 FROM tax_rates LIMIT 1", &[])
        .await?;
    Ok(regions.is_empty() && rates.is_empty())
}

/// Inserts the raw tax-rate catalog JSON payload, keyed by reporting
/// code.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn seed_tax_rates(db: &dyn Database, raw: &serde_json::Value) -> Result<(), DbError> {
    let Some(root) = raw.as_object() else {
        return Err(DbError::Conversion {
            message: "tax rate seed payload must be a JSON object".to_string(),
        });
    };

    for (code, payload) in root {
        db.exec_raw_params(
            "INSERT INTO tax_rates (reporting_code, jurisdictions) VALUES ($1, $2)
             ON CONFLICT (reporting_code) DO UPDATE SET jurisdictions = EXCLUDED.jurisdictions",
            &[
                DatabaseValue::String(code.clone()),
                DatabaseValue::String(payload.to_string()),
            ],
        )
        .await?;
    }

    Ok(())
}

/// Inserts one region polygon tier's worth of rows, preserving
/// insertion order for the resolver's first-match-wins tie-break.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn seed_tax_regions(
    db: &dyn Database,
    region_type: RegionType,
    polygons: &[RegionPolygon],
) -> Result<(), DbError> {
    let type_str = match region_type {
        RegionType::City => "city",
        RegionType::County => "county",
    };

    for (order, polygon) in polygons.iter().enumerate() {
        db.exec_raw_params(
            "INSERT INTO tax_regions (
                region_type, reporting_code, min_x, min_y, max_x, max_y,
                points, part_starts, insertion_order
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                DatabaseValue::String(type_str.to_string()),
                DatabaseValue::String(polygon.reporting_code.clone()),
                DatabaseValue::Real64(polygon.bbox.min_x),
                DatabaseValue::Real64(polygon.bbox.min_y),
                DatabaseValue::Real64(polygon.bbox.max_x),
                DatabaseValue::Real64(polygon.bbox.max_y),
                DatabaseValue::String(serde_json::to_string(&polygon.points).map_err(|e| {
                    DbError::Conversion {
                        message: e.to_string(),
                    }
                })?),
                DatabaseValue::String(serde_json::to_string(&polygon.part_starts).map_err(
                    |e| DbError::Conversion {
                        message: e.to_string(),
                    },
                )?),
                DatabaseValue::Int64(i64::try_from(order).unwrap_or(i64::MAX)),
            ],
        )
        .await?;
    }

    Ok(())
}

/// Loads every region polygon of one tier, in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or a row's
/// `points`/`part_starts` JSON fails to deserialize.
pub async fn load_tax_regions(
    db: &dyn Database,
    region_type: RegionType,
) -> Result<Vec<RegionPolygon>, DbError> {
    let type_str = match region_type {
        RegionType::City => "city",
        RegionType::County => "county",
    };

    let rows = db
        .query_raw_params(
            "SELECT reporting_code, min_x, min_y, max_x, max_y, points, part_starts
             FROM tax_regions WHERE region_type = $1 ORDER BY insertion_order ASC",
            &[DatabaseValue::String(type_str.to_string())],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let points_json: String = row.to_value("points").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
            let part_starts_json: String =
                row.to_value("part_starts").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?;

            Ok(RegionPolygon {
                region_type,
                reporting_code: row.to_value("reporting_code").map_err(|e| DbError::Conversion {
                    message: e.to_string(),
                })?,
                bbox: Bbox {
                    min_x: row.to_value("min_x").map_err(|e| DbError::Conversion {
                        message: e.to_string(),
                    })?,
                    min_y: row.to_value("min_y").map_err(|e| DbError::Conversion {
                        message: e.to_string(),
                    })?,
                    max_x: row.to_value("max_x").map_err(|e| DbError::Conversion {
                        message: e.to_string(),
                    })?,
                    max_y: row.to_value("max_y").map_err(|e| DbError::Conversion {
                        message: e.to_string(),
                    })?,
                },
                points: serde_json::from_str(&points_json).map_err(|e| DbError::Conversion {
                    message: format!("failed to parse points json: {e}"),
                })?,
                part_starts: serde_json::from_str(&part_starts_json).map_err(|e| {
                    DbError::Conversion {
                        message: format!("failed to parse part_starts json: {e}"),
                    }
                })?,
            })
        })
        .collect()
}

/// Loads the full raw tax-rate catalog JSON payload, keyed by reporting
/// code, suitable for [`geo_tax_rates::TaxRateCatalog::from_json`].
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn load_tax_rates_json(db: &dyn Database) -> Result<serde_json::Value, DbError> {
    let rows = db
        .query_raw_params("SELECT reporting_code, jurisdictions FROM tax_rates", &[])
        .await?;

    let mut root = serde_json::Map::with_capacity(rows.len());
    for row in &rows {
        let code: String = row.to_value("reporting_code").map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?;
        let jurisdictions_json: String =
            row.to_value("jurisdictions").map_err(|e| DbError::Conversion {
                message: e.to_string(),
            })?;
        let payload: serde_json::Value =
            serde_json::from_str(&jurisdictions_json).map_err(|e| DbError::Conversion {
                message: format!("failed to parse jurisdictions json for {code}: {e}"),
            })?;
        root.insert(code, payload);
    }

    Ok(serde_json::Value::Object(root))
}
