//! HTTP and websocket route handlers.

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, Utc};
use geo_tax_database::queries::{self, OrdersQuery, OrdersSort};
use geo_tax_models::error::OrderError;
use geo_tax_models::order::OrderComputedPayload;
use geo_tax_orders::{compute_order_values, count_csv_rows};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AppState, DatabaseTaskStore};

/// `GET /api/health`.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct SubmitImportQuery {
    user_id: i64,
    filename: String,
}

/// `POST /api/orders/import`: uploads `body` as a CSV file, creates an
/// `in_progress` Task, and schedules a background worker. Returns
/// immediately with the Task row, matching the Import Executor's
/// `submit` contract (spec §4.5).
pub async fn submit_import(
    state: web::Data<Arc<AppState>>,
    query: web::Query<SubmitImportQuery>,
    body: web::Bytes,
) -> HttpResponse {
    let content = body.to_vec();
    let total_rows = i64::try_from(count_csv_rows(&content)).unwrap_or(i64::MAX);

    let object_name = format!("imports/{}/{}", query.user_id, query.filename);
    if let Err(err) = state
        .storage
        .upload_bytes(&object_name, content, "text/csv")
        .await
    {
        return HttpResponse::InternalServerError()
            .json(error_body("internal_error", &err.to_string(), None));
    }

    let file_path = format!("{}/{object_name}", state.storage.bucket());

    let task_id = match queries::insert_file_task(state.db.as_ref(), query.user_id, &file_path, total_rows).await
    {
        Ok(id) => id,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(error_body("internal_error", &err.to_string(), None));
        }
    };

    let worker_state = Arc::clone(&state);
    tokio::spawn(async move {
        let store = DatabaseTaskStore::new(Arc::clone(&worker_state.db), Arc::clone(&worker_state.storage));
        let services = worker_state.executor_services();
        if let Err(err) = geo_tax_orders::process_import_task(task_id, &store, &services).await {
            log::error!("import task {task_id} finished with error: {err}");
        }
    });

    HttpResponse::Ok().json(serde_json::json!({
        "id": task_id,
        "user_id": query.user_id,
        "file_path": file_path,
        "total_rows": total_rows,
        "successful_rows": 0,
        "failed_rows": 0,
        "status": "in_progress",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    reporting_code: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    author_user_id: Option<i64>,
    sort: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

const fn default_limit() -> i64 {
    100
}

fn parse_sort(raw: Option<&str>) -> OrdersSort {
    match raw {
        Some("oldest") => OrdersSort::OldestFirst,
        Some("total_desc") => OrdersSort::TotalDesc,
        Some("total_asc") => OrdersSort::TotalAsc,
        Some("tax_desc") => OrdersSort::TaxDesc,
        Some("tax_asc") => OrdersSort::TaxAsc,
        _ => OrdersSort::NewestFirst,
    }
}

/// `GET /api/orders`: lists orders matching the given filters. The
/// caller is assumed already authorized (spec §6, "Session /
/// authorization" is an external collaborator).
pub async fn list_orders(state: web::Data<Arc<AppState>>, query: web::Query<ListOrdersQuery>) -> HttpResponse {
    let orders_query = OrdersQuery {
        reporting_code: query.reporting_code.clone(),
        from: query.from,
        to: query.to,
        author_user_id: query.author_user_id,
        sort: Some(parse_sort(query.sort.as_deref())),
        limit: query.limit,
        offset: query.offset,
    };

    match queries::list_orders(state.db.as_ref(), &orders_query).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(err) => {
            HttpResponse::InternalServerError().json(error_body("internal_error", &err.to_string(), None))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderStatsQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

/// `GET /api/orders/stats`: order count and money sums over `[from, to]`.
pub async fn order_stats(state: web::Data<Arc<AppState>>, query: web::Query<OrderStatsQuery>) -> HttpResponse {
    match queries::orders_stats(state.db.as_ref(), query.from, query.to).await {
        Ok(stats) => HttpResponse::Ok().json(serde_json::json!({
            "order_count": stats.order_count,
            "subtotal_sum": stats.subtotal_sum.to_string(),
            "tax_amount_sum": stats.tax_amount_sum.to_string(),
            "total_amount_sum": stats.total_amount_sum.to_string(),
        })),
        Err(err) => {
            HttpResponse::InternalServerError().json(error_body("internal_error", &err.to_string(), None))
        }
    }
}

/// `GET /api/tasks`: a one-shot snapshot of every Task row, newest
/// first (the same shape the Progress Channel streams).
pub async fn list_tasks(state: web::Data<Arc<AppState>>) -> HttpResponse {
    match queries::list_all_file_tasks(state.db.as_ref()).await {
        Ok(tasks) => HttpResponse::Ok().json(geo_tax_models::task::ProgressFrame { tasks }),
        Err(err) => {
            HttpResponse::InternalServerError().json(error_body("internal_error", &err.to_string(), None))
        }
    }
}

/// Interval between Progress Channel frames (spec §4.6,
/// `IMPORT_TASKS_WS_INTERVAL`).
const PROGRESS_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(300);

/// `GET /ws/progress`: the Progress Channel. Push-only: loops reading
/// every Task row, sending a snapshot frame, then sleeping, until the
/// peer closes (spec §4.6).
pub async fn progress_ws(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let state = Arc::clone(&state);

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(actix_ws::Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        _ => {}
                    }
                }
                () = tokio::time::sleep(PROGRESS_TICK_INTERVAL) => {
                    let tasks = match queries::list_all_file_tasks(state.db.as_ref()).await {
                        Ok(tasks) => tasks,
                        Err(err) => {
                            log::error!("progress channel failed to read tasks: {err}");
                            continue;
                        }
                    };
                    let frame = geo_tax_models::task::ProgressFrame { tasks };
                    let Ok(text) = serde_json::to_string(&frame) else { continue };
                    if session.text(text).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = session.close(None).await;
    });

    Ok(response)
}

/// A Tax Preview request, matching the order-create payload (spec §4.6).
#[derive(Debug, Deserialize)]
struct TaxPreviewRequest {
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    subtotal: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TaxPreviewResponse {
    Ok { ok: bool, result: OrderComputedPayload },
    Err { ok: bool, error: TaxPreviewError },
}

#[derive(Debug, Serialize)]
struct TaxPreviewError {
    code: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

fn order_error_to_preview_code(err: &OrderError) -> &'static str {
    match err {
        OrderError::Validation(_) => "validation_error",
        OrderError::OutsideCoverage => "outside_coverage",
        OrderError::RateNotFound(_) => "tax_rate_not_found",
        _ => "internal_error",
    }
}

/// `GET /ws/tax-preview`: request/response tax computation without
/// persisting an order. Loops until the peer closes (spec §4.6).
pub async fn tax_preview_ws(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let state = Arc::clone(&state);

    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.recv().await {
            let actix_ws::Message::Text(text) = msg else {
                if matches!(msg, actix_ws::Message::Close(_)) {
                    break;
                }
                continue;
            };

            let response = match serde_json::from_str::<TaxPreviewRequest>(&text) {
                Ok(request) => match compute_order_values(
                    request.latitude,
                    request.longitude,
                    request.timestamp,
                    request.subtotal,
                    &state.resolver,
                    &state.cache,
                    &state.catalog,
                ) {
                    Ok(result) => TaxPreviewResponse::Ok { ok: true, result },
                    Err(err) => TaxPreviewResponse::Err {
                        ok: false,
                        error: TaxPreviewError {
                            code: order_error_to_preview_code(&err),
                            detail: err.to_string(),
                            fields: None,
                        },
                    },
                },
                Err(err) => TaxPreviewResponse::Err {
                    ok: false,
                    error: TaxPreviewError {
                        code: "invalid_json",
                        detail: err.to_string(),
                        fields: None,
                    },
                },
            };

            let Ok(payload) = serde_json::to_string(&response) else {
                continue;
            };
            if session.text(payload).await.is_err() {
                break;
            }
        }
        let _ = session.close(None).await;
    });

    Ok(response)
}

fn error_body(code: &str, detail: &str, fields: Option<Vec<String>>) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "error": {"code": code, "detail": detail, "fields": fields},
    })
}
