//! The Order Record data model and the Order Calculator's computed
//! output payload (spec. Data Model, "Order Record"; §4.3 "Order
//! Calculator").

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tax::JurisdictionsPayload;

/// Everything the Order Calculator derives from `(lat, lon, ts,
/// subtotal_raw)`. The Import Executor attaches `author_user_id` when
/// materializing an [`OrderRow`] for insertion; this payload itself
/// carries no user reference, matching the source's separation between
/// `compute_order_values` (pure) and `Order(user_id=..., **computed)`
/// (persistence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderComputedPayload {
    /// Validated latitude.
    pub latitude: f64,
    /// Validated longitude.
    pub longitude: f64,
    /// Order timestamp, already validated against `MIN_SUPPORTED_DATE`.
    pub timestamp: DateTime<Utc>,
    /// `round2(subtotal_raw)`.
    pub subtotal: Decimal,
    /// Normalized reporting code the point resolved to.
    pub reporting_code: String,
    /// The raw four-category jurisdiction payload, stored verbatim.
    pub jurisdictions: JurisdictionsPayload,
    /// `round5(breakdown.composite_tax_rate)`.
    pub composite_tax_rate: Decimal,
    /// Per-category rounded rates, carried onto the Order row.
    pub state_rate: Decimal,
    /// See [`Self::state_rate`].
    pub county_rate: Decimal,
    /// See [`Self::state_rate`].
    pub city_rate: Decimal,
    /// See [`Self::state_rate`].
    pub special_rates: Decimal,
    /// `round2(subtotal * composite_tax_rate)`.
    pub tax_amount: Decimal,
    /// `round2(subtotal + tax_amount)`.
    pub total_amount: Decimal,
}

/// A durable Order row, owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    /// Database-assigned identifier.
    pub id: i64,
    /// Nullable; `SET NULL` on user deletion.
    pub author_user_id: Option<i64>,
    /// See [`OrderComputedPayload`].
    pub computed: OrderComputedPayload,
    /// Row insertion timestamp.
    pub created_at: DateTime<Utc>,
}
