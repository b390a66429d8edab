#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The order-import pipeline's business logic: the Order Calculator,
//! the CSV Row Parser, and the resumable Import Executor.
//!
//! This crate has no database or object-store dependency of its own;
//! [`executor::ImportTaskStore`] is the seam the persistence layer
//! implements, keeping the calculator and executor testable without a
//! live Postgres connection.

pub mod calculator;
pub mod csv_row;
pub mod date_rules;
pub mod executor;

pub use calculator::compute_order_values;
pub use executor::{
    ExecutorServices, ImportTaskStore, RowOutcome, TaskCounters, count_csv_rows,
    process_import_task,
};
