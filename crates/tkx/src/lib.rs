//! 🎫 tkx: pulls help-desk reports off a REST API, shapes them into tables, and
//! drops them into PostgreSQL. Then works out whose SLA is on fire.
//!
//! 🧠 Knowledge graph:
//! - `api_client` + `retry`: fetch with bounded exponential backoff.
//! - `transforms` + `reports`: one declarative engine, nine report recipes.
//! - `supervisor`: concurrent extract/transform, sequential load, per-task isolation.
//! - `destinations`: Postgres for real, in-memory for tests.
//! - `sla`: the countdown.
//! - `pipelines`: the seven scheduled runs, and [`run_pipeline`] to start one.

pub mod api_client;
pub mod app_config;
pub mod common;
pub mod destinations;
pub mod pipelines;
pub mod reports;
pub mod retry;
pub mod sla;
pub mod supervisor;
pub mod transforms;

pub use pipelines::{Pipeline, PipelineReport, SlaRefresh, run_pipeline};
