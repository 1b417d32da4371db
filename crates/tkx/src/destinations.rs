//! 🗄️ Destinations: where the tables go to live out their days.
//!
//! 🎭 Same casting agency as ever: one trait, one enum that dispatches to the concrete
//! backends, and a supervisor that never has to know whether the rows landed in
//! PostgreSQL or in a `HashMap` that evaporates when the test ends.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls (InMemoryDestination, PostgresDestination) → DestinationBackend enum
//! - `truncate` runs once per pipeline run, before any extraction.
//! - `append` runs once per non-empty table, sequentially, in completion order.
//! - `refresh_sla_detail` rebuilds `tickets_sla_detalle` from `tickets`, atomically
//!   where the backend can do atomic.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::Table;

pub mod in_mem;
pub mod postgres;

pub use in_mem::InMemoryDestination;
pub use postgres::{DatabaseConfig, PostgresDestination};

/// 🧹 A table to wipe before the run. `cascade` also wipes whatever references it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TruncateTarget {
    pub table: String,
    pub cascade: bool,
}

impl TruncateTarget {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            cascade: false,
        }
    }

    pub fn cascading(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            cascade: true,
        }
    }
}

/// 🕳️ A place tables can be emptied into and appended onto.
///
/// # Contract 📜
/// - `truncate` empties every listed table or none of them.
/// - `append` adds rows. It never creates, alters or replaces.
/// - `refresh_sla_detail` replaces the SLA detail table and reports how many rows it wrote.
#[async_trait]
pub trait Destination: std::fmt::Debug + Send {
    async fn truncate(&mut self, targets: &[TruncateTarget]) -> Result<()>;
    async fn append(&mut self, table: &str, rows: &Table) -> Result<()>;
    async fn refresh_sla_detail(&mut self) -> Result<u64>;
}

/// 🎭 The many faces of a Destination.
#[derive(Debug)]
pub enum DestinationBackend {
    InMemory(InMemoryDestination),
    Postgres(PostgresDestination),
}

#[async_trait]
impl Destination for DestinationBackend {
    async fn truncate(&mut self, targets: &[TruncateTarget]) -> Result<()> {
        match self {
            DestinationBackend::InMemory(d) => d.truncate(targets).await,
            DestinationBackend::Postgres(d) => d.truncate(targets).await,
        }
    }

    async fn append(&mut self, table: &str, rows: &Table) -> Result<()> {
        match self {
            DestinationBackend::InMemory(d) => d.append(table, rows).await,
            DestinationBackend::Postgres(d) => d.append(table, rows).await,
        }
    }

    async fn refresh_sla_detail(&mut self) -> Result<u64> {
        match self {
            DestinationBackend::InMemory(d) => d.refresh_sla_detail().await,
            DestinationBackend::Postgres(d) => d.refresh_sla_detail().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Payload;
    use serde_json::json;

    #[tokio::test]
    async fn the_one_where_the_enum_passes_every_call_straight_through() {
        let inner = InMemoryDestination::new();
        let mut backend = DestinationBackend::InMemory(inner.clone());
        let rows = Table::from_records(
            Payload::new(json!([{"id": 1}, {"id": 2}]))
                .into_records()
                .expect("💀 test rows should be records"),
        );

        backend
            .truncate(&[TruncateTarget::new("tickets")])
            .await
            .expect("💀 truncate should pass through");
        backend.append("tickets", &rows).await.expect("💀 append should pass through");
        let written = backend
            .refresh_sla_detail()
            .await
            .expect("💀 the SLA pass should pass through");

        assert_eq!(inner.truncated().await, vec!["tickets".to_string()]);
        assert_eq!(inner.row_count("tickets").await, 2);
        // -- 🕳️ no slasexpirationdate column, so no detail rows
        assert_eq!(written, 0);
    }
}
