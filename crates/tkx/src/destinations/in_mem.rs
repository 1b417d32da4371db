use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::sync::Mutex;

use crate::common::Table;
use crate::destinations::{Destination, TruncateTarget};
use crate::sla::{self, SLA_DETAIL_TABLE, TICKETS_TABLE};

/// 📦 A destination that never forgets, until the process exits.
///
/// Every append is kept as its own `Table`, grouped by table name. Clone-able because
/// tests need to peek inside after handing `self` off to the supervisor. The `Arc`
/// means every clone shares the same vault.
///
/// 🧪 `fail_appends_to` makes appends to a table blow up, so tests can watch the
/// supervisor shrug it off.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDestination {
    tables: Arc<Mutex<HashMap<String, Vec<Table>>>>,
    truncated: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    clock: Option<NaiveDateTime>,
}

impl InMemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// ⏰ Pin `now` for SLA derivation. Unpinned, it reads the local wall clock once per pass.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub async fn fail_appends_to(&self, table: impl Into<String>) {
        self.failing.lock().await.insert(table.into());
    }

    /// 📸 Every batch appended to `table` since the last truncate, in arrival order.
    pub async fn batches(&self, table: &str) -> Vec<Table> {
        self.tables.lock().await.get(table).cloned().unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map_or(0, |batches| batches.iter().map(Table::row_count).sum())
    }

    /// 🧹 Names of every table truncated so far, in order.
    pub async fn truncated(&self) -> Vec<String> {
        self.truncated.lock().await.clone()
    }
}

#[async_trait]
impl Destination for InMemoryDestination {
    async fn truncate(&mut self, targets: &[TruncateTarget]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let mut truncated = self.truncated.lock().await;
        for target in targets {
            tables.remove(&target.table);
            truncated.push(target.table.clone());
        }
        Ok(())
    }

    async fn append(&mut self, table: &str, rows: &Table) -> Result<()> {
        if self.failing.lock().await.contains(table) {
            bail!("💀 relation \"{table}\" refused the rows\nDETAIL: injected by the test, nothing personal");
        }
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .push(rows.clone());
        Ok(())
    }

    async fn refresh_sla_detail(&mut self) -> Result<u64> {
        let now = self.clock.unwrap_or_else(|| Local::now().naive_local());
        let mut tables = self.tables.lock().await;
        let detail = {
            let tickets = tables.get(TICKETS_TABLE).map(Vec::as_slice).unwrap_or_default();
            sla::derive_detail(tickets, now)
        };
        let written = detail.len() as u64;
        tables.insert(SLA_DETAIL_TABLE.to_string(), vec![sla::detail_table(&detail)?]);
        Ok(written)
    }
}
