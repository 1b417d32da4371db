// ai
//! 🔄 Transforms: one engine, many reports, zero copy-pasted pipelines 🎭
//!
//! 🎬 COLD OPEN. INT. DATA DESK. A PAYLOAD ARRIVES
//!
//! It's a list of records. Probably. Each one has the keys we expect. Probably.
//! The dates are `DD/MM/YYYY`. Probably. This module's job is to replace every
//! "probably" with either a typed [`Table`] or a clean, logged, empty one.
//!
//! ## The pipeline, in order 📐
//!
//! ```text
//!   Payload ──▶ normalize (object → [object])
//!           ──▶ pre-validation renames (end → end_date)
//!           ──▶ validate: EVERY record has EVERY expected key, or nothing passes
//!           ──▶ Table::from_records
//!           ──▶ renames ──▶ dates ──▶ timestamps ──▶ numerics
//!           ──▶ clock times ──▶ derived minutes ──▶ projection
//! ```
//!
//! ## Knowledge Graph 🧠
//! - [`TransformSpec`]: the declarative recipe, built with a builder.
//! - [`transform`]: the generic engine. Never returns an error: validation failures
//!   become `Table::empty()` plus an error log, coercion failures become `Null`.
//! - `coerce`: the per-cell parsers.
//! - Used by: `reports::ReportKind`, which is just nine fixed `TransformSpec`s.
//!
//! ⚠️ All-or-nothing: a 1000-record payload with one broken record loads zero rows.
//! That's not a bug, that's a schema contract. 🦆

pub mod coerce;

use tracing::{debug, error, warn};

use crate::common::{CellValue, Column, ColumnKind, Payload, Record, Table, infer_kind};

/// 📜 A declarative transform recipe: expected keys, renames, coercions, derivations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSpec {
    name: String,
    expected_keys: Vec<String>,
    pre_renames: Vec<(String, String)>,
    renames: Vec<(String, String)>,
    date_columns: Vec<String>,
    timestamp_columns: Vec<String>,
    numeric_columns: Vec<String>,
    time_columns: Vec<String>,
    derived_minutes: Vec<(String, String)>,
    select: Option<Vec<String>>,
    warn_on_empty: bool,
}

fn owned<I, S>(items: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into)
}

impl TransformSpec {
    /// 🏗️ Start a recipe. `name` shows up in every log line this spec produces.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_keys(&self) -> &[String] {
        &self.expected_keys
    }

    /// 🔑 Every record must carry all of these.
    pub fn expect_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_keys.extend(owned(keys));
        self
    }

    /// 🏷️ Rename a key on every record BEFORE validation. For fields whose raw name
    /// collides with something reserved downstream (looking at you, `end`).
    pub fn rename_before_validation(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pre_renames.push((from.into(), to.into()));
        self
    }

    /// 🏷️ Rename a column after the table is built.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    pub fn dates<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_columns.extend(owned(columns));
        self
    }

    pub fn timestamps<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns.extend(owned(columns));
        self
    }

    pub fn numerics<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_columns.extend(owned(columns));
        self
    }

    pub fn clock_times<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_columns.extend(owned(columns));
        self
    }

    /// ⏱️ Add `target` = minutes of `source` (an `H:MM` string or a parsed time).
    pub fn derive_minutes(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.derived_minutes.push((source.into(), target.into()));
        self
    }

    /// ✂️ Keep only these columns, in this order.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(owned(columns).collect());
        self
    }

    /// 🕳️ Treat an empty payload as a warning-worthy non-event instead of a silent empty table.
    pub fn warn_on_empty(mut self) -> Self {
        self.warn_on_empty = true;
        self
    }
}

/// 🔍 First record (index, missing keys) that doesn't carry every expected key.
fn find_missing_keys(records: &[Record], expected: &[String]) -> Option<(usize, Vec<String>)> {
    records.iter().enumerate().find_map(|(index, record)| {
        let missing: Vec<String> = expected
            .iter()
            .filter(|key| !record.contains_key(key.as_str()))
            .cloned()
            .collect();
        (!missing.is_empty()).then_some((index, missing))
    })
}

fn rename_key(record: &mut Record, from: &str, to: &str) {
    if from == to {
        return;
    }
    if let Some(value) = record.shift_remove(from) {
        record.insert(to.to_string(), value);
    }
}

/// 🔄 Coerce each named column cell by cell. A column that doesn't exist yet shows up
/// as all `Null`, so the load always sees the same shape.
fn coerce_columns(
    table: &mut Table,
    columns: &[String],
    kind_for: impl Fn(&[CellValue]) -> ColumnKind,
    coerce: impl Fn(&CellValue) -> CellValue,
) {
    for name in columns {
        let values: Vec<CellValue> = match table.column(name) {
            Some(column) => column.values.iter().map(&coerce).collect(),
            None => vec![CellValue::Null; table.row_count()],
        };
        let kind = kind_for(&values);
        table.put_column(Column::new(name.clone(), kind, values));
    }
}

/// 🚀 Run a payload through a spec. Consumes the payload: records may be renamed in
/// place, and nobody gets to see them half-renamed afterwards.
pub fn transform(payload: Payload, spec: &TransformSpec) -> Table {
    let name = spec.name();

    if spec.warn_on_empty && payload.is_empty() {
        warn!("⚠️ [{name}] No data to transform.");
        return Table::empty();
    }

    let mut records = match payload.into_records() {
        Ok(records) => records,
        Err(err) => {
            error!("❌ [{name}] Invalid payload: {err}");
            return Table::empty();
        }
    };

    for record in &mut records {
        for (from, to) in &spec.pre_renames {
            rename_key(record, from, to);
        }
    }

    if let Some((index, missing)) = find_missing_keys(&records, &spec.expected_keys) {
        error!(
            "❌ [{name}] Record #{index} is missing expected keys {missing:?}. The whole payload is rejected."
        );
        return Table::empty();
    }

    let mut table = Table::from_records(records);

    for (from, to) in &spec.renames {
        table.rename_column(from, to);
    }

    coerce_columns(&mut table, &spec.date_columns, |_| ColumnKind::Date, coerce::parse_date);
    coerce_columns(
        &mut table,
        &spec.timestamp_columns,
        |_| ColumnKind::Timestamp,
        coerce::parse_timestamp,
    );
    coerce_columns(
        &mut table,
        &spec.numeric_columns,
        |values| match infer_kind(values) {
            ColumnKind::Integer => ColumnKind::Integer,
            _ => ColumnKind::Float,
        },
        coerce::parse_numeric,
    );
    coerce_columns(&mut table, &spec.time_columns, |_| ColumnKind::Time, coerce::parse_clock_time);

    for (source, target) in &spec.derived_minutes {
        let values: Vec<CellValue> = match table.column(source) {
            Some(column) => column.values.iter().map(coerce::minutes_of).collect(),
            None => vec![CellValue::Null; table.row_count()],
        };
        table.put_column(Column::new(target.clone(), ColumnKind::Integer, values));
    }

    if let Some(columns) = &spec.select {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        table.select(&names);
    }

    debug!(
        "🔄 [{name}] Transformed {} rows into columns {:?}",
        table.row_count(),
        table.column_names()
    );
    table
}
