// ai
//! 📦 Common data structures: the building blocks of tickex
//!
//! 🎬 COLD OPEN. INT. HELP DESK, 8:59 AM
//!
//! The ticket queue says forty-two. The API says "here's some JSON, good luck".
//! Somewhere between those two facts lives this module: the humble structs that
//! carry a raw [`Payload`] in, and a typed [`Table`] out.
//!
//! 🦆
//!
//! 🧠 Knowledge graph:
//! - [`Payload`]: the decoded API response, pre-validation. Zero opinions.
//! - [`Record`]: one flat key/value object inside a payload.
//! - [`CellValue`]: one typed cell. `Null` is the "no value" marker coercions fall back to.
//! - [`Column`] / [`Table`]: row-aligned columns, column order preserved for the load.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

/// 📄 One flat key/value record, exactly as the API sent it.
/// `serde_json` is built with `preserve_order`, so key order survives the trip.
pub type Record = serde_json::Map<String, Value>;

/// 💀 The payload wasn't a list of objects. Or a single object. Or anything we can work with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadShapeError {
    #[error("payload is not a sequence of records (got {0})")]
    NotASequence(&'static str),
    #[error("payload element #{index} is not a record (got {found})")]
    NotARecord { index: usize, found: &'static str },
}

/// 📡 The raw decoded API response. Either a sequence of records or a single record.
///
/// Deliberately dumb: no schema, no validation. Those happen at transform time,
/// against an expected key set. A `Payload` is moved into the transform and never
/// reused, so any in-place renaming there can't leak into a retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(Value);

impl Payload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// 🕳️ The "no data" payload. Also what a fetch degrades to when the API is unreachable.
    pub fn empty() -> Self {
        Self(Value::Array(Vec::new()))
    }

    /// ✅ Falsy the way the upstream data is falsy: null, `[]` or `{}`.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// 🔄 Normalize into a list of records. A lone object becomes a one-element list.
    pub fn into_records(self) -> Result<Vec<Record>, PayloadShapeError> {
        match self.0 {
            Value::Object(map) => Ok(vec![map]),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(PayloadShapeError::NotARecord {
                        index,
                        found: json_type_name(&other),
                    }),
                })
                .collect(),
            other => Err(PayloadShapeError::NotASequence(json_type_name(&other))),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 🗄️ The logical SQL type of a column. Decides how NULLs get bound on the way into Postgres,
/// because `NULL::text` in a `date` column is how you get paged at 3am.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Bool,
    Date,
    Timestamp,
    Time,
    Json,
}

/// 🎯 One typed cell. `Null` is the universal "no value" marker.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    /// 📦 nested arrays/objects we don't flatten. they go in as-is.
    Json(Value),
}

impl CellValue {
    /// 🔄 Lift a raw JSON value into a cell without coercing anything.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            Value::String(s) => Self::Text(s),
            nested => Self::Json(nested),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The kind this cell naturally belongs to. `Null` has no opinion.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ColumnKind::Bool),
            Self::Integer(_) => Some(ColumnKind::Integer),
            Self::Float(_) => Some(ColumnKind::Float),
            Self::Text(_) => Some(ColumnKind::Text),
            Self::Date(_) => Some(ColumnKind::Date),
            Self::Timestamp(_) => Some(ColumnKind::Timestamp),
            Self::Time(_) => Some(ColumnKind::Time),
            Self::Json(_) => Some(ColumnKind::Json),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// 🧮 Infer a column kind from raw cells: uniform kinds win, ints+floats widen to float,
/// anything else mixed falls back to text. All-null columns are text.
pub fn infer_kind(values: &[CellValue]) -> ColumnKind {
    let mut inferred: Option<ColumnKind> = None;
    for kind in values.iter().filter_map(CellValue::kind) {
        inferred = Some(match (inferred, kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }
    inferred.unwrap_or(ColumnKind::Text)
}

/// 📊 One named column of typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }
}

/// 🗃️ The tabular result: row-aligned columns, order significant for the load.
///
/// Built fresh per transform. Either loaded wholesale or discarded; zero rows means
/// the orchestrator skips the load with a warning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// 🕳️ Zero rows, zero columns. What validation failures turn into.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 🏗️ Build from records the way a dataframe would: columns in first-seen key order,
    /// missing keys filled with `Null`, kinds inferred from whatever showed up.
    pub fn from_records(records: Vec<Record>) -> Self {
        let row_count = records.len();
        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let mut cells: Vec<Vec<CellValue>> = vec![Vec::with_capacity(row_count); names.len()];
        for mut record in records {
            for (slot, name) in cells.iter_mut().zip(&names) {
                let value = record.remove(name).unwrap_or(Value::Null);
                slot.push(CellValue::from_json(value));
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| {
                let kind = infer_kind(&values);
                Column::new(name, kind, values)
            })
            .collect();
        Self { columns, row_count }
    }

    /// 🏗️ Build from explicit columns. Every column must have the same length.
    pub fn from_columns(columns: Vec<Column>) -> anyhow::Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            anyhow::bail!(
                "💀 column '{}' has {} values but the table has {} rows. Row alignment is not optional.",
                bad.name,
                bad.values.len(),
                row_count
            );
        }
        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// 🎯 One cell by row index and column name.
    pub fn cell(&self, row: usize, name: &str) -> Option<&CellValue> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    /// 🔄 Pull a column out of the table. `put_column` puts one back.
    pub(crate) fn take_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    /// 📥 Insert or replace a column. Replacement keeps the old position; new columns go last.
    /// A length mismatch is a programming error upstream, so we pad/cut to the row count.
    pub(crate) fn put_column(&mut self, mut column: Column) {
        column.values.resize(self.row_count, CellValue::Null);
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// 🏷️ Rename `from` to `to`. Absent `from` is a no-op; an existing `to` gets replaced,
    /// so a rename can never produce duplicate columns.
    pub(crate) fn rename_column(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if !self.contains_column(from) {
            return;
        }
        if let Some(dup) = self.columns.iter().position(|c| c.name == to) {
            self.columns.remove(dup);
        }
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == from) {
            column.name = to.to_string();
        }
    }

    /// ✂️ Keep only `names`, in that order. Unknown names come back as all-null text columns.
    pub(crate) fn select(&mut self, names: &[&str]) {
        let row_count = self.row_count;
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let column = self.take_column(name).unwrap_or_else(|| {
                Column::new(*name, ColumnKind::Text, vec![CellValue::Null; row_count])
            });
            selected.push(column);
        }
        self.columns = selected;
    }

    /// 🚶 Iterate rows as vectors of cell references, in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&CellValue>> + '_ {
        (0..self.row_count).map(move |row| {
            self.columns
                .iter()
                .map(|c| c.values.get(row).unwrap_or(&CellValue::Null))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        Payload::new(value)
            .into_records()
            .expect("💀 test payload should be a list of records. we wrote it ourselves.")
    }

    #[test]
    fn the_one_where_a_lonely_object_gets_a_list_of_its_own() {
        let recs = records(json!({"status": "Abierto"}));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0]["status"], "Abierto");
    }

    #[test]
    fn the_one_where_strings_and_numbers_refuse_to_be_records() {
        assert!(matches!(
            Payload::new(json!("nope")).into_records(),
            Err(PayloadShapeError::NotASequence("string"))
        ));
        assert!(matches!(
            Payload::new(json!([{"a": 1}, 7])).into_records(),
            Err(PayloadShapeError::NotARecord { index: 1, found: "number" })
        ));
    }

    #[test]
    fn the_one_where_empty_means_all_the_flavours_of_nothing() {
        assert!(Payload::empty().is_empty());
        assert!(Payload::new(Value::Null).is_empty());
        assert!(Payload::new(json!({})).is_empty());
        assert!(!Payload::new(json!([{}])).is_empty());
    }

    #[test]
    fn the_one_where_columns_keep_the_order_the_api_chose() {
        let table = Table::from_records(records(json!([
            {"b": 1, "a": "x"},
            {"a": "y", "c": 2.5}
        ])));

        assert_eq!(table.column_names(), vec!["b", "a", "c"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, "b"), Some(&CellValue::Null));
        assert_eq!(table.column("b").map(|c| c.kind), Some(ColumnKind::Integer));
        assert_eq!(table.column("c").map(|c| c.kind), Some(ColumnKind::Float));
        assert_eq!(table.column("a").map(|c| c.kind), Some(ColumnKind::Text));
    }

    #[test]
    fn the_one_where_mixed_kinds_settle_for_text() {
        let values = vec![
            CellValue::Integer(1),
            CellValue::Float(2.0),
            CellValue::Null,
        ];
        assert_eq!(infer_kind(&values), ColumnKind::Float);
        let values = vec![CellValue::Integer(1), CellValue::Text("x".into())];
        assert_eq!(infer_kind(&values), ColumnKind::Text);
        assert_eq!(infer_kind(&[CellValue::Null]), ColumnKind::Text);
    }

    #[test]
    fn the_one_where_renaming_onto_an_existing_column_does_not_clone_it() {
        let mut table = Table::from_records(records(json!([
            {"end_date": "01/01/2024", "id": 1, "end": "02/01/2024"}
        ])));
        table.rename_column("end", "end_date");
        assert_eq!(table.column_names(), vec!["id", "end_date"]);
        assert_eq!(table.cell(0, "end_date"), Some(&CellValue::Text("02/01/2024".into())));

        // 🔄 renaming something that isn't there: shrug, move on
        table.rename_column("end", "end_date");
        assert_eq!(table.column_names(), vec!["id", "end_date"]);
    }

    #[test]
    fn the_one_where_rename_keeps_its_seat_when_the_duplicate_sits_after_it() {
        let mut table = Table::from_records(records(json!([
            {"start": "a", "id": 1, "start_date": "b"}
        ])));
        table.rename_column("start", "start_date");
        assert_eq!(table.column_names(), vec!["start_date", "id"]);
        assert_eq!(table.cell(0, "start_date"), Some(&CellValue::Text("a".into())));
    }

    #[test]
    fn the_one_where_select_projects_and_pads() {
        let mut table = Table::from_records(records(json!([{"a": 1, "b": 2}])));
        table.select(&["b", "ghost"]);
        assert_eq!(table.column_names(), vec!["b", "ghost"]);
        assert_eq!(table.cell(0, "ghost"), Some(&CellValue::Null));
    }

    #[test]
    fn the_one_where_misaligned_columns_are_turned_away_at_the_door() {
        let result = Table::from_columns(vec![
            Column::new("a", ColumnKind::Integer, vec![CellValue::Integer(1)]),
            Column::new("b", ColumnKind::Integer, vec![]),
        ]);
        assert!(result.is_err());
    }
}
