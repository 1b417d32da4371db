// ai
//! ⏳ SLA derivation: the countdown clock every help desk pretends not to watch.
//!
//! 🎬 *[a ticket sits in the queue. its SLA expires at 17:00. it is 16:58.]*
//! *[nobody moves. the dashboard turns red. this module was there. it saw everything.]*
//!
//! For every `tickets` row with a non-null `slasexpirationdate`, classify the SLA and
//! compute how much time is left (negative when it's already gone):
//!
//! | marker                          | estado_sla              | remaining |
//! |---------------------------------|-------------------------|-----------|
//! | `SLA expirado`                  | `SLA expirado (manual)` | none      |
//! | `DD/MM/YYYY HH:MM`, in the past | `VENCIDO`               | negative  |
//! | `DD/MM/YYYY HH:MM`, otherwise   | `DENTRO DE SLA`         | positive  |
//! | anything else                   | `SIN FECHA VÁLIDA`      | none      |
//!
//! With no interval, days/hours/minutes stay unset and seconds is 0.
//!
//! 🧠 Knowledge graph:
//! - [`SLA_DETAIL_SQL`]: the one statement the Postgres destination runs (in a transaction
//!   with the truncate) so the read and the rewrite share one `NOW()`.
//! - [`derive_detail`]: the same rules, in-process, for the in-memory destination.
//!   One `now` snapshot for the whole pass. No per-row clock skew.
//! - Interval components follow timestamp-difference extraction: whole days, then the
//!   hours/minutes/seconds left over, every field carrying the interval's sign.

use std::cmp::Reverse;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::common::{CellValue, Column, ColumnKind, Table};

/// 🎫 Where the SLA markers come from.
pub const TICKETS_TABLE: &str = "tickets";
/// 📊 Where the derived detail goes. Fully replaced every run.
pub const SLA_DETAIL_TABLE: &str = "tickets_sla_detalle";
/// 🖐️ Someone expired this SLA by hand.
pub const MANUAL_EXPIRY_MARKER: &str = "SLA expirado";

const MARKER_PATTERN: &str = r"^([0-9]{2})/([0-9]{2})/([0-9]{4})\s([0-9]{2}):([0-9]{2})$";

static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(MARKER_PATTERN).expect("💀 the SLA marker pattern is a constant and it compiles")
});

/// 🗄️ The SLA detail statement. Reads `tickets`, writes `tickets_sla_detalle`.
/// Run it right after `TRUNCATE TABLE tickets_sla_detalle` inside one transaction.
pub const SLA_DETAIL_SQL: &str = r#"
INSERT INTO tickets_sla_detalle (
    id,
    ticket,
    requester,
    status,
    slasexpirationdate,
    estado_sla,
    tiempo_restante_intervalo,
    dias_restantes,
    horas_restantes,
    minutos_restantes,
    segundos_restantes
)
SELECT
    t.id,
    t.ticket,
    t.requester,
    t.status,
    t.slasexpirationdate,

    CASE
        WHEN t.slasexpirationdate = 'SLA expirado' THEN 'SLA expirado (manual)'
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$' THEN
            CASE
                WHEN to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') < NOW()
                    THEN 'VENCIDO'
                ELSE 'DENTRO DE SLA'
            END
        ELSE 'SIN FECHA VÁLIDA'
    END AS estado_sla,

    CASE
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$'
        THEN date_trunc('second', to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') - NOW())
        ELSE NULL
    END AS tiempo_restante_intervalo,

    CASE
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$'
        THEN EXTRACT(DAY FROM (to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') - NOW()))
        ELSE NULL
    END AS dias_restantes,

    CASE
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$'
        THEN EXTRACT(HOUR FROM (to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') - NOW()))
        ELSE NULL
    END AS horas_restantes,

    CASE
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$'
        THEN EXTRACT(MINUTE FROM (to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') - NOW()))
        ELSE NULL
    END AS minutos_restantes,

    CASE
        WHEN t.slasexpirationdate ~ '^\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}$'
        THEN (EXTRACT(SECOND FROM (to_timestamp(t.slasexpirationdate, 'DD/MM/YYYY HH24:MI') - NOW())))::int
        ELSE 0
    END AS segundos_restantes

FROM tickets t
WHERE t.slasexpirationdate IS NOT NULL
ORDER BY t.id DESC
"#;

/// 🚦 The four moods of an SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaStatus {
    ExpiredManually,
    Overdue,
    WithinSla,
    NoValidDate,
}

impl SlaStatus {
    /// 🏷️ The label stored in `estado_sla`.
    pub fn label(self) -> &'static str {
        match self {
            Self::ExpiredManually => "SLA expirado (manual)",
            Self::Overdue => "VENCIDO",
            Self::WithinSla => "DENTRO DE SLA",
            Self::NoValidDate => "SIN FECHA VÁLIDA",
        }
    }
}

/// ⏱️ Time left until (or since, when negative) the SLA expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    /// The whole interval, truncated to seconds.
    pub total_seconds: i64,
    pub days: i64,
    /// 0..=23 in magnitude. Days absorb the rest.
    pub hours: i64,
    pub minutes: i64,
    /// Sub-minute part of the untruncated interval, rounded half away from zero.
    pub seconds: i64,
}

impl Remaining {
    /// 🧮 Break `expiry - now` into its fields.
    pub fn between(expiry: NaiveDateTime, now: NaiveDateTime) -> Self {
        let delta = expiry - now;
        let total_seconds = delta.num_seconds();
        let days = total_seconds / 86_400;
        let within_day = total_seconds % 86_400;
        let hours = within_day / 3_600;
        let minutes = (within_day % 3_600) / 60;

        // -- 🎯 seconds come from the untruncated interval and get rounded, like a ::int cast
        let seconds = match delta.num_microseconds() {
            Some(micros) => {
                let sub_minute = micros % 60_000_000;
                let nudge = if sub_minute < 0 { -500_000 } else { 500_000 };
                (sub_minute + nudge) / 1_000_000
            }
            None => total_seconds % 60,
        };

        Self {
            total_seconds,
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

/// 🔍 Verdict for a single marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaEvaluation {
    pub status: SlaStatus,
    pub remaining: Option<Remaining>,
}

/// 📅 Strict `DD/MM/YYYY HH:MM` (any single whitespace in the middle). Impossible dates
/// like `31/02/2024 10:00` match the shape but don't parse, so they're `None`.
pub fn parse_marker(marker: &str) -> Option<NaiveDateTime> {
    let caps = MARKER_REGEX.captures(marker)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok())?;
    NaiveDate::from_ymd_opt(year, field(2)?, field(1)?)?.and_hms_opt(field(4)?, field(5)?, 0)
}

/// 🚦 Classify one marker against one `now`.
pub fn classify(marker: &str, now: NaiveDateTime) -> SlaEvaluation {
    if marker == MANUAL_EXPIRY_MARKER {
        return SlaEvaluation {
            status: SlaStatus::ExpiredManually,
            remaining: None,
        };
    }
    match parse_marker(marker) {
        Some(expiry) => SlaEvaluation {
            status: if expiry < now {
                SlaStatus::Overdue
            } else {
                SlaStatus::WithinSla
            },
            remaining: Some(Remaining::between(expiry, now)),
        },
        None => SlaEvaluation {
            status: SlaStatus::NoValidDate,
            remaining: None,
        },
    }
}

/// 📄 One row of `tickets_sla_detalle`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaDetailRow {
    pub id: CellValue,
    pub ticket: CellValue,
    pub requester: CellValue,
    pub status: CellValue,
    pub marker: String,
    pub sla_status: SlaStatus,
    pub remaining_seconds: Option<i64>,
    pub days: Option<i64>,
    pub hours: Option<i64>,
    pub minutes: Option<i64>,
    /// 0 when there is no interval.
    pub seconds: i64,
}

impl SlaDetailRow {
    fn new(
        id: CellValue,
        ticket: CellValue,
        requester: CellValue,
        status: CellValue,
        marker: String,
        now: NaiveDateTime,
    ) -> Self {
        let evaluation = classify(&marker, now);
        let remaining = evaluation.remaining;
        Self {
            id,
            ticket,
            requester,
            status,
            marker,
            sla_status: evaluation.status,
            remaining_seconds: remaining.map(|r| r.total_seconds),
            days: remaining.map(|r| r.days),
            hours: remaining.map(|r| r.hours),
            minutes: remaining.map(|r| r.minutes),
            seconds: remaining.map_or(0, |r| r.seconds),
        }
    }
}

/// 🔑 Sort key for ticket ids. Numeric ids outrank textual ones, so a descending
/// sort lists numbers first (largest first), then the text ids in reverse order.
/// One key per row keeps the order total, whatever mix of ids the API sends.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IdKey {
    Text(String),
    Numeric(i64),
}

impl IdKey {
    fn of(cell: &CellValue) -> Self {
        match cell {
            CellValue::Integer(i) => Self::Numeric(*i),
            CellValue::Text(s) => s
                .trim()
                .parse()
                .map_or_else(|_| Self::Text(s.clone()), Self::Numeric),
            other => Self::Text(other.to_string()),
        }
    }
}

/// 🏭 Derive every detail row from the `tickets` table(s), newest id first.
pub fn derive_detail<'a>(
    tickets: impl IntoIterator<Item = &'a Table>,
    now: NaiveDateTime,
) -> Vec<SlaDetailRow> {
    let mut rows = Vec::new();
    for table in tickets {
        for row in 0..table.row_count() {
            let marker = match table.cell(row, "slasexpirationdate") {
                None | Some(CellValue::Null) => continue,
                Some(cell) => cell.to_string(),
            };
            let grab = |name: &str| table.cell(row, name).cloned().unwrap_or(CellValue::Null);
            rows.push(SlaDetailRow::new(
                grab("id"),
                grab("ticket"),
                grab("requester"),
                grab("status"),
                marker,
                now,
            ));
        }
    }
    rows.sort_by_cached_key(|row| Reverse(IdKey::of(&row.id)));
    rows
}

/// 📊 Lay the detail rows out as a table shaped like `tickets_sla_detalle`.
/// The interval column holds whole seconds.
pub fn detail_table(rows: &[SlaDetailRow]) -> anyhow::Result<Table> {
    let opt_int = |v: Option<i64>| v.map_or(CellValue::Null, CellValue::Integer);
    let column = |name: &str, kind: ColumnKind, f: &dyn Fn(&SlaDetailRow) -> CellValue| {
        Column::new(name, kind, rows.iter().map(f).collect())
    };
    let id_kind = crate::common::infer_kind(&rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>());

    Table::from_columns(vec![
        column("id", id_kind, &|r| r.id.clone()),
        column("ticket", ColumnKind::Text, &|r| r.ticket.clone()),
        column("requester", ColumnKind::Text, &|r| r.requester.clone()),
        column("status", ColumnKind::Text, &|r| r.status.clone()),
        column("slasexpirationdate", ColumnKind::Text, &|r| {
            CellValue::Text(r.marker.clone())
        }),
        column("estado_sla", ColumnKind::Text, &|r| {
            CellValue::Text(r.sla_status.label().to_string())
        }),
        column("tiempo_restante_intervalo", ColumnKind::Integer, &|r| {
            opt_int(r.remaining_seconds)
        }),
        column("dias_restantes", ColumnKind::Integer, &|r| opt_int(r.days)),
        column("horas_restantes", ColumnKind::Integer, &|r| opt_int(r.hours)),
        column("minutos_restantes", ColumnKind::Integer, &|r| opt_int(r.minutes)),
        column("segundos_restantes", ColumnKind::Integer, &|r| {
            CellValue::Integer(r.seconds)
        }),
    ])
}
