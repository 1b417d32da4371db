// ai
//! 📋 Reports: nine reports, one engine, zero hand-written pipelines.
//!
//! Each [`ReportKind`] is a fixed configuration of [`transforms::transform`]:
//! which endpoint it reads, which keys it expects, what gets renamed, and which
//! columns get coerced. Adding a report means adding a match arm, not a script.
//!
//! 🦆 (the duck approves of data-driven configuration. the duck is a data duck.)

use crate::api_client::Endpoint;
use crate::common::{Payload, Table};
use crate::transforms::{self, TransformSpec};

/// 🧾 Every report the ETL knows how to shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    TicketStatus,
    Tickets,
    TicketsPerPeriod,
    OpenedClosedMonthly,
    TicketsByHour,
    ActivitiesByDepartment,
    MonthlySatisfaction,
    TicketActivities,
    ActivitiesHoursToCharge,
}

/// 🎫 tickets and tickets-per-period share a schema, down to the last timestamp.
const TICKET_KEYS: [&str; 10] = [
    "id",
    "start",
    "end_date",
    "charge_hour",
    "worked_hour",
    "analysis",
    "reopening",
    "starttime",
    "endtime",
    "analysistime",
];

fn ticket_spec(name: &str) -> TransformSpec {
    TransformSpec::new(name)
        .warn_on_empty()
        .rename_before_validation("end", "end_date")
        .expect_keys(TICKET_KEYS)
        .dates(["start", "end_date", "analysis", "reopening"])
        .timestamps(["starttime", "endtime", "analysistime"])
        .numerics(["charge_hour", "worked_hour"])
}

impl ReportKind {
    pub const ALL: [Self; 9] = [
        Self::TicketStatus,
        Self::Tickets,
        Self::TicketsPerPeriod,
        Self::OpenedClosedMonthly,
        Self::TicketsByHour,
        Self::ActivitiesByDepartment,
        Self::MonthlySatisfaction,
        Self::TicketActivities,
        Self::ActivitiesHoursToCharge,
    ];

    /// 🏷️ Stable name, also the default destination table.
    pub fn name(self) -> &'static str {
        match self {
            Self::TicketStatus => "ticket_status",
            Self::Tickets => "tickets",
            Self::TicketsPerPeriod => "tickets_per_period",
            Self::OpenedClosedMonthly => "opened_closed_monthly",
            Self::TicketsByHour => "tickets_by_hour",
            Self::ActivitiesByDepartment => "activities_hours_by_department",
            Self::MonthlySatisfaction => "monthly_satisfaction_average",
            Self::TicketActivities => "ticket_activities",
            Self::ActivitiesHoursToCharge => "activities_hours_to_charge",
        }
    }

    pub fn endpoint(self) -> Endpoint {
        match self {
            Self::TicketStatus => Endpoint::ListTicketStatus,
            Self::Tickets => Endpoint::ShowTicketsByStatus,
            Self::TicketsPerPeriod => Endpoint::ShowTicketsPerPeriod,
            Self::OpenedClosedMonthly => Endpoint::OpenedVersusClosedMonthly,
            Self::TicketsByHour => Endpoint::TicketsByOpeningTime,
            Self::ActivitiesByDepartment => Endpoint::ActivitiesHoursByDepartment,
            Self::MonthlySatisfaction => Endpoint::MonthlySatisfactionAverage,
            Self::TicketActivities => Endpoint::ListTicketsActivities,
            Self::ActivitiesHoursToCharge => Endpoint::ActivitiesHoursToCharge,
        }
    }

    /// 📜 The recipe.
    pub fn spec(self) -> TransformSpec {
        match self {
            Self::TicketStatus => TransformSpec::new(self.name())
                .expect_keys(["status", "description", "action"]),

            Self::Tickets | Self::TicketsPerPeriod => ticket_spec(self.name()),

            Self::OpenedClosedMonthly => TransformSpec::new(self.name())
                .expect_keys(["month", "year", "opened", "closed"])
                .numerics(["month", "year", "opened", "closed"]),

            Self::TicketsByHour => TransformSpec::new(self.name())
                .expect_keys(["hour", "amount", "percentage"])
                .numerics(["hour", "amount", "percentage"]),

            Self::ActivitiesByDepartment => TransformSpec::new(self.name())
                .expect_keys(["department", "worked_hour", "charge_hour"])
                .derive_minutes("worked_hour", "worked_minutes")
                .derive_minutes("charge_hour", "charge_minutes")
                .select(["department", "worked_minutes", "charge_minutes"]),

            Self::MonthlySatisfaction => TransformSpec::new(self.name())
                .expect_keys(["month", "year", "month_year", "evaluation"])
                .numerics(["month", "year", "evaluation"]),

            // -- 🕐 charge/worked hours are parsed as clock times first; the minutes come off the parsed time
            Self::TicketActivities => TransformSpec::new(self.name())
                .expect_keys([
                    "activity",
                    "description",
                    "id",
                    "ticket",
                    "agent",
                    "typeofactivity",
                    "start",
                    "end",
                    "charge_hour",
                    "worked_hour",
                    "parts",
                    "id_ticket",
                ])
                .rename("id", "activity_id")
                .rename("start", "start_date")
                .rename("end", "end_date")
                .dates(["start_date", "end_date"])
                .clock_times(["charge_hour", "worked_hour"])
                .derive_minutes("charge_hour", "charge_minutes")
                .derive_minutes("worked_hour", "worked_minutes"),

            // -- ⏱️ charge_hour stays a string here; only the derived minutes are typed
            Self::ActivitiesHoursToCharge => TransformSpec::new(self.name())
                .expect_keys([
                    "id_ticket",
                    "location_id",
                    "ticket",
                    "activity",
                    "description",
                    "start",
                    "end",
                    "parts",
                    "start_time",
                    "end_time",
                    "contract",
                    "agent",
                    "location",
                    "typeofactivity",
                    "requester",
                    "cost",
                    "charge_hour",
                ])
                .rename("start", "start_date")
                .rename("end", "end_date")
                .dates(["start_date", "end_date"])
                .clock_times(["start_time", "end_time"])
                .numerics(["cost"])
                .derive_minutes("charge_hour", "charge_minutes"),
        }
    }

    /// 🔄 Shape a payload into this report's table.
    pub fn transform(self, payload: Payload) -> Table {
        transforms::transform(payload, &self.spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CellValue, ColumnKind};
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;

    #[test]
    fn the_one_where_every_report_has_a_unique_name_and_endpoint() {
        let mut names: Vec<&str> = ReportKind::ALL.iter().map(|r| r.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ReportKind::ALL.len());

        let mut endpoints: Vec<&str> = ReportKind::ALL.iter().map(|r| r.endpoint().name()).collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        assert_eq!(endpoints.len(), ReportKind::ALL.len());
    }

    #[test]
    fn the_one_where_ticket_status_passes_through_untouched() {
        let table = ReportKind::TicketStatus.transform(Payload::new(json!([
            {"status": "Abierto", "description": "Open", "action": "none"}
        ])));
        assert_eq!(table.column_names(), vec!["status", "description", "action"]);
        assert_eq!(table.cell(0, "status"), Some(&CellValue::Text("Abierto".into())));
    }

    #[test]
    fn the_one_where_tickets_get_their_dates_and_lose_their_end() {
        let table = ReportKind::Tickets.transform(Payload::new(json!([{
            "id": 101,
            "start": "01/02/2024",
            "end": "03/02/2024",
            "charge_hour": "1.5",
            "worked_hour": "abc",
            "analysis": "",
            "reopening": null,
            "starttime": "01/02/2024 09:30",
            "endtime": "nope",
            "analysistime": null,
            "slasexpirationdate": "SLA expirado"
        }])));

        assert_eq!(table.row_count(), 1);
        assert!(!table.contains_column("end"));
        assert_eq!(
            table.cell(0, "end_date"),
            Some(&CellValue::Date(NaiveDate::from_ymd_opt(2024, 2, 3).expect("valid date")))
        );
        assert_eq!(table.cell(0, "analysis"), Some(&CellValue::Null));
        assert_eq!(table.column("starttime").map(|c| c.kind), Some(ColumnKind::Timestamp));
        assert_eq!(table.cell(0, "endtime"), Some(&CellValue::Null));
        assert_eq!(table.cell(0, "charge_hour"), Some(&CellValue::Float(1.5)));
        assert_eq!(table.cell(0, "worked_hour"), Some(&CellValue::Null));
        assert_eq!(
            table.cell(0, "slasexpirationdate"),
            Some(&CellValue::Text("SLA expirado".into()))
        );
    }

    #[test]
    fn the_one_where_tickets_with_nothing_to_say_say_nothing() {
        assert!(ReportKind::Tickets.transform(Payload::empty()).is_empty());
        assert!(ReportKind::TicketsPerPeriod.transform(Payload::empty()).is_empty());
    }

    #[test]
    fn the_one_where_departments_only_keep_three_columns() {
        let table = ReportKind::ActivitiesByDepartment.transform(Payload::new(json!([
            {"department": "Soporte", "worked_hour": "10:30", "charge_hour": "3:70"}
        ])));
        assert_eq!(
            table.column_names(),
            vec!["department", "worked_minutes", "charge_minutes"]
        );
        assert_eq!(table.cell(0, "worked_minutes"), Some(&CellValue::Integer(630)));
        assert_eq!(table.cell(0, "charge_minutes"), Some(&CellValue::Null));
    }

    #[test]
    fn the_one_where_a_lone_ticket_activity_gets_the_full_treatment() {
        let table = ReportKind::TicketActivities.transform(Payload::new(json!({
            "activity": "Notebook",
            "description": "Se configura notebook",
            "id": "2547",
            "ticket": "Configuración notebook",
            "agent": "Marco",
            "typeofactivity": "Presencial",
            "start": "20/04/2018",
            "end": "20/04/2018",
            "charge_hour": "03:00",
            "worked_hour": "99:00",
            "parts": null,
            "id_ticket": "2052"
        })));

        assert_eq!(table.row_count(), 1);
        assert!(table.contains_column("activity_id"));
        assert!(table.contains_column("start_date"));
        assert!(!table.contains_column("id"));
        assert_eq!(
            table.cell(0, "charge_hour"),
            Some(&CellValue::Time(NaiveTime::from_hms_opt(3, 0, 0).expect("valid time")))
        );
        assert_eq!(table.cell(0, "charge_minutes"), Some(&CellValue::Integer(180)));
        assert_eq!(table.cell(0, "worked_hour"), Some(&CellValue::Null));
        assert_eq!(table.cell(0, "worked_minutes"), Some(&CellValue::Null));
    }

    #[test]
    fn the_one_where_hours_to_charge_keeps_the_string_and_counts_the_minutes() {
        let table = ReportKind::ActivitiesHoursToCharge.transform(Payload::new(json!([{
            "id_ticket": "1", "location_id": "2", "ticket": "t", "activity": "a",
            "description": "d", "start": "01/03/2024", "end": "02/03/2024", "parts": null,
            "start_time": "08:00", "end_time": "late", "contract": "c", "agent": "ag",
            "location": "HQ", "typeofactivity": "Remoto", "requester": "r",
            "cost": "1500.50", "charge_hour": "125:05"
        }])));

        assert_eq!(table.cell(0, "charge_hour"), Some(&CellValue::Text("125:05".into())));
        assert_eq!(table.cell(0, "charge_minutes"), Some(&CellValue::Integer(7505)));
        assert_eq!(table.cell(0, "cost"), Some(&CellValue::Float(1500.5)));
        assert_eq!(table.cell(0, "end_time"), Some(&CellValue::Null));
        assert!(table.contains_column("end_date"));
    }

    #[test]
    fn the_one_where_monthly_numbers_are_actually_numbers() {
        let table = ReportKind::MonthlySatisfaction.transform(Payload::new(json!([
            {"month": "3", "year": "2024", "month_year": "03/2024", "evaluation": "4.7"}
        ])));
        assert_eq!(table.cell(0, "month"), Some(&CellValue::Integer(3)));
        assert_eq!(table.cell(0, "evaluation"), Some(&CellValue::Float(4.7)));
        assert_eq!(table.cell(0, "month_year"), Some(&CellValue::Text("03/2024".into())));

        let rejected = ReportKind::OpenedClosedMonthly.transform(Payload::new(json!([
            {"month": 1, "year": 2024, "opened": 5}
        ])));
        assert!(rejected.is_empty());
    }
}
