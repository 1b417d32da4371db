// ai
//! 🛤️ Pipelines: the seven scheduled runs, each one a list of tasks and a worker count.
//!
//! 🧠 Knowledge graph:
//! - [`Pipeline`] names a run. [`Pipeline::plan`] turns it into a [`PipelinePlan`]:
//!   the tasks, how many may run at once, and whether the SLA detail gets rebuilt.
//! - [`execute`] feeds a plan to a [`Supervisor`] over any [`Destination`], then runs the
//!   SLA pass when asked. An SLA failure is logged and swallowed.
//! - [`run_pipeline`] is the production path: validate config, build the API client,
//!   connect to Postgres, execute.
//!
//! | pipeline                       | tasks                                   | pool | SLA |
//! |--------------------------------|-----------------------------------------|------|-----|
//! | ticket-status                  | ticket_status                           | 1    |     |
//! | tickets-by-status              | tickets × {Pendiente, Abierto, Asignado, Listo para cierre} | 4 | ✅ |
//! | tickets-per-period             | tickets_per_period (last 80 days)       | 1    |     |
//! | tickets-by-opening-time        | tickets_by_hour                         | 1    |     |
//! | satisfaction-and-opened-closed | monthly_satisfaction_average, opened_closed_monthly | 4 | |
//! | activities-hours               | activities_hours_to_charge, ticket_activities | 2 |     |
//! | activities-by-department       | activities_hours_by_department          | 1    |     |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use thiserror::Error;
use tracing::{Instrument, error, info, info_span};

use crate::api_client::{ApiClient, QueryParams, period_params, status_params};
use crate::app_config::AppConfig;
use crate::destinations::{Destination, DestinationBackend, PostgresDestination, TruncateTarget};
use crate::reports::ReportKind;
use crate::retry::RetryPolicy;
use crate::supervisor::{EndpointExtractor, EtlTask, RunSummary, Supervisor};

/// 🎫 Statuses pulled by `tickets-by-status`, in submission order.
pub const TICKET_STATUSES: [&str; 4] = ["Pendiente", "Abierto", "Asignado", "Listo para cierre"];

/// 📅 How far back `tickets-per-period` looks.
pub const PERIOD_LOOKBACK_DAYS: u64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    TicketStatus,
    TicketsByStatus,
    TicketsPerPeriod,
    TicketsByOpeningTime,
    SatisfactionAndOpenedClosed,
    ActivitiesHours,
    ActivitiesByDepartment,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("💀 Unknown pipeline '{name}'. Pick one of: {}", Pipeline::ALL.map(Pipeline::name).join(", "))]
pub struct UnknownPipeline {
    pub name: String,
}

impl Pipeline {
    pub const ALL: [Self; 7] = [
        Self::TicketStatus,
        Self::TicketsByStatus,
        Self::TicketsPerPeriod,
        Self::TicketsByOpeningTime,
        Self::SatisfactionAndOpenedClosed,
        Self::ActivitiesHours,
        Self::ActivitiesByDepartment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TicketStatus => "ticket-status",
            Self::TicketsByStatus => "tickets-by-status",
            Self::TicketsPerPeriod => "tickets-per-period",
            Self::TicketsByOpeningTime => "tickets-by-opening-time",
            Self::SatisfactionAndOpenedClosed => "satisfaction-and-opened-closed",
            Self::ActivitiesHours => "activities-hours",
            Self::ActivitiesByDepartment => "activities-by-department",
        }
    }

    /// 🧵 Worker count the pipeline runs with unless the config overrides it.
    pub fn pool_size(self) -> usize {
        match self {
            Self::TicketsByStatus | Self::SatisfactionAndOpenedClosed => 4,
            Self::ActivitiesHours => 2,
            _ => 1,
        }
    }

    /// 📋 The reports this pipeline runs, each with its query parameters.
    fn reports(self, today: NaiveDate) -> Vec<(String, ReportKind, QueryParams)> {
        let solo = |kind: ReportKind| (kind.name().to_string(), kind, QueryParams::new());
        match self {
            Self::TicketStatus => vec![solo(ReportKind::TicketStatus)],
            Self::TicketsByStatus => TICKET_STATUSES
                .iter()
                .map(|status| {
                    (
                        format!("tickets_by_status_{status}"),
                        ReportKind::Tickets,
                        status_params(status),
                    )
                })
                .collect(),
            Self::TicketsPerPeriod => {
                let start = today
                    .checked_sub_days(Days::new(PERIOD_LOOKBACK_DAYS))
                    .unwrap_or(NaiveDate::MIN);
                vec![(
                    ReportKind::TicketsPerPeriod.name().to_string(),
                    ReportKind::TicketsPerPeriod,
                    period_params(start, today),
                )]
            }
            Self::TicketsByOpeningTime => vec![solo(ReportKind::TicketsByHour)],
            Self::SatisfactionAndOpenedClosed => vec![
                solo(ReportKind::MonthlySatisfaction),
                solo(ReportKind::OpenedClosedMonthly),
            ],
            Self::ActivitiesHours => vec![
                solo(ReportKind::ActivitiesHoursToCharge),
                solo(ReportKind::TicketActivities),
            ],
            Self::ActivitiesByDepartment => vec![solo(ReportKind::ActivitiesByDepartment)],
        }
    }

    /// 🗺️ Build the run. `today` anchors the period window.
    pub fn plan(self, client: Arc<ApiClient>, today: NaiveDate) -> PipelinePlan {
        let tasks = self
            .reports(today)
            .into_iter()
            .map(|(label, kind, params)| {
                // -- 🧨 ticket_status has dependants, so it only goes down with CASCADE
                let target = if kind == ReportKind::TicketStatus {
                    TruncateTarget::cascading(kind.name())
                } else {
                    TruncateTarget::new(kind.name())
                };
                let extractor = EndpointExtractor::new(Arc::clone(&client), kind.endpoint(), params);
                EtlTask::new(label, target, extractor, kind)
            })
            .collect();

        PipelinePlan {
            pipeline: self,
            tasks,
            concurrency: self.pool_size(),
            refresh_sla: self == Self::TicketsByStatus,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pipeline {
    type Err = UnknownPipeline;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| UnknownPipeline { name: s.to_string() })
    }
}

/// 📋 Everything a run needs, minus the destination.
#[derive(Debug)]
pub struct PipelinePlan {
    pub pipeline: Pipeline,
    pub tasks: Vec<EtlTask>,
    pub concurrency: usize,
    pub refresh_sla: bool,
}

/// ⏳ How the SLA pass went, if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlaRefresh {
    NotRequested,
    Refreshed { rows: u64 },
    Failed { reason: String },
}

impl fmt::Display for SlaRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequested => f.write_str("not requested"),
            Self::Refreshed { rows } => write!(f, "refreshed ({rows} rows)"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// 📊 What a pipeline run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub pipeline: Pipeline,
    pub summary: RunSummary,
    pub sla: SlaRefresh,
}

/// 🚀 Run a plan against a destination. `concurrency` overrides the plan's pool size.
///
/// Only a truncate failure comes back as `Err`. Everything else is logged and summarized.
pub async fn execute<D: Destination>(
    plan: PipelinePlan,
    destination: D,
    concurrency: Option<usize>,
) -> Result<PipelineReport> {
    let pipeline = plan.pipeline;
    let span = info_span!("pipeline", name = %pipeline);
    async move {
        info!("🚀 starting pipeline {pipeline}");
        let mut supervisor = Supervisor::new(destination, Some(concurrency.unwrap_or(plan.concurrency)));
        let summary = supervisor.run(plan.tasks).await?;

        let sla = if plan.refresh_sla {
            match supervisor.destination_mut().refresh_sla_detail().await {
                Ok(rows) => {
                    info!("⏳ SLA detail rebuilt: {rows} row(s)");
                    SlaRefresh::Refreshed { rows }
                }
                Err(err) => {
                    error!("💀 SLA detail derivation failed: {err:#}");
                    SlaRefresh::Failed {
                        reason: format!("{err:#}"),
                    }
                }
            }
        } else {
            SlaRefresh::NotRequested
        };

        info!("🏁 pipeline {pipeline} finished");
        Ok::<_, anyhow::Error>(PipelineReport {
            pipeline,
            summary,
            sla,
        })
    }
    .instrument(span)
    .await
}

/// 🎬 The whole show: validate, connect, plan, execute.
pub async fn run_pipeline(pipeline: Pipeline, config: &AppConfig) -> Result<PipelineReport> {
    config.validate()?;

    let client = ApiClient::new(&config.api, RetryPolicy::from(&config.retry))
        .context("💀 Could not build the API client")?
        .with_span(info_span!("api_client", pipeline = %pipeline));
    let destination = PostgresDestination::connect(&config.database)
        .await?
        .with_span(info_span!("postgres", pipeline = %pipeline));

    let plan = pipeline.plan(Arc::new(client), Local::now().date_naive());
    execute(plan, DestinationBackend::Postgres(destination), config.runtime.concurrency).await
}
