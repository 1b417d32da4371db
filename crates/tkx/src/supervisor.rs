//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where endpoints time out..."
//! 🎬 "One supervisor dared to load them all. Sequentially. In completion order."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor: part middle manager, part helicopter parent. It runs a batch of
//! [`EtlTask`]s against one [`Destination`]:
//!
//! 1. 🧹 Truncate every distinct target, once, before anything is fetched. If that
//!    fails, the run fails. Nothing was fetched, so there is nothing to save.
//! 2. 🧵 Spawn every task. A semaphore caps how many extract+transform at once.
//! 3. 🛡️ A task that errors or panics is logged with its label and left out.
//!    Its siblings carry on like nothing happened. (Something happened.)
//! 4. 📥 Load the survivors one at a time, in the order they finished. Empty tables get
//!    a warning instead of an INSERT. A failed load gets its first line logged and is
//!    swallowed.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::common::Table;
use crate::destinations::{Destination, TruncateTarget};

pub mod task;

pub use task::{EndpointExtractor, EtlTask, Extractor, LoadOutcome, TaskState, Transformer};

/// 📋 How one task ended, and what became of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub label: String,
    pub target: String,
    pub state: TaskState,
    pub load: LoadOutcome,
}

/// 📊 The post-game report. One entry per task, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    pub fn outcome(&self, label: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.label == label)
    }

    pub fn rows_loaded(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.load {
                LoadOutcome::Loaded { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_tasks(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, TaskState::Failed { .. }))
            .count()
    }
}

/// 📦 Owns the destination for the length of a run, hands it back afterwards.
#[derive(Debug)]
pub struct Supervisor<D> {
    destination: D,
    concurrency: Option<usize>,
    span: Span,
}

/// 🧹 Distinct targets in first-seen order. A table asked for with CASCADE anywhere gets CASCADE.
fn distinct_targets(tasks: &[EtlTask]) -> Vec<TruncateTarget> {
    let mut targets: Vec<TruncateTarget> = Vec::new();
    for task in tasks {
        match targets.iter_mut().find(|t| t.table == task.target.table) {
            Some(existing) => existing.cascade |= task.target.cascade,
            None => targets.push(task.target.clone()),
        }
    }
    targets
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn first_line(err: &anyhow::Error) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}

async fn set_state(states: &Mutex<Vec<TaskState>>, index: usize, state: TaskState) {
    if let Some(slot) = states.lock().await.get_mut(index) {
        *slot = state;
    }
}

impl<D: Destination> Supervisor<D> {
    /// 🚀 `concurrency` caps simultaneous extract+transform. `None` means "all of them".
    pub fn new(destination: D, concurrency: Option<usize>) -> Self {
        Self {
            destination,
            concurrency,
            span: info_span!("supervisor"),
        }
    }

    /// 🔭 Swap the tracing span this supervisor logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn destination_mut(&mut self) -> &mut D {
        &mut self.destination
    }

    pub fn into_destination(self) -> D {
        self.destination
    }

    /// 🧵 Run every task. Only a truncate failure makes this return `Err`.
    pub async fn run(&mut self, tasks: Vec<EtlTask>) -> Result<RunSummary> {
        let span = self.span.clone();
        self.run_inner(tasks).instrument(span).await
    }

    async fn run_inner(&mut self, tasks: Vec<EtlTask>) -> Result<RunSummary> {
        let targets = distinct_targets(&tasks);
        self.destination
            .truncate(&targets)
            .await
            .context("💀 Could not truncate the target tables. Nothing was fetched, nothing was loaded.")?;

        let permits = self.concurrency.unwrap_or(tasks.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let states = Arc::new(Mutex::new(vec![TaskState::Pending; tasks.len()]));
        let mut meta: Vec<(String, String)> = Vec::with_capacity(tasks.len());
        let mut by_id = HashMap::new();
        let mut running = JoinSet::new();

        info!("🚀 starting {} task(s), at most {permits} at a time", tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let EtlTask {
                label,
                target,
                extractor,
                transformer,
            } = task;
            let semaphore = Arc::clone(&semaphore);
            let states = Arc::clone(&states);
            let task_span = info_span!("task", label = %label);

            let handle = running.spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .context("💀 the semaphore closed under us")?;
                    set_state(&states, index, TaskState::Extracting).await;
                    debug!("📡 extracting");
                    let payload = extractor.extract().await?;
                    set_state(&states, index, TaskState::Transforming).await;
                    debug!("🔄 transforming");
                    let table = transformer.transform(payload)?;
                    Ok::<Table, anyhow::Error>(table)
                }
                .instrument(task_span),
            );
            by_id.insert(handle.id(), index);
            meta.push((label, target.table));
        }

        // -- 🏁 settle in completion order. whoever finishes first loads first.
        let mut finished: Vec<(usize, Table)> = Vec::new();
        while let Some(joined) = running.join_next_with_id().await {
            match joined {
                Ok((id, Ok(table))) => {
                    let Some(&index) = by_id.get(&id) else { continue };
                    info!("✅ [{}] produced {} row(s)", meta[index].0, table.row_count());
                    set_state(&states, index, TaskState::Done { rows: table.row_count() }).await;
                    finished.push((index, table));
                }
                Ok((id, Err(err))) => {
                    let Some(&index) = by_id.get(&id) else { continue };
                    error!("💀 [{}] task failed: {err:#}", meta[index].0);
                    set_state(&states, index, TaskState::Failed { error: format!("{err:#}") }).await;
                }
                Err(join_err) => {
                    let Some(&index) = by_id.get(&join_err.id()) else { continue };
                    let error = if join_err.is_panic() {
                        format!("panicked: {}", panic_message(join_err.into_panic().as_ref()))
                    } else {
                        "cancelled".to_string()
                    };
                    error!("💀 [{}] task {error}", meta[index].0);
                    set_state(&states, index, TaskState::Failed { error }).await;
                }
            }
        }

        let mut loads = vec![LoadOutcome::NotLoaded; meta.len()];
        for (index, table) in finished {
            let (label, target) = &meta[index];
            loads[index] = if table.is_empty() {
                warn!("⚠️ [{label}] nothing to load into {target}. Skipping.");
                LoadOutcome::SkippedEmpty
            } else {
                match self.destination.append(target, &table).await {
                    Ok(()) => {
                        info!("📥 [{label}] loaded {} row(s) into {target}", table.row_count());
                        LoadOutcome::Loaded { rows: table.row_count() }
                    }
                    Err(err) => {
                        let reason = first_line(&err);
                        error!("❌ [{label}] could not load into {target}: {reason}");
                        LoadOutcome::LoadFailed { reason }
                    }
                }
            };
        }

        let states = states.lock().await.clone();
        let outcomes = meta
            .into_iter()
            .zip(states)
            .zip(loads)
            .map(|(((label, target), state), load)| TaskOutcome {
                label,
                target,
                state,
                load,
            })
            .collect();
        Ok(RunSummary { outcomes })
    }
}
