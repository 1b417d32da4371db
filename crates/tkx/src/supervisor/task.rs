//! 🧩 Tasks: one extractor, one transformer, one target table.
//!
//! 🧠 Knowledge graph:
//! - [`Extractor`]: async, does the I/O, yields a [`Payload`].
//! - [`Transformer`]: sync, pure, turns a payload into a [`Table`].
//! - [`EtlTask`]: the pair plus a label and a target. The supervisor takes it from there.
//! - Both traits are `Send + Sync` because the bodies run on spawned tokio tasks.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::api_client::{ApiClient, Endpoint, QueryParams};
use crate::common::{Payload, Table};
use crate::destinations::TruncateTarget;
use crate::reports::ReportKind;

/// 📡 Something that fetches a payload.
#[async_trait]
pub trait Extractor: fmt::Debug + Send + Sync {
    async fn extract(&self) -> Result<Payload>;
}

/// 🔄 Something that shapes a payload into a table.
pub trait Transformer: fmt::Debug + Send + Sync {
    fn transform(&self, payload: Payload) -> Result<Table>;
}

/// 📡 One API endpoint with its query parameters, fetched through a shared client.
#[derive(Debug, Clone)]
pub struct EndpointExtractor {
    client: Arc<ApiClient>,
    endpoint: Endpoint,
    params: QueryParams,
}

impl EndpointExtractor {
    pub fn new(client: Arc<ApiClient>, endpoint: Endpoint, params: QueryParams) -> Self {
        Self {
            client,
            endpoint,
            params,
        }
    }
}

#[async_trait]
impl Extractor for EndpointExtractor {
    async fn extract(&self) -> Result<Payload> {
        // -- 🛟 fetch already swallows transport failures into an empty payload
        Ok(self.client.fetch(self.endpoint.name(), &self.params).await)
    }
}

impl Transformer for ReportKind {
    fn transform(&self, payload: Payload) -> Result<Table> {
        Ok(ReportKind::transform(*self, payload))
    }
}

/// 📋 A unit of work for the supervisor.
pub struct EtlTask {
    pub(crate) label: String,
    pub(crate) target: TruncateTarget,
    pub(crate) extractor: Box<dyn Extractor>,
    pub(crate) transformer: Box<dyn Transformer>,
}

impl EtlTask {
    pub fn new(
        label: impl Into<String>,
        target: TruncateTarget,
        extractor: impl Extractor + 'static,
        transformer: impl Transformer + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            target,
            extractor: Box::new(extractor),
            transformer: Box::new(transformer),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> &TruncateTarget {
        &self.target
    }
}

impl fmt::Debug for EtlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlTask")
            .field("label", &self.label)
            .field("target", &self.target.table)
            .field("extractor", &self.extractor)
            .field("transformer", &self.transformer)
            .finish()
    }
}

/// 🚦 Where a task is in its short life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Extracting,
    Transforming,
    Done { rows: usize },
    Failed { error: String },
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Extracting => f.write_str("extracting"),
            Self::Transforming => f.write_str("transforming"),
            Self::Done { rows } => write!(f, "done ({rows} rows)"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// 📥 What happened when the supervisor tried to load a task's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { rows: usize },
    SkippedEmpty,
    /// First line of the destination's error.
    LoadFailed { reason: String },
    /// The task failed before producing a table.
    NotLoaded,
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { rows } => write!(f, "loaded {rows}"),
            Self::SkippedEmpty => f.write_str("skipped (empty)"),
            Self::LoadFailed { reason } => write!(f, "load failed: {reason}"),
            Self::NotLoaded => f.write_str("not loaded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{ApiConfig, status_params};
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn the_one_where_the_endpoint_extractor_brings_back_the_goods() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/s3cr3t/showTicketsByStatus"))
            .and(query_param("status", "Abierto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiConfig {
            base_url: format!("{}/api/v1/", server.uri()),
            api_key: "s3cr3t".into(),
            timeout_secs: 5,
        };
        let retry = RetryPolicy {
            max_attempts: 1,
            multiplier: Duration::from_millis(1),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let client = Arc::new(ApiClient::new(&config, retry).expect("💀 client should build"));
        let extractor = EndpointExtractor::new(client, Endpoint::ShowTicketsByStatus, status_params("Abierto"));

        let payload = extractor.extract().await.expect("💀 extraction never fails outright");
        assert_eq!(payload.as_value(), &json!([{"id": 1}]));
    }

    #[test]
    fn the_one_where_states_and_outcomes_read_like_english() {
        assert_eq!(TaskState::Done { rows: 3 }.to_string(), "done (3 rows)");
        assert_eq!(LoadOutcome::SkippedEmpty.to_string(), "skipped (empty)");
        assert_eq!(
            LoadOutcome::LoadFailed { reason: "nope".into() }.to_string(),
            "load failed: nope"
        );
    }
}
