// ai
//! 📡 The API client: one logical GET, five chances, zero tantrums.
//!
//! 🎬 COLD OPEN. INT. NETWORK STACK, 6:00 AM, CRON O'CLOCK
//!
//! The scheduler fires. A request heads out to the ticketing API carrying a bearer
//! token and high hopes. Sometimes it comes back with JSON. Sometimes with a 502 and
//! a shrug. Either way, this module makes sure the pipeline keeps walking.
//!
//! 🧠 Knowledge graph:
//! - [`ApiClient::request`]: the low-level primitive. Wrapped in a [`RetryPolicy`].
//!   Exhaustion propagates the last [`FetchError`] to the caller.
//! - [`ApiClient::fetch`]: the high-level wrapper. Catches everything, logs it, and
//!   hands back [`Payload::empty`]. An unreachable API and an API with no rows look
//!   the same from here on; only the logs know the difference. That's the policy.
//! - URL shape: `{base_url}{api_key}/{endpoint}`. Yes, the key is a path segment.
//!   Yes, it's also the bearer token. The API wants both. We don't argue with APIs.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, Span, error, info, info_span};

use crate::common::Payload;
use crate::retry::RetryPolicy;

/// 🔧 Where the API lives and how to knock.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// 📡 Base URL, trailing slash included. The key gets glued straight on.
    #[serde(default)]
    pub base_url: String,
    /// 🔒 Doubles as the bearer token and a path segment.
    #[serde(default)]
    pub api_key: String,
    /// ⏱️ Per-request timeout. 60s, because some reports are slow and we are patient.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 📚 Every endpoint the ETL knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListTicketStatus,
    ShowTicketsByStatus,
    ShowTicketsPerPeriod,
    OpenedVersusClosedMonthly,
    TicketsByOpeningTime,
    ActivitiesHoursByDepartment,
    MonthlySatisfactionAverage,
    ListTicketsActivities,
    ActivitiesHoursToCharge,
}

impl Endpoint {
    /// The path segment the API knows this endpoint by.
    pub fn name(self) -> &'static str {
        match self {
            Self::ListTicketStatus => "listTicketStatus",
            Self::ShowTicketsByStatus => "showTicketsByStatus",
            Self::ShowTicketsPerPeriod => "showTicketsPerPeriod",
            Self::OpenedVersusClosedMonthly => "openedVersusClosedMonthly",
            Self::TicketsByOpeningTime => "ticketsByOpeningTime",
            Self::ActivitiesHoursByDepartment => "activitiesHoursByDepartment",
            Self::MonthlySatisfactionAverage => "monthlySatisfactionAverage",
            Self::ListTicketsActivities => "listTicketsActivities",
            Self::ActivitiesHoursToCharge => "activitiesHoursToCharge",
        }
    }
}

/// 🏷️ Named query parameters, in the order they go on the wire.
pub type QueryParams = Vec<(String, String)>;

/// 🎯 `?status=...` for `showTicketsByStatus`.
pub fn status_params(status: &str) -> QueryParams {
    vec![("status".to_string(), status.to_string())]
}

/// 📅 `?start=YYYY-MM-DD&end=YYYY-MM-DD` for `showTicketsPerPeriod`.
pub fn period_params(start: NaiveDate, end: NaiveDate) -> QueryParams {
    vec![
        ("start".to_string(), start.format("%Y-%m-%d").to_string()),
        ("end".to_string(), end.format("%Y-%m-%d").to_string()),
    ]
}

/// 💀 Everything that can go wrong between "GET" and "here's your JSON".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// 🔁 Connection trouble, timeouts and HTTP error statuses earn a retry.
    /// A body that isn't JSON will still not be JSON in four seconds.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

/// 📡 The resilient fetch client. Cheap to share behind an `Arc`: the inner
/// `reqwest::Client` pools connections across every task in a run.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    span: Span,
}

impl ApiClient {
    /// 🚀 Build the HTTP client with the configured timeout. No network I/O happens here.
    pub fn new(config: &ApiConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            retry,
            span: info_span!("api_client"),
        })
    }

    /// 🔭 Swap the tracing span this client logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 🔗 `{base_url}{api_key}/{endpoint}`. Plain concatenation, on purpose.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}/{}", self.base_url, self.api_key, endpoint)
    }

    /// 🔁 GET `url` with `params`, retrying transient failures per the policy.
    /// On exhaustion the last error comes back to you. Handle with care.
    pub async fn request(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        self.retry
            .run(|_| self.request_once(url, params), FetchError::is_transient)
            .instrument(self.span.clone())
            .await
    }

    async fn request_once(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        let parsed = if params.is_empty() {
            reqwest::Url::parse(url)
        } else {
            reqwest::Url::parse_with_params(url, params)
        }
        .map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// 📦 Fetch one endpoint. Never fails: exhausted retries and bad bodies are logged
    /// and degrade to an empty payload, so one flaky endpoint can't sink the run.
    pub async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> Payload {
        let url = self.endpoint_url(endpoint);
        let outcome = self.request(&url, params).await;
        self.span.in_scope(|| match outcome {
            Ok(value) => {
                info!("✅ Fetched data from endpoint '{endpoint}'.");
                Payload::new(value)
            }
            Err(err) => {
                error!("❌ Could not fetch data from '{endpoint}': {err}");
                Payload::empty()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "s3cr3t";

    fn speedy_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            multiplier: Duration::from_millis(1),
            min_delay: Duration::from_millis(4),
            max_delay: Duration::from_millis(10),
        }
    }

    fn client_for(server_uri: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: format!("{server_uri}/api/v1/"),
            api_key: KEY.to_string(),
            timeout_secs: 5,
        };
        ApiClient::new(&config, speedy_retry())
            .expect("💀 reqwest client should build in tests. The TLS gods are merciful here.")
    }

    async fn request_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    #[test]
    fn the_one_where_the_url_is_glued_together_like_the_api_wants() {
        let client = client_for("http://tickets.example");
        assert_eq!(
            client.endpoint_url(Endpoint::ListTicketStatus.name()),
            "http://tickets.example/api/v1/s3cr3t/listTicketStatus"
        );
    }

    #[test]
    fn the_one_where_period_params_speak_iso_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2024, 3, 25).expect("valid date");
        assert_eq!(
            period_params(start, end),
            vec![
                ("start".to_string(), "2024-01-05".to_string()),
                ("end".to_string(), "2024-03-25".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn the_one_where_bearer_auth_and_query_params_arrive_intact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/{KEY}/showTicketsByStatus")))
            .and(header("Authorization", format!("Bearer {KEY}").as_str()))
            .and(query_param("status", "Abierto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let payload = client_for(&server.uri())
            .fetch(Endpoint::ShowTicketsByStatus.name(), &status_params("Abierto"))
            .await;

        assert_eq!(payload.as_value(), &json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn the_one_where_two_hiccups_then_success_costs_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let payload = client_for(&server.uri())
            .fetch(Endpoint::ListTicketStatus.name(), &[])
            .await;

        assert_eq!(payload.as_value(), &json!({"status": "ok"}));
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn the_one_where_five_strikes_means_an_empty_payload_not_a_crash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let payload = client.fetch(Endpoint::ListTicketStatus.name(), &[]).await;

        assert!(payload.is_empty());
        assert_eq!(request_count(&server).await, 5);
    }

    #[tokio::test]
    async fn the_one_where_the_low_level_request_lets_the_last_error_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.endpoint_url("nope");
        let err = client
            .request(&url, &[])
            .await
            .expect_err("💀 a 404 five times in a row should not turn into Ok");

        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
        assert_eq!(request_count(&server).await, 5);
    }

    #[tokio::test]
    async fn the_one_where_garbage_json_is_not_worth_a_second_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>surprise</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.endpoint_url(Endpoint::TicketsByOpeningTime.name());
        let err = client
            .request(&url, &[])
            .await
            .expect_err("💀 HTML is not JSON, no matter how hard it believes");

        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(!err.is_transient());
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_home_and_we_still_go_home_politely() {
        // 🔌 port 1 on localhost: reserved, unloved, and (almost certainly) closed
        let client = client_for("http://127.0.0.1:1");
        let url = client.endpoint_url(Endpoint::ListTicketStatus.name());
        let err = client
            .request(&url, &[])
            .await
            .expect_err("💀 nothing listens on port 1. if it does, we have bigger problems");
        assert!(err.is_transient());

        assert!(client.fetch(Endpoint::ListTicketStatus.name(), &[]).await.is_empty());
    }
}
