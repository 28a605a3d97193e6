//! WebUntis HTTP transport.
//!
//! WebUntis exposes two APIs on the same server: a JSON-RPC endpoint used for
//! login and logout, and the web UI's JSON API for everything else. The
//! session cookie set by the login authorizes the web API calls, so the
//! underlying HTTP client keeps a cookie store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use crate::domain::{ResourceType, TimetableFor, User, query_date};

use super::error::UntisError;
use super::source::UntisSource;
use super::types::{AuthParams, RawSession, RpcRequest, RpcResponse};

/// Requests allowed in flight at once unless configured otherwise.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default client name sent with the login.
const DEFAULT_CLIENT_ID: &str = "untis-client";

/// School year id used to look up the period grid.
const DEFAULT_SCHOOL_YEAR_ID: i64 = 2;

/// Configuration for the WebUntis client.
#[derive(Debug, Clone)]
pub struct UntisConfig {
    /// Login server, e.g. `neilo.webuntis.com`
    pub server: String,
    /// School name as registered in WebUntis
    pub school: String,
    /// Scheme and host the API paths are appended to (defaults to
    /// `https://{server}`)
    pub base_url: String,
    /// Client name sent with the login
    pub client_id: String,
    /// School year the period grid is read for
    pub school_year_id: i64,
    /// Requests allowed in flight at once
    pub max_concurrent: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl UntisConfig {
    /// Create a new config for a school on a login server.
    pub fn new(server: impl Into<String>, school: impl Into<String>) -> Self {
        let server = server.into();
        Self {
            base_url: format!("https://{server}"),
            server,
            school: school.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            school_year_id: DEFAULT_SCHOOL_YEAR_ID,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Client name sent with the login.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// School year the period grid is read for.
    pub fn with_school_year(mut self, school_year_id: i64) -> Self {
        self.school_year_id = school_year_id;
        self
    }

    /// Requests allowed in flight at once.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Per-request timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn rpc_url(&self) -> String {
        format!("{}/WebUntis/jsonrpc.do", self.base_url.trim_end_matches('/'))
    }

    fn web_url(&self) -> String {
        format!("{}/WebUntis/api/public", self.base_url.trim_end_matches('/'))
    }
}

/// HTTP implementation of [`UntisSource`].
///
/// Uses a semaphore to limit concurrent requests.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    rpc_url: String,
    web_url: String,
    school: String,
    client_id: String,
    school_year_id: i64,
    semaphore: Arc<Semaphore>,
    next_request_id: Arc<AtomicU64>,
}

impl HttpSource {
    /// Create a new transport with the given configuration.
    pub fn new(config: UntisConfig) -> Result<Self, UntisError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UntisError::transport("client", e))?;

        Ok(Self {
            http,
            rpc_url: config.rpc_url(),
            web_url: config.web_url(),
            school: config.school,
            client_id: config.client_id,
            school_year_id: config.school_year_id,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            next_request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn permit(&self, method: &str) -> Result<SemaphorePermit<'_>, UntisError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| UntisError::Transport {
                method: method.to_string(),
                status: None,
                message: "request limiter closed".to_string(),
            })
    }

    /// Call a JSON-RPC method and return its `result` member.
    async fn rpc<P: Serialize>(&self, method: &str, params: P) -> Result<Value, UntisError> {
        let _permit = self.permit(method).await?;

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(method, "JSON-RPC call");
        let response = self
            .http
            .post(&self.rpc_url)
            .query(&[("school", self.school.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| UntisError::transport(method, e))?;

        let body = success_body(method, response).await?;

        let envelope: RpcResponse = serde_json::from_str(&body)
            .map_err(|e| UntisError::protocol(method, format!("malformed JSON-RPC response: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(UntisError::Remote {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| UntisError::protocol(method, "missing `result`"))
    }

    /// GET a web API page and return its `data` member.
    async fn get_data(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UntisError> {
        let method = describe(path, query);
        let _permit = self.permit(&method).await?;

        debug!(method = %method, "web API request");
        let response = self
            .http
            .get(format!("{}/{}", self.web_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| UntisError::transport(&method, e))?;

        let body = success_body(&method, response).await?;

        let mut envelope: Value = serde_json::from_str(&body)
            .map_err(|e| UntisError::protocol(&method, format!("malformed JSON: {e}")))?;

        envelope
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| UntisError::protocol(&method, "missing `data`"))
    }

    /// GET a web API page and return the array stored under `member` of its
    /// `data`.
    async fn get_list(
        &self,
        path: &str,
        query: &[(&str, String)],
        member: &str,
    ) -> Result<Vec<Value>, UntisError> {
        let data = self.get_data(path, query).await?;
        take_array(data, member).ok_or_else(|| {
            UntisError::protocol(&describe(path, query), format!("missing `{member}`"))
        })
    }
}

impl UntisSource for HttpSource {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, UntisError> {
        let params = AuthParams {
            user: username,
            password,
            client: &self.client_id,
        };
        let result = self.rpc("authenticate", params).await?;
        let session: RawSession = parse(result, "authenticate")?;

        Ok(User {
            username: username.to_string(),
            session_id: session.session_id,
            person_type: session.person_type.and_then(ResourceType::from_code),
            person_id: session.person_id.unwrap_or_default(),
            class_id: session.klasse_id.filter(|id| *id > 0),
        })
    }

    async fn logout(&self) -> Result<(), UntisError> {
        self.rpc("logout", serde_json::json!({})).await?;
        Ok(())
    }

    async fn fetch_resource_list(&self, kind: ResourceType) -> Result<Vec<Value>, UntisError> {
        self.get_list(
            "timetable/weekly/pageconfig",
            &[("type", kind.code().to_string())],
            "elements",
        )
        .await
    }

    async fn fetch_period_grid(&self) -> Result<Vec<Value>, UntisError> {
        self.get_list(
            "timegrid",
            &[("schoolyearId", self.school_year_id.to_string())],
            "rows",
        )
        .await
    }

    async fn fetch_weekly_timetable(
        &self,
        target: TimetableFor,
        date: NaiveDate,
    ) -> Result<Value, UntisError> {
        self.get_data(
            "timetable/weekly/data",
            &[
                ("elementType", target.element_type().code().to_string()),
                ("elementId", target.element_id().to_string()),
                ("date", query_date(date)),
            ],
        )
        .await
    }

    async fn fetch_students(&self, class_id: Option<i64>) -> Result<Vec<Value>, UntisError> {
        let mut query = vec![("type", ResourceType::Student.code().to_string())];
        if let Some(id) = class_id {
            query.push(("filter.klasseOrStudentgroupId", format!("KL{id}")));
        }
        self.get_list("timetable/weekly/pageconfig", &query, "elements")
            .await
    }
}

/// Read the body of a response, failing on non-success statuses.
async fn success_body(method: &str, response: reqwest::Response) -> Result<String, UntisError> {
    let status = response.status();

    if !status.is_success() {
        return Err(UntisError::Transport {
            method: method.to_string(),
            status: Some(status.as_u16()),
            message: format!("HTTP {status}"),
        });
    }

    response
        .text()
        .await
        .map_err(|e| UntisError::transport(method, e))
}

fn take_array(mut data: Value, member: &str) -> Option<Vec<Value>> {
    match data.get_mut(member).map(Value::take) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn parse<T: DeserializeOwned>(value: Value, method: &str) -> Result<T, UntisError> {
    serde_json::from_value(value).map_err(|e| UntisError::protocol(method, e.to_string()))
}

/// Operation name used in errors, e.g. `timetable/weekly/pageconfig?type=2`.
fn describe(path: &str, query: &[(&str, String)]) -> String {
    let params: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if params.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", params.join("&"))
    }
}
