//! VCD OpenAPI client
//!
//! Thin JSON wrapper around the `/cloudapi` endpoints. Sessions are opened
//! once with [`VcdClient::authenticate`]; every request afterwards carries the
//! bearer token. Nothing here retries; asynchronous operations answered with
//! `202 Accepted` are followed to their task until it finishes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Default OpenAPI version requested in the `Accept` header
pub const DEFAULT_API_VERSION: &str = "40.0";

/// Header carrying the session token after a successful login
pub const ACCESS_TOKEN_HEADER: &str = "X-VMWARE-VCLOUD-ACCESS-TOKEN";

/// Page size used when walking paginated collections
const PAGE_SIZE: u32 = 128;

/// Maximum length of response body kept in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Delay between two task status polls
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls before a running task is reported as timed out
const TASK_MAX_POLLS: u32 = 300;

/// How the client obtains a session
#[derive(Clone)]
pub enum Credentials {
    /// Username and password, exchanged for a session token
    Password { user: String, password: String },
    /// Pre-issued bearer token
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

/// Connection settings for [`VcdClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint, with or without the trailing `/api`
    pub url: String,
    /// Organization used to log in; `System` for providers
    pub org: String,
    pub credentials: Credentials,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub api_version: String,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, org: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            org: org.into(),
            credentials,
            insecure: false,
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: format!("terraform-provider-vcd/{}", crate::VERSION),
        }
    }

    fn is_system_org(&self) -> bool {
        self.org.eq_ignore_ascii_case("system")
    }
}

/// One page of an OpenAPI collection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default)]
    page_count: u32,
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

/// Error body returned by the OpenAPI endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    minor_error_code: String,
    #[serde(default)]
    message: String,
}

/// The part of a legacy task record needed to follow it
#[derive(Debug, Deserialize)]
struct TaskStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    operation: String,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    config: ClientConfig,
    token: RwLock<Option<String>>,
}

/// Cloneable handle to a VCD endpoint
///
/// Clones share the connection pool and the session token.
#[derive(Clone)]
pub struct VcdClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for VcdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VcdClient")
            .field("base_url", &self.inner.base_url)
            .field("org", &self.inner.config.org)
            .finish()
    }
}

impl VcdClient {
    /// Build a client. No network traffic happens until [`authenticate`](Self::authenticate).
    pub fn new(config: ClientConfig) -> Result<Self> {
        let parsed = url::Url::parse(&config.url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let base_url = normalize_base_url(parsed.as_str());

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        let token = match &config.credentials {
            Credentials::Token(token) => Some(token.clone()),
            Credentials::Password { .. } => None,
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                config,
                token: RwLock::new(token),
            }),
        })
    }

    /// Endpoint root without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn org(&self) -> &str {
        &self.inner.config.org
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token.read().is_some()
    }

    /// Open a session when logging in with a password.
    ///
    /// Token credentials are used as-is.
    pub async fn authenticate(&self) -> Result<()> {
        let (user, password) = match &self.inner.config.credentials {
            Credentials::Token(_) => return Ok(()),
            Credentials::Password { user, password } => (user, password),
        };

        let session_path = if self.inner.config.is_system_org() {
            "1.0.0/sessions/provider"
        } else {
            "1.0.0/sessions"
        };
        let url = self.cloudapi_url(session_path);
        debug!("POST {} as {}@{}", url, user, self.inner.config.org);

        let response = self
            .inner
            .http
            .post(&url)
            .basic_auth(format!("{}@{}", user, self.inner.config.org), Some(password))
            .header(ACCEPT, self.accept_header())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Login failed: {} - {}", status, truncate(&body));
            return Err(Error::Auth(format!("login returned {}", status)));
        }

        let token = response
            .headers()
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Auth(format!("response is missing {}", ACCESS_TOKEN_HEADER)))?;

        *self.inner.token.write() = Some(token);
        Ok(())
    }

    /// Absolute URL for an OpenAPI path such as `1.0.0/orgs`
    pub fn cloudapi_url(&self, path: &str) -> String {
        format!("{}/cloudapi/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Absolute URL for a legacy `/api` path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn accept_header(&self) -> String {
        format!("application/json;version={}", self.inner.config.api_version)
    }

    fn legacy_accept_header(&self) -> String {
        format!("application/*+json;version={}", self.inner.config.api_version)
    }

    fn token(&self) -> Result<String> {
        self.inner
            .token
            .read()
            .clone()
            .ok_or_else(|| Error::Auth("client is not authenticated".to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.send_accepting(request, self.accept_header()).await
    }

    async fn send_accepting(&self, request: RequestBuilder, accept: String) -> Result<Response> {
        let response = request
            .bearer_auth(self.token()?)
            .header(ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("API error: {} - {}", status, truncate(&body));
        Err(api_error(status, &body))
    }

    /// GET a single OpenAPI object
    ///
    /// VCD answers 403 `ACCESS_TO_RESOURCE_IS_FORBIDDEN` for an ID that does
    /// not exist, so 403 is reported as not-found here like 404.
    pub async fn openapi_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.cloudapi_url(path);
        debug!("GET {}", url);
        let response = match self.send(self.inner.http.get(&url)).await {
            Ok(response) => response,
            Err(Error::Api { status: 403, .. }) => {
                debug!("GET {} returned 403, treating as not found", url);
                return Err(Error::not_found("OpenAPI item", path));
            }
            Err(err) => return Err(err),
        };
        Ok(response.json().await?)
    }

    /// GET every page of an OpenAPI collection, optionally filtered (FIQL)
    pub async fn openapi_get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.cloudapi_url(path);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            debug!("GET {} page {}", url, page);
            let mut request = self.inner.http.get(&url).query(&[
                ("page", page.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ]);
            if let Some(filter) = filter {
                request = request.query(&[("filter", filter)]);
            }

            let response: Page<T> = self.send(request).await?.json().await?;
            items.extend(response.values);

            if page >= response.page_count {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// POST a new OpenAPI object and return what the server stored
    pub async fn openapi_post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.cloudapi_url(path);
        debug!("POST {}", url);
        let response = self.send(self.inner.http.post(&url).json(body)).await?;
        parse_entity_body(response).await
    }

    /// POST to an endpoint that may run as a task.
    ///
    /// Returns `None` when the server answered `202 Accepted`; the task has
    /// then finished and the caller re-reads the entity.
    pub async fn openapi_post_or_task<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.cloudapi_url(path);
        debug!("POST {}", url);
        let response = self.send(self.inner.http.post(&url).json(body)).await?;
        self.entity_or_task(response).await
    }

    /// PUT an updated OpenAPI object
    pub async fn openapi_put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.cloudapi_url(path);
        debug!("PUT {}", url);
        let response = self.send(self.inner.http.put(&url).json(body)).await?;
        parse_entity_body(response).await
    }

    /// PUT to an endpoint that may run as a task; see [`openapi_post_or_task`](Self::openapi_post_or_task)
    pub async fn openapi_put_or_task<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.cloudapi_url(path);
        debug!("PUT {}", url);
        let response = self.send(self.inner.http.put(&url).json(body)).await?;
        self.entity_or_task(response).await
    }

    /// POST to an action link, discarding the response body
    pub async fn post_action(&self, url: &str) -> Result<()> {
        debug!("POST {}", url);
        let response = self.send(self.inner.http.post(url)).await?;
        self.finish_task(task_link(&response)).await
    }

    /// DELETE an OpenAPI object
    pub async fn openapi_delete(&self, path: &str) -> Result<()> {
        let url = self.cloudapi_url(path);
        debug!("DELETE {}", url);
        let response = self.send(self.inner.http.delete(&url)).await?;
        self.finish_task(task_link(&response)).await
    }

    async fn entity_or_task<T: DeserializeOwned>(&self, response: Response) -> Result<Option<T>> {
        if response.status() == StatusCode::ACCEPTED {
            self.finish_task(task_link(&response)).await?;
            return Ok(None);
        }
        parse_entity_body(response).await.map(Some)
    }

    /// Wait for the task named in the `Location` header of a 202 reply.
    ///
    /// Replies without a task link are treated as complete.
    async fn finish_task(&self, task_url: Option<String>) -> Result<()> {
        match task_url {
            Some(task_url) => self.wait_task(&task_url).await,
            None => Ok(()),
        }
    }

    /// Poll a task until it succeeds, fails or runs out of polls
    pub async fn wait_task(&self, task_url: &str) -> Result<()> {
        for poll in 0..TASK_MAX_POLLS {
            if poll > 0 {
                tokio::time::sleep(TASK_POLL_INTERVAL).await;
            }
            debug!("GET {} (task poll {})", task_url, poll + 1);
            let task: TaskStatus = self
                .send_accepting(self.inner.http.get(task_url), self.legacy_accept_header())
                .await?
                .json()
                .await?;

            match task.status.as_str() {
                "success" => return Ok(()),
                "error" | "aborted" | "canceled" => {
                    let message = task
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| format!("task ended with status '{}'", task.status));
                    error!("Task {} failed: {}", task.operation, message);
                    return Err(Error::Task {
                        operation: task.operation,
                        message,
                    });
                }
                _ => {}
            }
        }

        Err(Error::Task {
            operation: task_url.to_string(),
            message: format!("still running after {} polls", TASK_MAX_POLLS),
        })
    }
}

/// Task URL of a `202 Accepted` reply, if any
fn task_link(response: &Response) -> Option<String> {
    if response.status() != StatusCode::ACCEPTED {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Reduce a list lookup to exactly one match
pub(crate) fn single<T>(mut items: Vec<T>, kind: &str, field: &str, value: &str) -> Result<T> {
    match items.len() {
        0 => Err(Error::not_found(kind, value)),
        1 => Ok(items.remove(0)),
        _ => Err(Error::Ambiguous {
            kind: kind.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// FIQL equality filter, escaping the characters FIQL treats specially
pub(crate) fn eq_filter(field: &str, value: &str) -> String {
    let escaped: String = value
        .chars()
        .flat_map(|c| match c {
            ',' | ';' | '(' | ')' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect();
    format!("{}=={}", field, escaped)
}

async fn parse_entity_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(Error::UnexpectedResponse(format!("{} with empty body", status)));
    }
    Ok(serde_json::from_str(&body)?)
}

fn api_error(status: StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => {
            if parsed.minor_error_code.is_empty() {
                parsed.message
            } else {
                format!("{} ({})", parsed.message, parsed.minor_error_code)
            }
        }
        _ => truncate(body),
    };

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

fn truncate(body: &str) -> String {
    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    if cleaned.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... [truncated]", &cleaned[..MAX_ERROR_BODY_LENGTH])
    } else {
        cleaned
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/api")
        .unwrap_or(trimmed)
        .to_string()
}
