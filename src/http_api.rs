use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, HttpApiConfig};
use crate::domain::{Department, Job, JobItem, Location, LOCATION_TYPE_ROOM};
use crate::error::PortError;
use crate::facility_api::FacilityApi;

const PAGE_SIZE: u32 = 100;

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Problem document returned by the facility API on failure.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: u32,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationsPage {
    page_info: PageInfo,
    #[serde(default)]
    items: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
struct Token {
    access_token: String,
    expires_in: u64,
    /// Epoch milliseconds, as a string.
    issued_at: String,
}

impl Token {
    fn is_valid(&self, now: SystemTime) -> bool {
        let Ok(issued_ms) = self.issued_at.parse::<u64>() else {
            return false;
        };
        // An expiry past the representable clock range never expires.
        UNIX_EPOCH
            .checked_add(Duration::from_millis(issued_ms))
            .and_then(|t| t.checked_add(Duration::from_secs(self.expires_in)))
            .map_or(true, |expires| now < expires)
    }
}

struct Inner {
    client: Client,
    root: String,
    retry_max: u32,
    retry_backoff: Duration,
    request_timeout: Duration,
    auth: Option<AuthConfig>,
    token: Mutex<Option<Token>>,
}

/// Facility API client over HTTP.
///
/// Every request carries a bearer token when auth is configured; the token is
/// fetched with the client-credentials grant and reused until it expires.
/// Transport failures and 5xx responses are retried up to `retry_max` times.
#[derive(Clone)]
pub struct HttpFacilityApi {
    inner: Arc<Inner>,
}

impl HttpFacilityApi {
    /// # Errors
    ///
    /// Returns `PortError::Config` if the base URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &HttpApiConfig) -> Result<Self, PortError> {
        let base_url = config.base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(PortError::Config("base url is required".to_string()));
        }
        let api_version = if config.api_version.is_empty() {
            "v1"
        } else {
            config.api_version.as_str()
        };
        let client = Client::builder()
            .build()
            .map_err(|e| PortError::Config(format!("http client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                root: format!("{base_url}/api/{api_version}"),
                retry_max: config.retry_max,
                retry_backoff: config.retry_backoff,
                request_timeout: config.request_timeout,
                auth: config.auth.clone(),
                token: Mutex::new(None),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.root)
    }

    async fn bearer(&self) -> Result<Option<String>, PortError> {
        let Some(auth) = &self.inner.auth else {
            return Ok(None);
        };
        let mut cached = self.inner.token.lock().await;
        if let Some(tok) = cached.as_ref().filter(|t| t.is_valid(SystemTime::now())) {
            return Ok(Some(tok.access_token.clone()));
        }

        debug!(url = %auth.auth_url, "requesting access token");
        let response = self
            .inner
            .client
            .post(&auth.auth_url)
            .form(&[
                ("client_id", auth.client_id.as_str()),
                ("client_secret", auth.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", "openapi"),
            ])
            .timeout(self.inner.request_timeout)
            .send()
            .await
            .map_err(|e| PortError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Auth(format!(
                "token request returned {}",
                status.as_u16()
            )));
        }
        let token: Token = response
            .json()
            .await
            .map_err(|e| PortError::Auth(format!("invalid token response: {e}")))?;
        info!(expires_in = token.expires_in, "access token refreshed");
        let access = token.access_token.clone();
        *cached = Some(token);
        Ok(Some(access))
    }

    /// Send a request, retrying transport failures and 5xx responses.
    async fn send<F>(&self, build: F) -> Result<Response, PortError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut req = build(&self.inner.client).timeout(self.inner.request_timeout);
            if let Some(token) = self.bearer().await? {
                req = req.bearer_auth(token);
            }

            let outcome = req.send().await;
            let retryable = match &outcome {
                Ok(resp) => resp.status().is_server_error(),
                Err(_) => true,
            };
            if !retryable || attempt >= self.inner.retry_max {
                return outcome.map_err(|e| PortError::Transport(format!("request failed: {e}")));
            }

            attempt += 1;
            match &outcome {
                Ok(resp) => warn!(status = resp.status().as_u16(), attempt, "retrying request"),
                Err(e) => warn!(error = %e, attempt, "retrying request"),
            }
            tokio::time::sleep(self.inner.retry_backoff * attempt).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PortError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.send(|c| c.get(&url)).await?;
        parse_response(response).await
    }

    async fn get_location_by_id(&self, id: i64) -> Result<Location, PortError> {
        self.get_json(&format!("/locations/{id}")).await
    }

    async fn get_locations_page(
        &self,
        cursor: u32,
        location_type: Option<&str>,
    ) -> Result<LocationsPage, PortError> {
        let url = self.url("/locations");
        let mut query: Vec<(&str, String)> = vec![
            ("first", PAGE_SIZE.to_string()),
            ("next", cursor.to_string()),
        ];
        if let Some(t) = location_type {
            query.push(("locationType", t.to_string()));
        }
        debug!(%url, cursor, ?location_type, "GET locations page");
        let response = self.send(|c| c.get(&url).query(&query)).await?;
        parse_response(response).await
    }

    /// Walk every page of locations, keeping the children of `floor_id`.
    async fn floor_children(
        &self,
        floor_id: i64,
        location_type: Option<&str>,
    ) -> Result<Vec<Location>, PortError> {
        let mut children = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self.get_locations_page(cursor, location_type).await?;
            children.extend(page.items.into_iter().filter(|l| l.is_child_of(floor_id)));
            if !page.page_info.has_next_page {
                break;
            }
            if page.page_info.end_cursor <= cursor {
                return Err(PortError::Decode(format!(
                    "pagination cursor did not advance past {cursor}"
                )));
            }
            cursor = page.page_info.end_cursor;
        }
        Ok(children)
    }
}

/// Decode a 2xx body as `T`; turn anything else into a `PortError::Api`.
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, PortError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| PortError::Decode(e.to_string()));
    }
    let body = response
        .text()
        .await
        .map_err(|e| PortError::Transport(format!("failed to read response body: {e}")))?;
    Err(api_error(status.as_u16(), &body))
}

/// The API emits problem documents with trailing commas, which strict JSON
/// rejects, so those are stripped before parsing.
fn api_error(status: u16, body: &str) -> PortError {
    let cleaned = TRAILING_COMMA.replace_all(body, "$1");
    let message = match serde_json::from_str::<ErrorResponse>(&cleaned) {
        Ok(problem) => format!("{}: {}", problem.title, problem.detail),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    };
    PortError::Api { status, message }
}

#[async_trait]
impl FacilityApi for HttpFacilityApi {
    async fn get_department_by_id(&self, id: i64) -> Result<Department, PortError> {
        self.get_json(&format!("/departments/{id}")).await
    }

    async fn get_job_item_by_id(&self, id: i64) -> Result<JobItem, PortError> {
        self.get_json(&format!("/jobitems/{id}")).await
    }

    async fn get_locations_by_ids(&self, ids: &[i64]) -> Result<Vec<Location>, PortError> {
        let mut join_set: JoinSet<(usize, Result<Location, PortError>)> = JoinSet::new();
        for (idx, &id) in ids.iter().enumerate() {
            let api = self.clone();
            join_set.spawn(async move { (idx, api.get_location_by_id(id).await) });
        }

        let mut found: Vec<(usize, Location)> = Vec::with_capacity(ids.len());
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) =
                joined.map_err(|e| PortError::Transport(format!("lookup task failed: {e}")))?;
            match result {
                Ok(location) => found.push((idx, location)),
                Err(e) => {
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }
        found.sort_by_key(|(idx, _)| *idx);
        Ok(found.into_iter().map(|(_, l)| l).collect())
    }

    async fn get_floor_rooms(&self, floor_id: i64) -> Result<Vec<Location>, PortError> {
        self.floor_children(floor_id, Some(LOCATION_TYPE_ROOM)).await
    }

    async fn get_floor_locations(&self, floor_id: i64) -> Result<Vec<Location>, PortError> {
        self.floor_children(floor_id, None).await
    }

    async fn create_job(&self, job: &Job) -> Result<serde_json::Value, PortError> {
        let url = self.url("/jobs");
        info!(action = %job.action, locations = job.locations.len(), "submitting job");
        let response = self.send(|c| c.post(&url).json(job)).await?;
        parse_response(response).await
    }
}
