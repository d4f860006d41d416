use async_trait::async_trait;
use models::{CategoryKey, CategorySnapshot, SaveResponse, Settings};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{PersistenceError, Result};
use crate::store::ProjectionStore;

/// Bulk wipe endpoint, relative to the API base.
pub const CLEAR_ALL_PATH: &str = "api/clear-all-projection-data";

/// Client for the per-category REST API.
///
/// Reads are sent without credentials; `PUT` and the bulk `DELETE` carry the
/// bearer token when one is configured.
#[derive(Debug, Clone)]
pub struct HttpProjectionStore {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpProjectionStore {
    pub fn new(settings: &Settings) -> Result<Self> {
        let base_url = parse_base_url(&settings.api_base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: settings.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, category: CategoryKey) -> Result<Url> {
        self.join(&format!("api/{}", category.as_str()))
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PersistenceError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // A trailing slash keeps any path prefix when joining endpoints.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|e| PersistenceError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PersistenceError::InvalidUrl(format!(
            "unsupported scheme '{other}' in {raw}"
        ))),
    }
}

#[async_trait]
impl ProjectionStore for HttpProjectionStore {
    async fn load(&self, category: CategoryKey) -> Result<CategorySnapshot> {
        let endpoint = self.endpoint(category)?;
        debug!(%endpoint, "GET category");
        let value: Value = self
            .http
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(CategorySnapshot::from_value(category, value)?)
    }

    async fn save(&self, category: CategoryKey, snapshot: CategorySnapshot) -> Result<CategorySnapshot> {
        let endpoint = self.endpoint(category)?;
        debug!(%endpoint, "PUT category");
        let response = self
            .authorize(self.http.put(endpoint))
            .json(&snapshot)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistenceError::Status {
                category: category.to_string(),
                status: status.as_u16(),
            });
        }

        let body: SaveResponse = response.json().await?;
        if !body.success {
            return Err(PersistenceError::Rejected(category));
        }
        Ok(CategorySnapshot::from_value(category, body.data)?)
    }

    async fn clear_all(&self) -> Result<()> {
        let endpoint = self.join(CLEAR_ALL_PATH)?;
        debug!(%endpoint, "DELETE all projection data");
        let response = self.authorize(self.http.delete(endpoint)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PersistenceError::Status {
                category: "clear-all-projection-data".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
