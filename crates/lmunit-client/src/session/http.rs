//! reqwest-backed session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::error::{LmunitError, LmunitResult};
use crate::types::{ApiKey, ClientConfig, UnitTestRequest};

use super::{Reply, Transport};

pub const USER_AGENT_VALUE: &str = concat!("lmunit-client/", env!("CARGO_PKG_VERSION"));

/// HTTP session holding a pooled reqwest client between `start()` and `close()`.
#[derive(Debug)]
pub struct HttpSession {
    url: String,
    api_key: ApiKey,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpSession {
    pub fn new(config: &ClientConfig) -> LmunitResult<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().ok_or_else(|| LmunitError::Config {
            message: "api key is required".to_string(),
        })?;

        Ok(Self {
            url: config.url.clone(),
            api_key,
            timeout: config.request_timeout(),
            client: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_client(&self) -> LmunitResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose()))
            .map_err(|e| LmunitError::Config {
                message: format!("api key is not a valid header value: {}", e),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LmunitError::Transport {
                message: format!("failed to create HTTP client: {}", e),
            })
    }
}

#[async_trait]
impl Transport for HttpSession {
    async fn start(&mut self) -> LmunitResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        self.client = Some(self.build_client()?);
        debug!(url = %self.url, "session started");
        Ok(())
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(url = %self.url, "session closed");
        }
    }

    fn close_now(&mut self) {
        if self.client.take().is_some() {
            debug!(url = %self.url, "session dropped while running");
        }
    }

    fn is_started(&self) -> bool {
        self.client.is_some()
    }

    async fn post(&self, request: &UnitTestRequest) -> LmunitResult<Reply> {
        let client = self.client.as_ref().ok_or(LmunitError::NotStarted)?;

        let response = client.post(&self.url).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| LmunitError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(Reply { status, body })
    }
}
