//! Shared HTTP client for the REST pollers.

use crate::error::{PollError, PollResult};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = "rpi-crypto-ticker-display/1.0";

/// Thin wrapper over `reqwest::Client` with status and timeout mapping.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> PollResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PollError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> PollResult<T> {
        let response = self.send(url, query).await?;
        let body = response.text().await.map_err(|e| map_transport(url, e))?;
        serde_json::from_str(&body)
            .map_err(|e| PollError::Parse(format!("{url}: {e}")))
    }

    /// GET a plain-text body, trimmed.
    pub async fn get_text(&self, url: &str) -> PollResult<String> {
        let response = self.send(url, &[]).await?;
        let body = response.text().await.map_err(|e| map_transport(url, e))?;
        Ok(body.trim().to_string())
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> PollResult<Response> {
        trace!(%url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport(url, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PollError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }
        Ok(response)
    }
}

fn map_transport(url: &str, e: reqwest::Error) -> PollError {
    if e.is_timeout() {
        PollError::Timeout(url.to_string())
    } else {
        PollError::HttpClient(format!("{url}: {e}"))
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
