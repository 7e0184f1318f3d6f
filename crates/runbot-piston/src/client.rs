use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tokio::time::sleep;

use crate::{
    retry::{is_retryable_status, is_retryable_transport, retry_after, RetryPolicy},
    CodeExecutor, ExecuteRequest, ExecutionResult, PistonError, Runtime,
};

#[derive(Debug, Clone)]
/// Public struct `PistonConfig` used across runbot components.
pub struct PistonConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
/// HTTP client for the Piston v2 API (`/runtimes`, `/execute`).
pub struct PistonClient {
    client: reqwest::Client,
    config: PistonConfig,
}

#[derive(Debug, Deserialize)]
struct PistonMessageBody {
    message: String,
}

impl PistonClient {
    pub fn new(config: PistonConfig) -> Result<Self, PistonError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("runbot"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Sends the request built by `build`, retrying retryable statuses and transport errors.
    /// Returns the final status and body; non-success statuses are left to the caller.
    async fn send_with_retry<F>(&self, build: F) -> Result<(u16, String), PistonError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            let delay = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let hint = retry_after(response.headers());
                    let raw = response.text().await?;
                    if status.is_success()
                        || !is_retryable_status(status)
                        || !policy.allows_retry_after(attempt)
                    {
                        return Ok((status.as_u16(), raw));
                    }
                    let delay = policy.delay(attempt, hint);
                    tracing::debug!(
                        status = status.as_u16(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        "retrying execution backend request"
                    );
                    delay
                }
                Err(error) => {
                    if !is_retryable_transport(&error) || !policy.allows_retry_after(attempt) {
                        return Err(PistonError::Http(error));
                    }
                    let delay = policy.delay(attempt, None);
                    tracing::debug!(
                        %error,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "retrying execution backend request after transport error"
                    );
                    delay
                }
            };
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl CodeExecutor for PistonClient {
    async fn runtimes(&self) -> Result<Vec<Runtime>, PistonError> {
        let url = self.url("runtimes");
        let (status, raw) = self.send_with_retry(|| self.client.get(&url)).await?;
        if !(200..300).contains(&status) {
            return Err(PistonError::HttpStatus { status, body: raw });
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn execute(&self, request: ExecuteRequest) -> Result<ExecutionResult, PistonError> {
        let url = self.url("execute");
        let (status, raw) = self
            .send_with_retry(|| self.client.post(&url).json(&request))
            .await?;
        if (200..300).contains(&status) {
            return Ok(serde_json::from_str(&raw)?);
        }
        // Structural errors such as an unknown language come back as 4xx with a message.
        if (400..500).contains(&status) {
            if let Ok(body) = serde_json::from_str::<PistonMessageBody>(&raw) {
                return Ok(ExecutionResult {
                    message: Some(body.message),
                    ..ExecutionResult::default()
                });
            }
        }
        Err(PistonError::HttpStatus { status, body: raw })
    }
}

#[cfg(test)]
mod tests {
    use super::{PistonClient, PistonConfig};
    use crate::RetryPolicy;

    #[test]
    fn unit_url_joins_paths_without_duplicate_slashes() {
        let client = PistonClient::new(PistonConfig {
            api_base: "https://emkc.org/api/v2/piston/".to_string(),
            request_timeout_ms: 1_000,
            retry: RetryPolicy::no_retries(),
        })
        .expect("client");
        assert_eq!(
            client.url("execute"),
            "https://emkc.org/api/v2/piston/execute"
        );
    }
}
