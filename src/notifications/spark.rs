//! Spark messages API client

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::credentials::Token;
use crate::error::DispatchError;
use crate::interpolate::{interpolate_opt, Environment};

use super::message::{Message, MessageFormat, Target};

/// Messages endpoint of the Spark REST API
pub const DEFAULT_ENDPOINT: &str = "https://api.ciscospark.com/v1/messages";

/// Connect and request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one message to one target.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Post `message` to `target` and hand back the response status.
    ///
    /// `message` is interpolated against `env` first when an environment is
    /// given. Any status is returned as-is; only failures to get a response
    /// at all are errors.
    async fn send(
        &self,
        target: &Target,
        message: &str,
        format: MessageFormat,
        token: &Token,
        env: Option<&Environment>,
    ) -> Result<StatusCode, DispatchError>;
}

/// HTTP dispatcher for the Spark messages API
#[derive(Debug, Clone)]
pub struct SparkClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SparkClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Dispatcher for SparkClient {
    async fn send(
        &self,
        target: &Target,
        message: &str,
        format: MessageFormat,
        token: &Token,
        env: Option<&Environment>,
    ) -> Result<StatusCode, DispatchError> {
        let body = interpolate_opt(message, env);
        let payload = Message::new(target.id.as_str(), body, format)?;

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", token.secret()))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        debug!(
            endpoint = %self.endpoint,
            room_id = %target.id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Spark message posted"
        );

        Ok(status)
    }
}
