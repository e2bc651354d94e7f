//! Downstream HTTP client used by the response agent.
//!
//! Every outcome, including failure, becomes reply content:
//!   JSON body        → its "message" field
//!   non-JSON body    → {"status_code", "text"}
//!   no response      → {"error"}

use std::time::Duration;

use mqbridge_core::payload;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    /// Connection refused, timeout, or the body could not be read.
    #[error("{0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("downstream answered {status_code} with a non-JSON body")]
    Undecodable { status_code: u16, text: String },
}

impl DownstreamError {
    pub fn to_reply_content(&self) -> Value {
        match self {
            DownstreamError::Unreachable(e) => payload::downstream_error(&e.to_string()),
            DownstreamError::Undecodable { status_code, text } => {
                payload::undecodable_response(*status_code, text)
            }
        }
    }
}

pub struct HttpDownstream {
    client: reqwest::Client,
    url: String,
}

impl HttpDownstream {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the request as JSON and decode the response body.
    pub async fn call(&self, request: &Value) -> Result<Value, DownstreamError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status_code = response.status().as_u16();
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|_| DownstreamError::Undecodable { status_code, text })
    }

    /// Forward a request and turn whatever happens into reply content.
    pub async fn reply_content(&self, request: &Value) -> Value {
        match self.call(request).await {
            Ok(body) => payload::extract_message(&body),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "downstream call failed");
                e.to_reply_content()
            }
        }
    }
}
