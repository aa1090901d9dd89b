//! Transport between the hook and the session endpoint.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::{
    client::error::ClientError,
    config::ClientConfig,
    models::wire::{ActivateResponse, CheckResponse},
};

/// The two calls the hook makes.
///
/// Implementations return the server's response body as-is; a server-side
/// failure with a readable `error` must come back as an `ActivateResponse`
/// with `success: false` (for `activate`) or `ClientError::Rejected`
/// (for `check`).
pub trait SessionTransport: Send + Sync {
    fn check(&self) -> impl Future<Output = Result<CheckResponse, ClientError>> + Send;

    fn activate(
        &self,
        code: &str,
        module_id: Option<&str>,
    ) -> impl Future<Output = Result<ActivateResponse, ClientError>> + Send;
}

/// JSON-over-HTTPS transport.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `Authorization: Bearer <api key>` when an API key is configured
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint = Url::parse(&config.endpoint_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, body: serde_json::Value) -> Result<(StatusCode, String), ClientError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        Ok((status, text))
    }
}

/// Pull the `error` string out of a failure body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ActivateResponse>(body)
        .ok()
        .and_then(|response| response.error)
}

fn parse_success<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|_| ClientError::MalformedResponse)
}

impl SessionTransport for HttpTransport {
    async fn check(&self) -> Result<CheckResponse, ClientError> {
        let (status, body) = self.post(json!({ "action": "check" })).await?;

        if status.is_success() {
            return parse_success(&body);
        }

        Err(match error_message(&body) {
            Some(message) => ClientError::Rejected(message),
            None => ClientError::UnexpectedResponse {
                status: status.as_u16(),
            },
        })
    }

    async fn activate(
        &self,
        code: &str,
        module_id: Option<&str>,
    ) -> Result<ActivateResponse, ClientError> {
        let mut payload = json!({ "action": "activate", "code": code });
        if let Some(module_id) = module_id {
            payload["module_id"] = json!(module_id);
        }

        let (status, body) = self.post(payload).await?;

        if status.is_success() {
            return parse_success(&body);
        }

        // Failure bodies share the activate shape; keep the server's text
        match serde_json::from_str::<ActivateResponse>(&body) {
            Ok(response) if response.error.is_some() => Ok(response),
            _ => Err(ClientError::UnexpectedResponse {
                status: status.as_u16(),
            }),
        }
    }
}
