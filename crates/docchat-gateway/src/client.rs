//! HTTP implementation of the query and upload gateways.

use crate::query::{QueryGateway, QueryReply, QueryRequest, decode_reply_body};
use crate::upload::{UploadGateway, UploadOutcome, UploadRequest};
use async_trait::async_trait;
use docchat_core::auth::AuthContext;
use docchat_core::config::BackendConfig;
use docchat_core::error::{DocChatError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

/// Client for the RAG backend HTTP API.
///
/// Holds one connection pool with the configured per-request deadline, so a
/// hung backend surfaces as a transport failure instead of an upload or
/// query that loads forever.
#[derive(Clone)]
pub struct RagApiClient {
    client: Client,
    base_url: String,
    auth: Option<AuthContext>,
}

impl RagApiClient {
    /// Creates a client from backend configuration.
    ///
    /// # Errors
    ///
    /// Returns an `Internal` error if the underlying HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| DocChatError::internal(format!("failed to build HTTP client: {}", err)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: None,
        })
    }

    /// Attaches an authentication context; its bearer token is sent with
    /// every request.
    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = Some(auth);
        self
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => builder.bearer_auth(auth.bearer()),
            None => builder,
        }
    }
}

#[async_trait]
impl QueryGateway for RagApiClient {
    async fn submit_query(&self, text: &str) -> QueryReply {
        let request = QueryRequest {
            text: text.to_string(),
        };
        let builder = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&request);

        let response = match self.authorize(builder).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("query request failed: {}", err);
                return QueryReply::Transport {
                    reason: err.to_string(),
                };
            }
        };

        // The backend signals application failures inside the body, not via
        // the status line, so the body is decoded regardless of status.
        match response.text().await {
            Ok(body) => decode_reply_body(&body),
            Err(err) => QueryReply::Transport {
                reason: format!("failed to read response body: {}", err),
            },
        }
    }
}

#[derive(Deserialize)]
struct FailureBody {
    detail: String,
}

#[async_trait]
impl UploadGateway for RagApiClient {
    async fn submit_upload(&self, request: UploadRequest) -> UploadOutcome {
        let part = match Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
        {
            Ok(part) => part,
            Err(err) => {
                return UploadOutcome::Failed {
                    reason: format!("invalid MIME type '{}': {}", request.mime_type, err),
                };
            }
        };
        let form = Form::new().part("file", part);
        let builder = self
            .client
            .post(format!("{}/upload-document", self.base_url))
            .multipart(form);

        let response = match self.authorize(builder).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("upload request failed: {}", err);
                return UploadOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            return UploadOutcome::Accepted;
        }

        // Prefer the server-supplied `detail`; fall back to the status line.
        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<FailureBody>(&body)
            .map(|failure| failure.detail)
            .unwrap_or_else(|_| status_line(status));
        UploadOutcome::Failed { reason }
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:8006/".to_string(),
            ..BackendConfig::default()
        };
        let client = RagApiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8006");
    }

    #[test]
    fn test_status_line_includes_reason() {
        assert_eq!(status_line(StatusCode::SERVICE_UNAVAILABLE), "503 Service Unavailable");
    }
}
