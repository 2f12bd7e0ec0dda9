use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::debug;

use crate::error::GenerateError;
use crate::generate::{split_posts, PostGenerator};
use crate::model::{GenerationResult, SourceDocument};
use crate::prompt::PromptTemplate;

/// Generates posts through a running server's `/api/generate`.
#[derive(Clone)]
pub struct RemoteGenerator {
    http: Client,
    endpoint: Url,
}

impl fmt::Debug for RemoteGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGenerator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RemoteReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    tweets: Option<Vec<String>>,
    #[serde(default)]
    raw_response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RemoteGenerator {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000/`.
    pub fn new(base_url: Url) -> Result<Self> {
        let endpoint = base_url
            .join("api/generate")
            .context("invalid server URL")?;
        let http = Client::builder()
            .user_agent(concat!("wiki-tweets/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PostGenerator for RemoteGenerator {
    async fn generate_posts(
        &self,
        document: &SourceDocument,
        template: &PromptTemplate,
    ) -> Result<GenerationResult, GenerateError> {
        let body = json!({
            "htmlContent": document.content,
            "prompt": template.as_str(),
        });
        debug!(url = %self.endpoint, document = %document.name, "posting to generate endpoint");
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerateError::upstream(None, format!("failed to reach server: {err}")))?;

        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        let reply: Option<RemoteReply> = serde_json::from_str(&text).ok();

        if status.is_success() {
            if let Some(RemoteReply { success: true, tweets, raw_response, .. }) = reply {
                let raw_text = raw_response.unwrap_or_default();
                let posts = tweets.unwrap_or_else(|| split_posts(&raw_text));
                return Ok(GenerationResult { raw_text, posts });
            }
        }

        let message = reply
            .and_then(|r| r.error)
            .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });
        Err(match status {
            StatusCode::BAD_REQUEST => GenerateError::InvalidInput(message),
            StatusCode::SERVICE_UNAVAILABLE => GenerateError::AuthNotConfigured,
            _ => GenerateError::upstream(Some(status.as_u16()), message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_api_path() {
        let remote = RemoteGenerator::new(Url::parse("http://localhost:3000/").unwrap()).unwrap();
        assert_eq!(remote.endpoint().as_str(), "http://localhost:3000/api/generate");
    }

    #[test]
    fn reply_tolerates_error_shape() {
        let reply: RemoteReply =
            serde_json::from_str(r#"{"error": "missing HTML content (htmlContent)"}"#).unwrap();
        assert!(!reply.success);
        assert!(reply.tweets.is_none());
        assert_eq!(reply.error.as_deref(), Some("missing HTML content (htmlContent)"));
    }
}
