use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::credentials::{self, CredentialError, Credentials, TokenProvider};
use crate::error::GenerateError;
use crate::generate::TextService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexTarget {
    pub project_id: String,
    pub location: String,
    pub model: String,
}

impl VertexTarget {
    /// `projects/{p}/locations/{l}/publishers/google/models/{m}:generateContent`
    pub fn generate_content_path(&self) -> String {
        format!(
            "v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.project_id, self.location, self.model
        )
    }
}

/// Regional Vertex AI host, e.g. `https://asia-northeast1-aiplatform.googleapis.com/`.
pub fn regional_base_url(location: &str) -> Result<Url> {
    Url::parse(&format!("https://{}-aiplatform.googleapis.com/", location))
        .with_context(|| format!("invalid Vertex location '{}'", location))
}

/// Authenticated handle to one Gemini model on Vertex AI. Built once at
/// startup and shared by every request.
pub struct VertexClient {
    http: Client,
    base_url: Url,
    target: VertexTarget,
    tokens: TokenProvider,
}

impl fmt::Debug for VertexClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexClient")
            .field("base_url", &self.base_url)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VertexClient {
    pub fn new(credentials: Credentials, location: &str, model: &str) -> Result<Self, ConnectError> {
        let base_url = regional_base_url(location)?;
        Self::with_base_url(credentials, location, model, base_url)
    }

    pub fn with_base_url(
        credentials: Credentials,
        location: &str,
        model: &str,
        base_url: Url,
    ) -> Result<Self, ConnectError> {
        let http = Client::builder()
            .user_agent(concat!("wiki-tweets/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        let target = VertexTarget {
            project_id: credentials.project_id().to_string(),
            location: location.to_string(),
            model: model.to_string(),
        };
        let tokens = TokenProvider::new(http.clone(), credentials)?;
        Ok(Self {
            http,
            base_url,
            target,
            tokens,
        })
    }

    pub fn target(&self) -> &VertexTarget {
        &self.target
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn build_request(&self, token: &str, body: &Value) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&self.target.generate_content_path())
            .context("invalid Vertex base URL")?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .context("failed to build Vertex request")
    }

    async fn execute_generate(&self, body: Value) -> Result<String, GenerateError> {
        let token = self.tokens.bearer().await?;
        let request = self
            .build_request(&token, &body)
            .map_err(|err| GenerateError::upstream(None, format!("{err:#}")))?;
        debug!(url = %request.url(), model = %self.target.model, "sending vertex request");

        let res = self
            .http
            .execute(request)
            .await
            .map_err(|err| GenerateError::upstream(None, format!("failed to reach Vertex AI: {err}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Vertex AI returned an error");
            return Err(GenerateError::upstream(
                Some(status.as_u16()),
                error_message(&body),
            ));
        }

        let payload: GenerateContentResponse = res
            .json()
            .await
            .map_err(|err| GenerateError::upstream(None, format!("invalid Vertex AI response: {err}")))?;
        let text = payload
            .text()
            .ok_or_else(|| GenerateError::upstream(None, "response contained no text"))?;
        info!(response_len = text.len(), "Vertex AI response received");
        Ok(text)
    }
}

/// Resolve credentials and build the client. `None` means generation stays
/// disabled; the reason has already been logged.
pub fn connect(cfg: &Config) -> Option<VertexClient> {
    let resolved = credentials::resolve(&cfg.credential_path())?;
    match VertexClient::new(resolved.credentials, &cfg.vertex.location, &cfg.vertex.model) {
        Ok(client) => {
            info!(
                project = %client.target.project_id,
                location = %client.target.location,
                model = %client.target.model,
                "Vertex AI client ready"
            );
            Some(client)
        }
        Err(err) => {
            error!(%err, "failed to prepare Vertex AI client; generation disabled");
            None
        }
    }
}

#[async_trait]
impl TextService for VertexClient {
    async fn generate_text(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        let body = build_generate_request(prompt, max_output_tokens);
        self.execute_generate(body).await
    }
}

pub fn build_generate_request(prompt: &str, max_output_tokens: u32) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [ { "text": prompt } ]
            }
        ],
        "generationConfig": {
            "maxOutputTokens": max_output_tokens,
        }
    })
}

/// Pull `error.message` out of a Google error envelope, or return the raw body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; `None` when there are none.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if texts.is_empty() {
            return None;
        }
        Some(texts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_client() -> VertexClient {
        let creds = Credentials::AccessToken {
            project_id: "proj-1".into(),
            token: "ya29.t".into(),
        };
        VertexClient::new(creds, "asia-northeast1", "gemini-2.5-flash").unwrap()
    }

    #[test]
    fn build_generate_request_shape() {
        let body = build_generate_request("hello", 8192);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn build_request_sets_headers_and_path() {
        let client = token_client();
        let body = json!({ "sample": true });
        let request = client.build_request("ya29.t", &body).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().host_str(),
            Some("asia-northeast1-aiplatform.googleapis.com")
        );
        assert_eq!(
            request.url().path(),
            "/v1/projects/proj-1/locations/asia-northeast1/publishers/google/models/gemini-2.5-flash:generateContent"
        );
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer ya29.t"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn response_text_concatenates_parts() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [ { "text": "a---" }, { "text": "b" } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }))
        .unwrap();
        assert_eq!(payload.text().as_deref(), Some("a---b"));
    }

    #[test]
    fn response_without_text_is_none() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [ { "finishReason": "SAFETY" } ]
        }))
        .unwrap();
        assert!(payload.text().is_none());

        let payload: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(payload.text().is_none());
    }

    #[test]
    fn error_message_reads_google_envelope() {
        let body = r#"{"error":{"code":404,"message":"Publisher model not found","status":"NOT_FOUND"}}"#;
        assert_eq!(error_message(body), "Publisher model not found");
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn debug_does_not_leak_token() {
        let printed = format!("{:?}", token_client());
        assert!(printed.contains("proj-1"));
        assert!(!printed.contains("ya29.t"));
    }
}
