//! Single-document generation: resolve the prompt, call the text service,
//! split the reply into posts.
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::GenerateError;
use crate::model::{GenerationResult, SourceDocument};
use crate::prompt::PromptTemplate;

/// Separator the prompt asks the model to put between posts.
pub const POST_DELIMITER: &str = "---";

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Split raw model output on every `---`, trim each piece and drop empty ones.
pub fn split_posts(raw: &str) -> Vec<String> {
    raw.split(POST_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// A hosted text-generation model reachable with prepared credentials.
#[async_trait]
pub trait TextService: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerateError>;
}

/// Anything that turns one document into posts. The batch orchestrator only
/// sees this seam.
#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate_posts(
        &self,
        document: &SourceDocument,
        template: &PromptTemplate,
    ) -> Result<GenerationResult, GenerateError>;
}

/// Generate posts for one document with an optional service handle.
/// `None` means generation is disabled.
#[instrument(skip_all, fields(document = %document.name))]
pub async fn generate(
    document: &SourceDocument,
    template: &PromptTemplate,
    service: Option<&dyn TextService>,
    max_output_tokens: u32,
) -> Result<GenerationResult, GenerateError> {
    if document.content.is_empty() {
        return Err(GenerateError::InvalidInput(format!(
            "document '{}' has no content",
            document.name
        )));
    }
    let service = service.ok_or(GenerateError::AuthNotConfigured)?;

    let prompt = template.resolve(&document.content);
    info!(prompt_len = prompt.len(), "calling generation service");
    let raw_text = service.generate_text(&prompt, max_output_tokens).await?;
    let posts = split_posts(&raw_text);
    info!(
        response_len = raw_text.len(),
        posts = posts.len(),
        "generation response received"
    );
    Ok(GenerationResult { raw_text, posts })
}

/// Calls the text service in-process with credentials loaded at startup.
#[derive(Clone)]
pub struct DirectGenerator {
    service: Option<Arc<dyn TextService>>,
    max_output_tokens: u32,
}

impl DirectGenerator {
    pub fn new(service: Option<Arc<dyn TextService>>, max_output_tokens: u32) -> Self {
        Self {
            service,
            max_output_tokens,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_MAX_OUTPUT_TOKENS)
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }
}

#[async_trait]
impl PostGenerator for DirectGenerator {
    async fn generate_posts(
        &self,
        document: &SourceDocument,
        template: &PromptTemplate,
    ) -> Result<GenerationResult, GenerateError> {
        generate(
            document,
            template,
            self.service.as_deref(),
            self.max_output_tokens,
        )
        .await
    }
}

/// Bounds each call of the wrapped generator. An elapsed call becomes an
/// upstream error; the underlying request is dropped.
pub struct WithTimeout<G> {
    inner: G,
    limit: Duration,
}

impl<G> WithTimeout<G> {
    pub fn new(inner: G, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<G: PostGenerator> PostGenerator for WithTimeout<G> {
    async fn generate_posts(
        &self,
        document: &SourceDocument,
        template: &PromptTemplate,
    ) -> Result<GenerationResult, GenerateError> {
        match tokio::time::timeout(self.limit, self.inner.generate_posts(document, template)).await
        {
            Ok(result) => result,
            Err(_) => {
                debug!(document = %document.name, "generation timed out");
                Err(GenerateError::upstream(
                    None,
                    format!("timed out after {:?}", self.limit),
                ))
            }
        }
    }
}
