use tracing::{info, instrument, warn};

use crate::error::BatchError;
use crate::generate::PostGenerator;
use crate::model::{BatchResult, DocumentPosts, Progress, SourceDocument};
use crate::prompt::PromptTemplate;

/// Receives a notification before each document is sent.
pub trait ProgressObserver {
    fn on_progress(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Ignores progress.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: BatchResult,
    /// Message of the most recent failure; earlier failures are overwritten.
    pub last_error: Option<String>,
}

impl BatchOutcome {
    pub fn total_posts(&self) -> usize {
        self.results.iter().map(|entry| entry.posts.len()).sum()
    }
}

/// Send every document through `generator`, one at a time and in order.
/// A failed document is logged, replaces `last_error` and the batch moves on.
#[instrument(skip_all, fields(documents = documents.len()))]
pub async fn run_batch(
    documents: &[SourceDocument],
    template: &PromptTemplate,
    generator: &dyn PostGenerator,
    observer: &mut dyn ProgressObserver,
) -> Result<BatchOutcome, BatchError> {
    if documents.is_empty() {
        return Err(BatchError::NoInput);
    }

    let total = documents.len();
    let mut outcome = BatchOutcome::default();
    for (index, document) in documents.iter().enumerate() {
        observer.on_progress(&Progress {
            current: index + 1,
            total,
            name: document.name.clone(),
        });

        match generator.generate_posts(document, template).await {
            Ok(result) => {
                info!(
                    document = %document.name,
                    posts = result.posts.len(),
                    "document generated"
                );
                outcome.results.push(DocumentPosts {
                    document_name: document.name.clone(),
                    posts: result.posts,
                });
            }
            Err(err) => {
                warn!(%err, document = %document.name, "document failed; continuing");
                outcome.last_error = Some(err.to_string());
            }
        }
    }

    info!(
        succeeded = outcome.results.len(),
        total,
        posts = outcome.total_posts(),
        "batch finished"
    );
    Ok(outcome)
}
