use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use wiki_tweets::batch::{run_batch, NoProgress};
use wiki_tweets::error::{BatchError, GenerateError};
use wiki_tweets::generate::PostGenerator;
use wiki_tweets::model::{GenerationResult, Progress, SourceDocument};
use wiki_tweets::prompt::PromptTemplate;

type Reply = Result<Vec<String>, GenerateError>;

#[derive(Clone, Default)]
struct RecordingGenerator {
    responses: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingGenerator {
    fn with_responses(responses: Vec<Reply>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn pop_response(&self) -> Reply {
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(vec!["post".into()]))
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PostGenerator for RecordingGenerator {
    async fn generate_posts(
        &self,
        document: &SourceDocument,
        _template: &PromptTemplate,
    ) -> Result<GenerationResult, GenerateError> {
        self.calls.lock().await.push(document.name.clone());
        let posts = self.pop_response().await?;
        Ok(GenerationResult {
            raw_text: posts.join("\n---\n"),
            posts,
        })
    }
}

fn docs(names: &[&str]) -> Vec<SourceDocument> {
    names
        .iter()
        .map(|name| SourceDocument::new(*name, format!("<p>{name}</p>")))
        .collect()
}

#[tokio::test]
async fn results_follow_input_order() {
    let generator = RecordingGenerator::with_responses(vec![
        Ok(vec!["a1".into(), "a2".into()]),
        Ok(vec!["b1".into()]),
        Ok(vec![]),
    ]);
    let documents = docs(&["a.html", "b.html", "c.html"]);

    let outcome = run_batch(
        &documents,
        &PromptTemplate::default(),
        &generator,
        &mut NoProgress,
    )
    .await
    .unwrap();

    let names: Vec<_> = outcome
        .results
        .iter()
        .map(|entry| entry.document_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.html", "b.html", "c.html"]);
    assert_eq!(outcome.results[0].posts, vec!["a1", "a2"]);
    assert!(outcome.results[2].posts.is_empty());
    assert_eq!(outcome.total_posts(), 3);
    assert!(outcome.last_error.is_none());
    assert_eq!(generator.calls().await, vec!["a.html", "b.html", "c.html"]);
}

#[tokio::test]
async fn failed_document_is_skipped_and_reported() {
    let generator = RecordingGenerator::with_responses(vec![
        Ok(vec!["a1".into()]),
        Err(GenerateError::upstream(Some(429), "quota exceeded")),
        Ok(vec!["c1".into()]),
    ]);
    let documents = docs(&["a.html", "b.html", "c.html"]);

    let outcome = run_batch(
        &documents,
        &PromptTemplate::default(),
        &generator,
        &mut NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].document_name, "a.html");
    assert_eq!(outcome.results[1].document_name, "c.html");
    assert_eq!(
        outcome.last_error.as_deref(),
        Some("generation service error 429: quota exceeded")
    );
    // every document was still attempted
    assert_eq!(generator.calls().await.len(), 3);
}

#[tokio::test]
async fn last_error_wins() {
    let generator = RecordingGenerator::with_responses(vec![
        Err(GenerateError::InvalidInput("first".into())),
        Ok(vec!["b1".into()]),
        Err(GenerateError::AuthNotConfigured),
    ]);
    let documents = docs(&["a.html", "b.html", "c.html"]);

    let outcome = run_batch(
        &documents,
        &PromptTemplate::default(),
        &generator,
        &mut NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(
        outcome.last_error,
        Some(GenerateError::AuthNotConfigured.to_string())
    );
}

#[tokio::test]
async fn empty_batch_is_rejected_without_calls() {
    let generator = RecordingGenerator::default();
    let err = run_batch(&[], &PromptTemplate::default(), &generator, &mut NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::NoInput));
    assert!(generator.calls().await.is_empty());
}

#[tokio::test]
async fn progress_is_reported_before_each_call() {
    let generator = RecordingGenerator::default();
    let documents = docs(&["x.html", "y.html"]);
    let seen: Arc<std::sync::Mutex<Vec<(Progress, usize)>>> = Default::default();

    let calls = generator.calls.clone();
    let sink = seen.clone();
    let mut observer = move |progress: &Progress| {
        // calls made so far, checked without awaiting
        let made = calls.try_lock().map(|c| c.len()).unwrap_or(usize::MAX);
        sink.lock().unwrap().push((progress.clone(), made));
    };

    run_batch(
        &documents,
        &PromptTemplate::default(),
        &generator,
        &mut observer,
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (
                Progress { current: 1, total: 2, name: "x.html".into() },
                0
            ),
            (
                Progress { current: 2, total: 2, name: "y.html".into() },
                1
            ),
        ]
    );
}
