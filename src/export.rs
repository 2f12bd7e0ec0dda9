//! Flat JSON export and plain-text rendering of batch results.
use serde::{Deserialize, Serialize};

use crate::documents::DOCUMENT_EXTENSION;
use crate::model::{DocumentPosts, SourceDocument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportRecord {
    pub id: u64,
    pub ip: String,
    pub content: String,
}

/// Label for a document's posts: the file name with its first `.html` removed.
pub fn ip_from_filename(name: &str) -> String {
    name.replacen(DOCUMENT_EXTENSION, "", 1)
}

/// One record per post, ids counting up from 1 across the whole batch.
pub fn flatten(results: &[DocumentPosts]) -> Vec<ExportRecord> {
    results
        .iter()
        .flat_map(|entry| {
            let ip = ip_from_filename(&entry.document_name);
            entry.posts.iter().map(move |post| (ip.clone(), post))
        })
        .zip(1u64..)
        .map(|((ip, post), id)| ExportRecord {
            id,
            ip,
            content: post.clone(),
        })
        .collect()
}

/// Default export file name for the loaded documents.
pub fn export_filename(documents: &[SourceDocument]) -> String {
    match documents {
        [] => "tweets.json".to_string(),
        [only] => only.name.replacen(DOCUMENT_EXTENSION, ".json", 1),
        [first, ..] => first.name.replacen(DOCUMENT_EXTENSION, "_etc.json", 1),
    }
}

/// Human-readable dump of every post, grouped by document.
pub fn render_text(results: &[DocumentPosts]) -> String {
    results
        .iter()
        .map(|entry| {
            format!(
                "=== {} ===\n\n{}",
                entry.document_name,
                entry.posts.join("\n\n---\n\n")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n\n")
}
