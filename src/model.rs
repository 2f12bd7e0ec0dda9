use serde::{Deserialize, Serialize};

/// Posts longer than this are flagged as over the limit. Counted in `char`s,
/// not UTF-16 units, so an emoji counts once.
pub const POST_CHAR_LIMIT: usize = 280;
/// Posts longer than this (but within the limit) are flagged as close to it.
pub const POST_CHAR_WARNING: usize = 250;

/// One uploaded wiki page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub content: String,
    pub size: usize,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len(),
            content,
        }
    }
}

/// Model output for one document: the verbatim text and the posts split from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationResult {
    pub raw_text: String,
    pub posts: Vec<String>,
}

/// Posts generated for one document of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentPosts {
    pub document_name: String,
    pub posts: Vec<String>,
}

/// Ordered per-document results of one batch run.
pub type BatchResult = Vec<DocumentPosts>;

/// Emitted before each document of a batch is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LengthStatus {
    Ok,
    NearLimit,
    OverLimit,
}

impl LengthStatus {
    /// Classify a post by its character count. Nothing is truncated.
    pub fn of(post: &str) -> Self {
        let chars = post.chars().count();
        if chars > POST_CHAR_LIMIT {
            LengthStatus::OverLimit
        } else if chars > POST_CHAR_WARNING {
            LengthStatus::NearLimit
        } else {
            LengthStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthStatus::Ok => "ok",
            LengthStatus::NearLimit => "near_limit",
            LengthStatus::OverLimit => "over_limit",
        }
    }
}
