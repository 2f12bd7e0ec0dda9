//! Loads wiki pages from disk. Only `.html` files are picked up; everything
//! else is skipped without complaint.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::model::SourceDocument;

pub const DOCUMENT_EXTENSION: &str = ".html";

pub fn is_supported(name: &str) -> bool {
    name.ends_with(DOCUMENT_EXTENSION)
}

/// Load the given files and directories in argument order. Directories are
/// walked recursively with entries sorted by path.
pub async fn load_paths(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    let mut files = Vec::new();
    for path in paths {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.is_dir() {
            collect_dir(path, &mut files).await?;
        } else {
            files.push(path.clone());
        }
    }

    let mut documents = Vec::new();
    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_supported(name) {
            debug!(file = %file.display(), "skipping unsupported file");
            continue;
        }
        let bytes = tokio::fs::read(&file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(file = %file.display(), "file is not valid UTF-8; invalid bytes replaced");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        documents.push(SourceDocument::new(name, content));
    }
    Ok(documents)
}

async fn collect_dir(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut stack = vec![dir.to_path_buf()];
    let mut found = Vec::new();
    while let Some(current) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("failed to list {}", current.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found.sort();
    out.extend(found);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_html_is_supported() {
        assert!(is_supported("Kosaka_Nao.html"));
        assert!(!is_supported("notes.txt"));
        assert!(!is_supported("page.htm"));
        assert!(!is_supported("page.HTML"));
    }

    #[tokio::test]
    async fn loads_files_and_directories_in_order() {
        let td = tempdir().unwrap();
        let wiki = td.path().join("wiki");
        std::fs::create_dir_all(wiki.join("nested")).unwrap();
        std::fs::write(wiki.join("b.html"), "<p>b</p>").unwrap();
        std::fs::write(wiki.join("a.html"), "<p>a</p>").unwrap();
        std::fs::write(wiki.join("readme.md"), "skip").unwrap();
        std::fs::write(wiki.join("nested").join("c.html"), "<p>c</p>").unwrap();
        let single = td.path().join("z.html");
        std::fs::write(&single, "<p>z</p>").unwrap();

        let docs = load_paths(&[single.clone(), wiki.clone()]).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["z.html", "a.html", "b.html", "c.html"]);
        assert_eq!(docs[1].content, "<p>a</p>");
        assert_eq!(docs[1].size, 8);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let td = tempdir().unwrap();
        std::fs::write(td.path().join("a.html"), "<p>a</p>").unwrap();
        std::fs::write(td.path().join("b.html"), b"<p>\xff\xfe caf\xe9</p>").unwrap();

        let docs = load_paths(&[td.path().to_path_buf()]).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "<p>a</p>");
        assert_eq!(docs[1].name, "b.html");
        assert_eq!(docs[1].content, "<p>\u{FFFD}\u{FFFD} caf\u{FFFD}</p>");
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let td = tempdir().unwrap();
        assert!(load_paths(&[td.path().join("nope")]).await.is_err());
    }
}
