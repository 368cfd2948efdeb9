//! Front-matter annotation of exported text files.

use std::io;
use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat};
use tracing::{debug, instrument};

use crate::catalog::CatalogNode;

const DELIMITER: &str = "---";

/// Metadata block prepended to an exported text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// Document title.
    pub title: String,
    /// Document slug.
    pub url: String,
    /// Document content id.
    pub doc_id: u64,
    /// Owning knowledge base id.
    pub book_id: u64,
    /// Creation timestamp as reported by the service.
    pub created_at: String,
    /// Last update timestamp as reported by the service.
    pub updated_at: String,
    /// Local time of the export, RFC 3339.
    pub exported_at: String,
}

impl FrontMatter {
    /// Front matter for `node`, stamped with `exported_at`.
    #[must_use]
    pub fn for_document(node: &CatalogNode, exported_at: DateTime<Local>) -> Self {
        Self {
            title: node.title.clone(),
            url: node.slug.clone(),
            doc_id: node.content_id,
            book_id: node.book_id,
            created_at: node.created_at.clone(),
            updated_at: node.updated_at.clone(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    /// Renders the block, closing delimiter and blank separator line included.
    ///
    /// String values are emitted as double-quoted scalars so titles with
    /// colons or quotes stay valid YAML.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{DELIMITER}\n\
             title: {title}\n\
             url: {url}\n\
             doc_id: {doc_id}\n\
             book_id: {book_id}\n\
             created_at: {created_at}\n\
             updated_at: {updated_at}\n\
             exported_at: {exported_at}\n\
             {DELIMITER}\n\n",
            title = quoted(&self.title),
            url = quoted(&self.url),
            doc_id = self.doc_id,
            book_id = self.book_id,
            created_at = quoted(&self.created_at),
            updated_at = quoted(&self.updated_at),
            exported_at = quoted(&self.exported_at),
        )
    }
}

fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// What [`annotate`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// The block was prepended.
    Inserted,
    /// The file already starts with a front-matter delimiter.
    AlreadyPresent,
    /// There is no file to annotate.
    MissingFile,
}

/// Prepends `front_matter` to the file at `path` unless it already has one.
///
/// Running it twice on the same file inserts the block at most once.
///
/// # Errors
///
/// Returns the I/O error if the file exists but cannot be read or rewritten.
#[instrument(level = "debug", skip(front_matter), fields(path = %path.display()))]
pub async fn annotate(path: &Path, front_matter: &FrontMatter) -> io::Result<Annotation> {
    let existing = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("no file to annotate");
            return Ok(Annotation::MissingFile);
        }
        Err(error) => return Err(error),
    };

    if existing.starts_with(DELIMITER.as_bytes()) {
        debug!("front matter already present");
        return Ok(Annotation::AlreadyPresent);
    }

    let mut annotated = front_matter.render().into_bytes();
    annotated.extend_from_slice(&existing);
    tokio::fs::write(path, annotated).await?;
    Ok(Annotation::Inserted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::NodeKind;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn front_matter() -> FrontMatter {
        let mut node = CatalogNode::new("B", "A", NodeKind::Document, "Intro: \"basics\"")
            .with_content_id(7)
            .with_book_id(42);
        node.slug = "intro".to_string();
        node.created_at = "2024-01-01T00:00:00.000Z".to_string();
        node.updated_at = "2024-02-01T00:00:00.000Z".to_string();
        let exported_at = Local.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        FrontMatter::for_document(&node, exported_at)
    }

    #[test]
    fn test_render_has_all_fields_between_delimiters() {
        let rendered = front_matter().render();
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.ends_with("---\n\n"));
        assert!(rendered.contains("title: \"Intro: \\\"basics\\\"\"\n"));
        assert!(rendered.contains("url: \"intro\"\n"));
        assert!(rendered.contains("doc_id: 7\n"));
        assert!(rendered.contains("book_id: 42\n"));
        assert!(rendered.contains("created_at: \"2024-01-01T00:00:00.000Z\"\n"));
        assert!(rendered.contains("exported_at: \"2026-10-18T12:00:00"));
    }

    #[test]
    fn test_render_field_order_is_stable() {
        let front = FrontMatter {
            title: "Intro".to_string(),
            url: "intro".to_string(),
            doc_id: 7,
            book_id: 42,
            created_at: "c".to_string(),
            updated_at: "u".to_string(),
            exported_at: "e".to_string(),
        };
        assert_eq!(
            front.render(),
            "---\ntitle: \"Intro\"\nurl: \"intro\"\ndoc_id: 7\nbook_id: 42\n\
             created_at: \"c\"\nupdated_at: \"u\"\nexported_at: \"e\"\n---\n\n"
        );
    }

    #[tokio::test]
    async fn test_annotate_prepends_block() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Intro.md");
        std::fs::write(&file, "# Intro\n").unwrap();

        let outcome = annotate(&file, &front_matter()).await.unwrap();

        assert_eq!(outcome, Annotation::Inserted);
        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.starts_with("---\ntitle:"));
        assert!(content.ends_with("---\n\n# Intro\n"));
    }

    #[tokio::test]
    async fn test_annotate_twice_inserts_once() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Intro.md");
        std::fs::write(&file, "# Intro\n").unwrap();

        annotate(&file, &front_matter()).await.unwrap();
        let once = std::fs::read_to_string(&file).unwrap();
        let second = annotate(&file, &front_matter()).await.unwrap();

        assert_eq!(second, Annotation::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), once);
        assert_eq!(once.matches("doc_id:").count(), 1);
    }

    #[tokio::test]
    async fn test_annotate_empty_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Draft.md");
        std::fs::write(&file, "").unwrap();

        assert_eq!(annotate(&file, &front_matter()).await.unwrap(), Annotation::Inserted);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), front_matter().render());
    }

    #[tokio::test]
    async fn test_annotate_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let outcome = annotate(&dir.path().join("nope.md"), &front_matter())
            .await
            .unwrap();
        assert_eq!(outcome, Annotation::MissingFile);
        assert!(!dir.path().join("nope.md").exists());
    }
}
