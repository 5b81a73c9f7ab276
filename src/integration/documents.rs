//! Knowledge base of plain-text documents, at most one active

use crate::{ChatterError, Result};
use std::path::Path;
use tracing::info;

/// File extensions accepted as documents
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["txt", "md", "json", "csv"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct DocumentLibrary {
    documents: Vec<Document>,
    active: Option<String>,
}

impl DocumentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Names are unique.
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.documents.iter().any(|d| d.name == name) {
            return Err(ChatterError::ConfigError(format!(
                "A document with the name \"{}\" already exists.",
                name
            )));
        }
        info!("Added document \"{}\"", name);
        self.documents.push(Document {
            name,
            content: content.into(),
        });
        Ok(())
    }

    /// Read a text document from disk, named after its file name
    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            return Err(ChatterError::ConfigError(format!(
                "Unsupported document type: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ChatterError::ConfigError(format!("Invalid file name: {}", path.display())))?
            .to_string();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ChatterError::IOError(format!("Failed to read {}: {}", path.display(), e)))?;

        self.add(name.clone(), content)?;
        Ok(name)
    }

    /// Remove a document; clears the active selection if it was active
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.name != name);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        before != self.documents.len()
    }

    /// Select the active document; `None` deactivates
    pub fn set_active(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) if !self.documents.iter().any(|d| d.name == name) => Err(
                ChatterError::ConfigError(format!("Unknown document: {}", name)),
            ),
            _ => {
                self.active = name.map(str::to_string);
                Ok(())
            }
        }
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Content of the active document
    pub fn active_content(&self) -> Option<&str> {
        let active = self.active.as_deref()?;
        self.documents
            .iter()
            .find(|d| d.name == active)
            .map(|d| d.content.as_str())
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut library = DocumentLibrary::new();
        library.add("faq.md", "Q: A").unwrap();
        assert!(library.add("faq.md", "other").is_err());
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_active_document() {
        let mut library = DocumentLibrary::new();
        library.add("faq.md", "Opening hours: 9-5").unwrap();
        assert!(library.active_content().is_none());

        library.set_active(Some("faq.md")).unwrap();
        assert_eq!(library.active_content(), Some("Opening hours: 9-5"));
        assert!(library.set_active(Some("missing.md")).is_err());

        assert!(library.remove("faq.md"));
        assert!(library.active_name().is_none());
        assert!(library.active_content().is_none());
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Store policy").unwrap();

        let mut library = DocumentLibrary::new();
        assert_eq!(library.load_file(&path).await.unwrap(), "notes.txt");
        assert_eq!(library.documents()[0].content, "Store policy");

        let binary = dir.path().join("photo.png");
        std::fs::write(&binary, [0u8; 4]).unwrap();
        assert!(library.load_file(&binary).await.is_err());
    }
}
