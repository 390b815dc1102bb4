//! Document ingestion.
//!
//! Locates supported documents in a working directory, extracts their text
//! and saves uploaded payloads under unique names. Every failure is returned
//! as an [`IngestionError`]; an empty document is reported through
//! [`DocumentArtifact::empty_warning`] so callers can continue with a marker.

mod pdf;
mod text;

pub use pdf::{assemble_pages, default_extractor, page_marker, PdfExtractor, UnsupportedPdf, NO_PAGE_TEXT};
#[cfg(feature = "pdf")]
pub use pdf::LopdfExtractor;
pub use text::{decode_with_fallback, resolve_encoding};

use crate::config::IngestionConfig;
use crate::errors::IngestionError;
use crate::utils::{file_stamp, now, Timestamp};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Text used in place of an empty text document.
pub const EMPTY_FILE_MARKER: &str = "[Empty file]";

/// Text used in place of a PDF without extractable text.
pub const EMPTY_PDF_MARKER: &str = "[No extractable text found in PDF]";

/// Default preview length in characters.
pub const DEFAULT_PREVIEW_LENGTH: usize = 500;

/// A supported document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Portable Document Format.
    Pdf,
    /// Markdown text.
    Markdown,
    /// Plain text.
    Text,
}

impl DocumentType {
    /// Maps a file extension (without the dot, any case) to a type.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// Maps a MIME type to a type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "text/plain" => Some(Self::Text),
            _ => None,
        }
    }

    /// Returns the canonical file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }

    /// Returns the canonical MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Markdown => "text/markdown",
            Self::Text => "text/plain",
        }
    }
}

/// A located document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHandle {
    /// Full path.
    pub path: PathBuf,
    /// File name.
    pub name: String,
    /// Detected format.
    pub doc_type: DocumentType,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time, if the platform reports it.
    pub modified: Option<Timestamp>,
}

impl DocumentHandle {
    /// Returns the size as `x.y KB` or `x.y MB`.
    #[must_use]
    pub fn size_display(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentArtifact {
    /// Artifact identifier.
    pub id: Uuid,
    /// Source path.
    pub path: PathBuf,
    /// Source format.
    pub doc_type: DocumentType,
    /// Extracted text, or an empty-content marker.
    pub text: String,
    /// True when the document held no text and `text` is a marker.
    pub is_empty: bool,
    /// Encoding label that decoded a text document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Size of the raw bytes.
    pub size_bytes: u64,
    /// SHA-256 of the raw bytes, hex encoded.
    pub sha256: String,
    /// When the text was extracted.
    pub extracted_at: Timestamp,
}

impl DocumentArtifact {
    /// Returns the soft warning for an empty document.
    #[must_use]
    pub fn empty_warning(&self) -> Option<IngestionError> {
        self.is_empty.then(|| IngestionError::Empty {
            path: self.path.clone(),
        })
    }

    /// Returns the file name.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Locates, reads and saves documents.
#[derive(Debug, Clone)]
pub struct DocumentIngestor {
    config: IngestionConfig,
    pdf: Arc<dyn PdfExtractor>,
}

impl DocumentIngestor {
    /// Creates an ingestor with the build's default PDF extractor.
    #[must_use]
    pub fn new(config: IngestionConfig) -> Self {
        Self {
            config,
            pdf: default_extractor(),
        }
    }

    /// Replaces the PDF extractor.
    #[must_use]
    pub fn with_pdf_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.pdf = extractor;
        self
    }

    /// Returns the ingestion settings.
    #[must_use]
    pub const fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Returns the supported document type for `path`, if any.
    fn supported_type(&self, path: &Path) -> Result<DocumentType, IngestionError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            .then(|| DocumentType::from_extension(&ext))
            .flatten()
            .ok_or_else(|| IngestionError::UnsupportedType {
                found: if ext.is_empty() { "(none)".to_string() } else { format!(".{ext}") },
                supported: self.supported_extensions(),
            })
    }

    fn supported_extensions(&self) -> Vec<String> {
        self.config
            .extensions
            .iter()
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .collect()
    }

    /// Lists supported documents directly inside `directory`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory does not exist.
    pub async fn find(&self, directory: &Path) -> Result<Vec<DocumentHandle>, IngestionError> {
        let mut entries = tokio::fs::read_dir(directory)
            .await
            .map_err(|e| IngestionError::io(directory, e))?;

        let mut handles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| IngestionError::io(directory, e))?
        {
            let path = entry.path();
            let Ok(doc_type) = self.supported_type(&path) else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                    continue;
                }
            };

            handles.push(DocumentHandle {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                doc_type,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(Timestamp::from),
            });
        }

        handles.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(directory = %directory.display(), found = handles.len(), "Located documents");
        Ok(handles)
    }

    /// Extracts the text of one document.
    ///
    /// PDF text is assembled page by page; Markdown and text files are
    /// decoded with the configured encoding fallback list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `UnsupportedType` or `DecodeError`. An empty
    /// document is not an error; see [`DocumentArtifact::empty_warning`].
    pub async fn read(&self, path: &Path) -> Result<DocumentArtifact, IngestionError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| IngestionError::io(path, e))?;
        if !metadata.is_file() {
            return Err(IngestionError::io(
                path,
                std::io::Error::other("path is not a regular file"),
            ));
        }

        let doc_type = self.supported_type(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IngestionError::io(path, e))?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size_bytes = bytes.len() as u64;

        let (text, encoding) = match doc_type {
            DocumentType::Pdf => {
                let extractor = Arc::clone(&self.pdf);
                let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
                    .await
                    .map_err(|e| IngestionError::Decode {
                        path: path.to_path_buf(),
                        reason: format!("extraction task failed: {e}"),
                    })?
                    .map_err(|reason| IngestionError::Decode {
                        path: path.to_path_buf(),
                        reason,
                    })?;
                (assemble_pages(&pages), None)
            }
            DocumentType::Markdown | DocumentType::Text => {
                let (text, label) = decode_with_fallback(&bytes, &self.config.encodings)
                    .ok_or_else(|| IngestionError::Decode {
                        path: path.to_path_buf(),
                        reason: format!(
                            "no encoding succeeded (tried {})",
                            self.config.encodings.join(", ")
                        ),
                    })?;
                let text = (!text.trim().is_empty()).then_some(text);
                (text, Some(label.to_string()))
            }
        };

        let is_empty = text.is_none();
        let text = text.unwrap_or_else(|| {
            let marker = if doc_type == DocumentType::Pdf {
                EMPTY_PDF_MARKER
            } else {
                EMPTY_FILE_MARKER
            };
            marker.to_string()
        });

        if is_empty {
            warn!(path = %path.display(), "Document holds no extractable text");
        } else {
            info!(path = %path.display(), chars = text.chars().count(), "Document read");
        }

        Ok(DocumentArtifact {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            doc_type,
            text,
            is_empty,
            encoding,
            size_bytes,
            sha256,
            extracted_at: now(),
        })
    }

    /// Saves an uploaded payload into `directory` under a unique name.
    ///
    /// The name is `document_<timestamp>_<n>.<ext>`, where the extension
    /// comes from the MIME type and `n` increases until the name is free.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for an unknown MIME type, or an I/O error.
    pub async fn save(
        &self,
        directory: &Path,
        bytes: &[u8],
        mime: &str,
    ) -> Result<DocumentHandle, IngestionError> {
        let doc_type = DocumentType::from_mime(mime)
            .filter(|t| self.supported_type(Path::new(&format!("x.{}", t.extension()))).is_ok())
            .ok_or_else(|| IngestionError::UnsupportedType {
                found: mime.to_string(),
                supported: [DocumentType::Pdf, DocumentType::Markdown, DocumentType::Text]
                    .iter()
                    .map(|t| t.mime().to_string())
                    .collect(),
            })?;

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| IngestionError::io(directory, e))?;

        let stamp = file_stamp(&now());
        let mut counter = 0usize;
        let (path, mut file) = loop {
            let name = format!("document_{stamp}_{counter}.{}", doc_type.extension());
            let candidate = directory.join(&name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => break (candidate, file),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
                Err(err) => return Err(IngestionError::io(candidate, err)),
            }
        };

        file.write_all(bytes)
            .await
            .map_err(|e| IngestionError::io(&path, e))?;
        file.flush().await.map_err(|e| IngestionError::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), mime, "Saved upload");
        Ok(DocumentHandle {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            doc_type,
            size_bytes: bytes.len() as u64,
            modified: Some(now()),
        })
    }

    /// Saves a base64 payload, or the payload's own text if it is not base64.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentIngestor::save`].
    pub async fn save_base64(
        &self,
        directory: &Path,
        payload: &str,
        mime: &str,
    ) -> Result<DocumentHandle, IngestionError> {
        match STANDARD.decode(payload.trim()) {
            Ok(bytes) => self.save(directory, &bytes, mime).await,
            Err(err) => {
                debug!(error = %err, "Payload is not base64; saving as text");
                self.save(directory, payload.as_bytes(), mime).await
            }
        }
    }

    /// Returns a preview using the configured length.
    #[must_use]
    pub fn preview(&self, text: &str) -> String {
        preview(text, self.config.preview_length)
    }
}

/// Returns `text` shortened to its head and tail around an omission marker.
///
/// Lengths are counted in characters. Text no longer than `max_len` is
/// returned unchanged.
#[must_use]
pub fn preview(text: &str, max_len: usize) -> String {
    let total = text.chars().count();
    if total <= max_len {
        return text.to_string();
    }

    let half = max_len / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(total - half).collect();
    format!(
        "{head}\n\n[... {} characters omitted ...]\n\n{tail}",
        total - 2 * half
    )
}

/// Formats a byte count as `x.y KB` below one megabyte, else `x.y MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes < MB {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
