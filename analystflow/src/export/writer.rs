//! Report persistence to local directories and object-store buckets.

use crate::errors::ExportError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    /// A local directory, created if missing.
    Local {
        /// The directory.
        dir: PathBuf,
    },
    /// A bucket path in an object store.
    Bucket {
        /// Bucket name.
        bucket: String,
        /// Key prefix, without leading or trailing slashes.
        prefix: String,
    },
}

impl Destination {
    /// Creates a local destination.
    #[must_use]
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        Self::Local { dir: dir.into() }
    }

    /// Creates a bucket destination.
    #[must_use]
    pub fn bucket(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::Bucket {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Parses `gs://bucket/prefix` or `s3://bucket/prefix` as a bucket and
    /// anything else as a local directory.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let remote = spec
            .strip_prefix("gs://")
            .or_else(|| spec.strip_prefix("s3://"));
        match remote {
            Some(rest) => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                Self::bucket(bucket, prefix)
            }
            None => Self::local(spec),
        }
    }

    /// Returns the object key or path for a file name.
    #[must_use]
    pub fn location_of(&self, file_name: &str) -> String {
        match self {
            Self::Local { dir } => dir.join(file_name).display().to_string(),
            Self::Bucket { bucket, prefix } if prefix.is_empty() => {
                format!("gs://{bucket}/{file_name}")
            }
            Self::Bucket { bucket, prefix } => format!("gs://{bucket}/{prefix}/{file_name}"),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { dir } => write!(f, "{}", dir.display()),
            Self::Bucket { bucket, prefix } if prefix.is_empty() => write!(f, "gs://{bucket}"),
            Self::Bucket { bucket, prefix } => write!(f, "gs://{bucket}/{prefix}"),
        }
    }
}

/// A remote object store.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Stores an object, failing if the key already exists.
    ///
    /// # Errors
    ///
    /// Returns the store's failure reason.
    async fn put_new(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;
}

/// Failure reported by an [`ObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectStoreError {
    /// The key is taken.
    #[error("object already exists")]
    AlreadyExists,
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// Object store held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), Vec<u8>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an object's body.
    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Returns every key in `bucket`, sorted.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_new(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        match self.objects.entry((bucket.to_string(), key.to_string())) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ObjectStoreError::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(body);
                Ok(())
            }
        }
    }
}

/// Writes Markdown files without ever overwriting an existing one.
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    store: Option<Arc<dyn ObjectStore>>,
}

impl ReportWriter {
    /// Creates a writer for local destinations only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables bucket destinations.
    #[must_use]
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Writes `markdown` as `file_name` and returns where it landed.
    ///
    /// If the name is taken, `_1`, `_2`, ... is appended to the stem.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` carrying the attempted destination.
    pub async fn write(
        &self,
        markdown: &str,
        file_name: &str,
        destination: &Destination,
    ) -> Result<String, ExportError> {
        let location = match destination {
            Destination::Local { dir } => write_local(markdown, file_name, dir).await?,
            Destination::Bucket { bucket, prefix } => {
                let store = self.store.as_ref().ok_or_else(|| ExportError::NoObjectStore {
                    destination: destination.to_string(),
                })?;
                write_bucket(store.as_ref(), markdown, file_name, bucket, prefix, destination)
                    .await?
            }
        };

        info!(%location, bytes = markdown.len(), "Report written");
        Ok(location)
    }
}

fn candidate_name(file_name: &str, attempt: usize) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{attempt}.{ext}"),
        None => format!("{file_name}_{attempt}"),
    }
}

async fn write_local(markdown: &str, file_name: &str, dir: &Path) -> Result<String, ExportError> {
    let fail = |source: std::io::Error, path: &Path| ExportError::Write {
        destination: path.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| fail(e, dir))?;

    let mut attempt = 0;
    let (path, mut file) = loop {
        let path = dir.join(candidate_name(file_name, attempt));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => break (path, file),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => return Err(fail(err, &path)),
        }
    };

    file.write_all(markdown.as_bytes())
        .await
        .map_err(|e| fail(e, &path))?;
    file.flush().await.map_err(|e| fail(e, &path))?;

    Ok(path.display().to_string())
}

async fn write_bucket(
    store: &dyn ObjectStore,
    markdown: &str,
    file_name: &str,
    bucket: &str,
    prefix: &str,
    destination: &Destination,
) -> Result<String, ExportError> {
    let mut attempt = 0;
    loop {
        let name = candidate_name(file_name, attempt);
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };

        match store
            .put_new(bucket, &key, markdown.as_bytes().to_vec(), "text/markdown")
            .await
        {
            Ok(()) => return Ok(destination.location_of(&name)),
            Err(ObjectStoreError::AlreadyExists) => attempt += 1,
            Err(ObjectStoreError::Other(reason)) => {
                return Err(ExportError::Upload {
                    destination: destination.location_of(&name),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_destination_parse() {
        assert_eq!(
            Destination::parse("gs://reports/ba/run-1/"),
            Destination::bucket("reports", "ba/run-1")
        );
        assert_eq!(Destination::parse("s3://reports"), Destination::bucket("reports", ""));
        assert_eq!(Destination::parse("out/agent"), Destination::local("out/agent"));
        assert_eq!(Destination::bucket("b", "p").to_string(), "gs://b/p");
    }

    #[tokio::test]
    async fn test_local_write_creates_dir_and_never_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let dest = Destination::local(root.path().join("nested/out"));
        let writer = ReportWriter::new();

        let first = writer.write("# one", "ur_output.md", &dest).await.unwrap();
        let second = writer.write("# two", "ur_output.md", &dest).await.unwrap();

        assert!(first.ends_with("ur_output.md"));
        assert!(second.ends_with("ur_output_1.md"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "# one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "# two");
    }

    #[tokio::test]
    async fn test_local_write_failure_carries_destination() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = ReportWriter::new()
            .write("# r", "r.md", &Destination::local(blocker.join("sub")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WriteError);
        assert!(err.destination().unwrap().contains("sub"));
    }

    #[tokio::test]
    async fn test_bucket_write() {
        let store = Arc::new(InMemoryObjectStore::new());
        let writer = ReportWriter::new().with_object_store(store.clone());
        let dest = Destination::bucket("reports", "ba");

        let first = writer.write("# a", "uc.md", &dest).await.unwrap();
        let second = writer.write("# b", "uc.md", &dest).await.unwrap();

        assert_eq!(first, "gs://reports/ba/uc.md");
        assert_eq!(second, "gs://reports/ba/uc_1.md");
        assert_eq!(store.keys("reports"), vec!["ba/uc.md", "ba/uc_1.md"]);
        assert_eq!(store.get("reports", "ba/uc.md").unwrap(), b"# a");
    }

    #[tokio::test]
    async fn test_bucket_without_store() {
        let err = ReportWriter::new()
            .write("# a", "uc.md", &Destination::bucket("reports", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::NoObjectStore { .. }));
        assert_eq!(err.kind(), ErrorKind::WriteError);
    }
}
