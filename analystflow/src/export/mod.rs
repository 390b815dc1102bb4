//! Report export.
//!
//! [`markdown`] renders stage outputs, [`writer`] persists them, and
//! [`ReportExporter`] ties the two to a [`RunState`].

pub mod markdown;
pub mod writer;

pub use markdown::{document_title, parse_headings, render_report, render_stage, COMBINED_TITLE};
pub use writer::{Destination, InMemoryObjectStore, ObjectStore, ObjectStoreError, ReportWriter};

use crate::config::OutputKeyConfig;
use crate::context::RunState;
use crate::errors::ExportError;
use crate::records::StageKey;
use crate::utils::{file_stamp, now, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

/// File stem of the combined report.
pub const COMBINED_STEM: &str = "analysis";

/// Returns `<stem>_output_version_<YYYYmmdd_HHMMSS>.md`.
#[must_use]
pub fn report_file_name(stem: &str, ts: &Timestamp) -> String {
    format!("{stem}_output_version_{}.md", file_stamp(ts))
}

/// One written report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFile {
    /// The stage exported, or `None` for the combined report.
    pub key: Option<StageKey>,
    /// Where the file landed.
    pub location: String,
}

/// Outcome of a full export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// The destination written to.
    pub destination: String,
    /// Files written, per-stage first in declaration order.
    pub files: Vec<ExportedFile>,
    /// The time stamped into every file name.
    pub generated_at: Timestamp,
}

impl ExportSummary {
    /// Returns every written location.
    #[must_use]
    pub fn locations(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.location.as_str()).collect()
    }
}

/// Exports every stage output of a run.
#[derive(Debug, Clone, Default)]
pub struct ReportExporter {
    writer: ReportWriter,
    stems: OutputKeyConfig,
    combined: bool,
}

impl ReportExporter {
    /// Creates an exporter writing per-stage files only.
    #[must_use]
    pub fn new(writer: ReportWriter) -> Self {
        Self {
            writer,
            stems: OutputKeyConfig::default(),
            combined: false,
        }
    }

    /// Sets the file stems.
    #[must_use]
    pub fn with_stems(mut self, stems: OutputKeyConfig) -> Self {
        self.stems = stems;
        self
    }

    /// Also writes the combined report.
    #[must_use]
    pub const fn with_combined(mut self, combined: bool) -> Self {
        self.combined = combined;
        self
    }

    /// Writes one file per stage, plus the combined file when enabled.
    ///
    /// Nothing is written unless all four outputs exist.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::MissingOutputs` naming the absent keys, or the
    /// first write failure.
    pub async fn export(
        &self,
        state: &RunState,
        destination: &Destination,
    ) -> Result<ExportSummary, ExportError> {
        let missing = state.missing(&StageKey::ALL);
        if !missing.is_empty() {
            return Err(ExportError::MissingOutputs {
                missing: missing.iter().map(|k| k.as_str().to_string()).collect(),
            });
        }

        let generated_at = now();
        let values = state.export();
        let mut files = Vec::with_capacity(values.len() + 1);

        for value in &values {
            let key = value.key();
            let markdown = render_report(
                std::slice::from_ref(value),
                document_title(key),
                &generated_at,
            );
            let name = report_file_name(self.stems.stem(key), &generated_at);
            let location = self.writer.write(&markdown, &name, destination).await?;
            files.push(ExportedFile {
                key: Some(key),
                location,
            });
        }

        if self.combined {
            let markdown = render_report(&values, COMBINED_TITLE, &generated_at);
            let name = report_file_name(COMBINED_STEM, &generated_at);
            let location = self.writer.write(&markdown, &name, destination).await?;
            files.push(ExportedFile {
                key: None,
                location,
            });
        }

        info!(%destination, files = files.len(), "Export finished");
        Ok(ExportSummary {
            destination: destination.to_string(),
            files,
            generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_report_file_name() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(report_file_name("ur", &ts), "ur_output_version_20240506_070809.md");
    }

    #[tokio::test]
    async fn test_export_refuses_incomplete_state() {
        let root = tempfile::tempdir().unwrap();
        let state = fixtures::state_with_document();
        state.set(fixtures::requirements_value()).unwrap();

        let err = ReportExporter::default()
            .export(&state, &Destination::local(root.path()))
            .await
            .unwrap_err();

        match err {
            ExportError::MissingOutputs { missing } => {
                assert_eq!(missing, vec!["actors", "data_objects", "use_cases"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_export_writes_per_stage_and_combined() {
        let root = tempfile::tempdir().unwrap();
        let state = fixtures::complete_state();

        let summary = ReportExporter::new(ReportWriter::new())
            .with_combined(true)
            .export(&state, &Destination::local(root.path()))
            .await
            .unwrap();

        assert_eq!(summary.files.len(), 5);
        let stamp = file_stamp(&summary.generated_at);
        for (file, stem) in summary.files.iter().zip(["ur", "ac", "do", "uc", "analysis"]) {
            assert!(file.location.ends_with(&format!("{stem}_output_version_{stamp}.md")));
        }

        let combined = std::fs::read_to_string(&summary.files[4].location).unwrap();
        assert!(combined.starts_with("# BUSINESS_ANALYSIS_OUTPUT\n"));
        assert_eq!(
            parse_headings(&combined, 2),
            vec!["Requirements", "Actors", "Data Objects", "Use Cases"]
        );

        let actors = std::fs::read_to_string(&summary.files[1].location).unwrap();
        assert!(actors.starts_with("# ACTOR_OUTPUT\n"));
        assert_eq!(parse_headings(&actors, 2), vec!["Actors"]);
    }

    #[tokio::test]
    async fn test_export_to_bucket_with_custom_stems() {
        let store = Arc::new(InMemoryObjectStore::new());
        let stems = OutputKeyConfig {
            requirements: "requirements".to_string(),
            ..OutputKeyConfig::default()
        };
        let exporter = ReportExporter::new(ReportWriter::new().with_object_store(store.clone()))
            .with_stems(stems);

        let summary = exporter
            .export(&fixtures::complete_state(), &Destination::parse("gs://ba-reports/run"))
            .await
            .unwrap();

        assert_eq!(summary.destination, "gs://ba-reports/run");
        let keys = store.keys("ba-reports");
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().any(|k| k.starts_with("run/requirements_output_version_")));
    }
}
