use std::sync::Arc;

use crate::core::extractor::SeriesExtractor;
use crate::core::targets::TargetTable;
use crate::domain::model::{BatchReport, FileFailure, FileWarning, LabeledExtraction, SourceFile};

/// Extract every file independently. A file that fails to decode is
/// reported and dropped; it never affects the other files.
pub fn process_batch(
    extractor: &SeriesExtractor,
    files: &[SourceFile],
    targets: Option<Arc<TargetTable>>,
) -> BatchReport {
    let mut report = BatchReport {
        targets,
        ..BatchReport::default()
    };

    for file in files {
        match extractor.extract_bytes(&file.file_name, &file.contents) {
            Ok(extraction) => {
                for warning in extraction.warnings {
                    let warning = FileWarning {
                        file_name: file.file_name.clone(),
                        label: file.label.clone(),
                        warning,
                    };
                    tracing::warn!("⚠️ {}", warning);
                    report.warnings.push(warning);
                }

                tracing::debug!(
                    "Extracted '{}': {} audiometric point(s), {} probe curve(s)",
                    file.label,
                    extraction.result.audiometric.as_ref().map_or(0, Vec::len),
                    extraction.result.probe_curves.as_ref().map_or(0, Vec::len)
                );

                report.entries.push(LabeledExtraction {
                    file_name: file.file_name.clone(),
                    label: file.label.clone(),
                    result: extraction.result,
                });
            }
            Err(e) => {
                tracing::error!("❌ Skipping '{}': {}", file.file_name, e);
                report.failures.push(FileFailure {
                    file_name: file.file_name.clone(),
                    label: file.label.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "📊 Batch processed: {} extracted, {} failed, {} warning(s)",
        report.entries.len(),
        report.failures.len(),
        report.warnings.len()
    );
    report
}
