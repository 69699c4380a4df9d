use serde_json::Value;

use crate::core::document::{self, number_field, DatasetNode, DocumentLayout};
use crate::core::series::{EarColumns, ProbeColumns};
use crate::domain::model::{
    AudiometricPoint, Ear, Extraction, ExtractionResult, ExtractionWarning, ProbeCurve, SeriesId,
};
use crate::utils::error::Result;

/// Pulls the audiometric thresholds and HIT/REM probe curves out of a HitBox
/// export. Missing keys never fail the extraction; they only leave the
/// corresponding series absent and, where useful, add a warning.
#[derive(Debug, Clone, Default)]
pub struct SeriesExtractor {
    layout: DocumentLayout,
}

impl SeriesExtractor {
    pub fn new(layout: DocumentLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    /// Decode raw bytes and extract. Only decoding can fail.
    pub fn extract_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<Extraction> {
        let document = document::decode_document(file_name, bytes)?;
        Ok(self.extract(&document))
    }

    pub fn extract(&self, document: &Value) -> Extraction {
        let mut warnings = Vec::new();

        let sessions = match document::sessions(document, &self.layout) {
            Some(sessions) if !sessions.is_empty() => sessions,
            _ => {
                tracing::debug!("Document has no sessions");
                return Extraction {
                    result: ExtractionResult::default(),
                    warnings: vec![ExtractionWarning::MissingSessions],
                };
            }
        };

        let audiometric = self
            .dataset(sessions, self.layout.audiometric_session, &mut warnings)
            .map(|dataset| self.audiometric_points(dataset, &mut warnings));

        let probe_curves = self
            .dataset(sessions, self.layout.probe_session, &mut warnings)
            .map(|dataset| self.probe_curves(dataset, &mut warnings));

        let used = self.layout.audiometric_session.max(self.layout.probe_session) + 1;
        if sessions.len() > used {
            tracing::debug!("Ignoring {} trailing session(s)", sessions.len() - used);
        }

        Extraction {
            result: ExtractionResult {
                audiometric,
                probe_curves,
            },
            warnings,
        }
    }

    /// Normalized dataset of a session. A missing session is not a warning;
    /// a session without a usable dataset is.
    fn dataset<'a>(
        &self,
        sessions: &'a [Value],
        index: usize,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<DatasetNode<'a>> {
        let session = sessions.get(index)?;
        let dataset = session
            .get(&self.layout.datasets_key)
            .and_then(DatasetNode::normalize);

        if dataset.is_none() {
            tracing::debug!("Session {} carries no dataset", index);
            warnings.push(ExtractionWarning::MissingDataset { session: index });
        }
        dataset
    }

    fn audiometric_points(
        &self,
        dataset: DatasetNode<'_>,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<AudiometricPoint> {
        let mut right = EarColumns::default();
        let mut left = EarColumns::default();

        for group in dataset.collection(&self.layout) {
            let ear = group
                .get(&self.layout.ear_key)
                .and_then(Value::as_str)
                .and_then(Ear::from_tag);
            let points = group
                .get(&self.layout.collection_key)
                .and_then(Value::as_array);

            // 沒有耳別或沒有點集合的群組直接略過
            let (Some(ear), Some(points)) = (ear, points) else {
                tracing::debug!("Skipping ear group without usable ear tag or points");
                continue;
            };

            let columns = match ear {
                Ear::Right => &mut right,
                Ear::Left => &mut left,
            };
            for point in points {
                columns.push(
                    frequency_field(point, &self.layout.frequency_key),
                    number_field(point, &self.layout.level_key),
                );
            }
        }

        let mut points = Vec::new();
        for (ear, columns) in [(Ear::Right, right), (Ear::Left, left)] {
            if columns.is_aligned() {
                points.extend(columns.into_points(ear));
            } else {
                tracing::warn!(
                    "⚠️ {} ear thresholds excluded: {}",
                    ear,
                    columns.describe_lengths()
                );
                warnings.push(ExtractionWarning::DimensionMismatch {
                    series: SeriesId::Audiometric(ear),
                    lengths: columns.describe_lengths(),
                });
            }
        }
        points
    }

    fn probe_curves(
        &self,
        dataset: DatasetNode<'_>,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<ProbeCurve> {
        let mut curves = Vec::new();

        for (run, item) in dataset.collection(&self.layout).iter().enumerate() {
            if !item.is_object() {
                tracing::debug!("Skipping non-object probe item at position {}", run);
                continue;
            }

            let mut columns = ProbeColumns::default();
            let points = item
                .get(&self.layout.points_key)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            for point in points {
                columns.push(
                    frequency_field(point, &self.layout.frequency_key),
                    number_field(point, &self.layout.input_key),
                    number_field(point, &self.layout.output_key),
                );
            }

            if columns.is_aligned() {
                curves.push(columns.into_curve(run));
            } else {
                let series = SeriesId::Probe { run };
                tracing::warn!("⚠️ {} excluded: {}", series, columns.describe_lengths());
                warnings.push(ExtractionWarning::DimensionMismatch {
                    series,
                    lengths: columns.describe_lengths(),
                });
            }
        }

        curves
    }
}

fn frequency_field(point: &Value, key: &str) -> Option<f64> {
    number_field(point, key).filter(|f| *f > 0.0)
}
