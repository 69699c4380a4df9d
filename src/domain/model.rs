use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::targets::TargetTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    /// 解析 `Earside` 標籤，大小寫不敏感
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "right" => Some(Ear::Right),
            "left" => Some(Ear::Left),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ear::Left => "Left",
            Ear::Right => "Right",
        }
    }
}

impl fmt::Display for Ear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudiometricPoint {
    pub frequency_hz: f64,
    pub level_db_hl: f64,
    pub ear: Ear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbePoint {
    pub frequency_hz: f64,
    pub input_db: f64,
    pub output_db: f64,
}

impl ProbePoint {
    pub fn gain_db(&self) -> f64 {
        self.output_db - self.input_db
    }
}

/// One probe run. `run` is the position of the item inside the session's
/// collection; device exports carry no explicit run identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeCurve {
    pub run: usize,
    pub points: Vec<ProbePoint>,
}

impl ProbeCurve {
    pub fn rem_label(&self) -> String {
        format!("REM {}", self.run + 1)
    }

    pub fn insertion_gain(&self) -> Vec<GainPoint> {
        self.points
            .iter()
            .map(|p| GainPoint {
                frequency_hz: p.frequency_hz,
                gain_db: p.gain_db(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainPoint {
    pub frequency_hz: f64,
    pub gain_db: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub audiometric: Option<Vec<AudiometricPoint>>,
    pub probe_curves: Option<Vec<ProbeCurve>>,
}

/// Identifies one plottable series within a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesId {
    Audiometric(Ear),
    Probe { run: usize },
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesId::Audiometric(ear) => write!(f, "{} ear thresholds", ear),
            SeriesId::Probe { run } => write!(f, "REM {}", run + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ExtractionWarning {
    #[error("document has no sessions")]
    MissingSessions,

    #[error("session {session} carries no dataset")]
    MissingDataset { session: usize },

    #[error("{series} excluded: component lengths differ ({lengths})")]
    DimensionMismatch { series: SeriesId, lengths: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub result: ExtractionResult,
    pub warnings: Vec<ExtractionWarning>,
}

/// 上傳（或從磁碟讀入）的單一檔案
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub label: String,
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let label = default_label(&file_name);
        Self {
            file_name,
            label,
            contents,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Display label for a file: the base name up to its first dot.
pub fn default_label(file_name: &str) -> String {
    let base = std::path::Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);

    match base.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledExtraction {
    pub file_name: String,
    pub label: String,
    pub result: ExtractionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub label: String,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.label, self.file_name, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileWarning {
    pub file_name: String,
    pub label: String,
    pub warning: ExtractionWarning,
}

impl fmt::Display for FileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.warning)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<LabeledExtraction>,
    pub failures: Vec<FileFailure>,
    pub warnings: Vec<FileWarning>,
    pub targets: Option<Arc<TargetTable>>,
}

impl BatchReport {
    pub fn processed_count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_problems(&self) -> bool {
        !self.failures.is_empty() || !self.warnings.is_empty()
    }
}

/// Extract 階段的輸出：讀取成功的檔案與讀取失敗的檔案
#[derive(Debug, Clone, Default)]
pub struct ExtractedBatch {
    pub files: Vec<SourceFile>,
    pub failures: Vec<FileFailure>,
    pub targets: Option<Arc<TargetTable>>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub report: BatchReport,
    pub csv_output: Vec<(String, String)>,
    pub tsv_output: Vec<(String, String)>,
    pub chart_json: String,
    pub report_json: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label_uses_text_before_first_dot() {
        assert_eq!(default_label("patient_a.json"), "patient_a");
        assert_eq!(default_label("exports/visit.2025.json"), "visit");
        assert_eq!(default_label(".hidden"), ".hidden");
    }

    #[test]
    fn test_ear_tag_is_case_insensitive() {
        assert_eq!(Ear::from_tag("Right"), Some(Ear::Right));
        assert_eq!(Ear::from_tag(" left "), Some(Ear::Left));
        assert_eq!(Ear::from_tag("Binaural"), None);
    }

    #[test]
    fn test_probe_curve_gain() {
        let curve = ProbeCurve {
            run: 1,
            points: vec![ProbePoint {
                frequency_hz: 1000.0,
                input_db: 50.0,
                output_db: 62.0,
            }],
        };
        assert_eq!(curve.rem_label(), "REM 2");
        assert_eq!(curve.insertion_gain()[0].gain_db, 12.0);
    }
}
