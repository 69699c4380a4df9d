pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::document::DocumentLayout;
#[cfg(feature = "cli")]
use crate::core::targets::TargetColumns;
#[cfg(feature = "cli")]
use crate::core::{ConfigProvider, TargetSource};
#[cfg(feature = "cli")]
use crate::utils::error::{HitboxError, Result};
#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "hitbox")]
#[command(about = "Extract audiometry and HIT probe curves from HitBox JSON exports")]
pub struct CliConfig {
    /// HitBox JSON exports to process
    pub files: Vec<String>,

    /// Display label override, as FILE=LABEL (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Prescription-target table (CSV or TSV)
    #[arg(long)]
    pub targets: Option<String>,

    /// Frequency column followed by up to three gain columns (0-based)
    #[arg(long, value_delimiter = ',', default_value = "0,4,5,6")]
    pub target_columns: Vec<usize>,

    /// Labels for the gain columns; header cells are used otherwise
    #[arg(long, value_delimiter = ',')]
    pub target_labels: Vec<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv,json")]
    pub formats: Vec<String>,

    #[arg(long, default_value = "hitbox_export.zip")]
    pub archive_name: String,

    #[arg(long, help = "Write loose files instead of a ZIP archive")]
    pub no_compression: bool,

    #[arg(long, help = "Leave metadata.json out of the export")]
    pub no_metadata: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, default_value = "compact")]
    pub log_format: LogFormat,
}

/// Parse a `FILE=LABEL` pair.
pub fn parse_label_override(raw: &str) -> Option<(&str, &str)> {
    let (file, label) = raw.split_once('=')?;
    let (file, label) = (file.trim(), label.trim());
    if file.is_empty() || label.is_empty() {
        return None;
    }
    Some((file, label))
}

/// Tab-delimited when the file says so, comma otherwise.
pub fn delimiter_for(path: &str) -> Option<char> {
    if path.to_ascii_lowercase().ends_with(".tsv") {
        Some('\t')
    } else {
        None
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn job_name(&self) -> &str {
        "hitbox-cli"
    }

    fn input_files(&self) -> &[String] {
        &self.files
    }

    fn label_for(&self, file_name: &str) -> Option<String> {
        let base_name = std::path::Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str());
        self.labels
            .iter()
            .filter_map(|raw| parse_label_override(raw))
            .find(|(file, _)| *file == file_name || Some(*file) == base_name)
            .map(|(_, label)| label.to_string())
    }

    fn target_source(&self) -> Option<TargetSource> {
        let path = self.targets.as_ref()?;
        let (frequency, gains) = self.target_columns.split_first()?;
        Some(TargetSource {
            path: path.clone(),
            columns: TargetColumns {
                frequency: *frequency,
                gains: gains.to_vec(),
                labels: self.target_labels.clone(),
                has_headers: true,
                delimiter: delimiter_for(path),
            },
        })
    }

    fn layout(&self) -> DocumentLayout {
        DocumentLayout::default()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn compression_enabled(&self) -> bool {
        !self.no_compression
    }

    fn archive_name(&self) -> &str {
        &self.archive_name
    }

    fn include_metadata(&self) -> bool {
        !self.no_metadata
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_list("files", &self.files)?;
        validation::validate_file_extensions("files", &self.files, &["json"])?;

        for raw in &self.labels {
            if parse_label_override(raw).is_none() {
                return Err(HitboxError::InvalidConfigValueError {
                    field: "label".to_string(),
                    value: raw.clone(),
                    reason: "Expected FILE=LABEL".to_string(),
                });
            }
        }

        if let Some(targets) = &self.targets {
            validation::validate_file_extensions(
                "targets",
                std::slice::from_ref(targets),
                &["csv", "tsv"],
            )?;
            match self.target_source() {
                Some(source) => source.columns.validate()?,
                None => {
                    return Err(HitboxError::MissingConfigError {
                        field: "target_columns".to_string(),
                    })
                }
            }
        }

        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_formats("formats", &self.formats)?;
        if self.compression_enabled() {
            validation::validate_non_empty_string("archive_name", &self.archive_name)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::parse_from(std::iter::once("hitbox").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["visit.json"]);
        assert_eq!(config.files, vec!["visit.json"]);
        assert_eq!(config.formats, vec!["csv", "json"]);
        assert!(config.compression_enabled());
        assert!(config.target_source().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_label_overrides_match_base_name() {
        let config = parse(&["exports/visit.json", "--label", "visit.json=Patient A"]);
        assert_eq!(
            config.label_for("exports/visit.json"),
            Some("Patient A".to_string())
        );
        assert_eq!(config.label_for("other.json"), None);
    }

    #[test]
    fn test_target_source_from_columns() {
        let config = parse(&[
            "visit.json",
            "--targets",
            "Targets.tsv",
            "--target-columns",
            "0,5",
            "--target-labels",
            "NL3 Targets",
        ]);
        let source = config.target_source().unwrap();
        assert_eq!(source.columns.frequency, 0);
        assert_eq!(source.columns.gains, vec![5]);
        assert_eq!(source.columns.delimiter, Some('\t'));
        assert_eq!(source.columns.labels, vec!["NL3 Targets"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["visit.txt"]).validate().is_err());
        assert!(parse(&["visit.json", "--label", "nolabel"]).validate().is_err());
        assert!(parse(&["visit.json", "--formats", "xlsx"]).validate().is_err());
        assert!(parse(&["visit.json", "--targets", "t.csv", "--target-columns", "0"])
            .validate()
            .is_err());
    }
}
