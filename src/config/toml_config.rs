use crate::config::delimiter_for;
use crate::core::document::DocumentLayout;
use crate::core::targets::TargetColumns;
use crate::core::{ConfigProvider, TargetSource};
use crate::utils::error::{HitboxError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub job: JobConfig,
    pub input: InputConfig,
    pub targets: Option<TargetsConfig>,
    pub layout: Option<DocumentLayout>,
    pub output: OutputConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub base_dir: Option<String>,
    pub files: Vec<String>,
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    pub path: String,
    pub frequency_column: Option<usize>,
    pub gain_columns: Option<Vec<usize>>,
    pub labels: Option<Vec<String>>,
    pub has_headers: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
    pub include_metadata: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub format: Option<String>,
}

const DEFAULT_ARCHIVE_NAME: &str = "hitbox_export.zip";

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HitboxError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HitboxError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${EXPORT_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| HitboxError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 輸入檔案相對於 base_dir 的完整路徑
    pub fn resolved_files(&self) -> Vec<String> {
        self.input
            .files
            .iter()
            .map(|file| self.resolve_input(file))
            .collect()
    }

    fn resolve_input(&self, file: &str) -> String {
        match &self.input.base_dir {
            Some(base) => Path::new(base).join(file).to_string_lossy().into_owned(),
            None => file.to_string(),
        }
    }

    /// 讀取輸入與目標表的根目錄
    pub fn input_root(&self) -> &str {
        self.input.base_dir.as_deref().unwrap_or(".")
    }

    pub fn verbose(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    pub fn log_format(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.format.as_deref())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("job.name", &self.job.name)?;
        validation::validate_non_empty_list("input.files", &self.input.files)?;
        validation::validate_file_extensions("input.files", &self.input.files, &["json"])?;

        if let Some(targets) = &self.targets {
            validation::validate_file_extensions(
                "targets.path",
                std::slice::from_ref(&targets.path),
                &["csv", "tsv"],
            )?;
            if let Some(source) = self.target_source() {
                source.columns.validate()?;
            }
        }

        validation::validate_path("output.output_path", &self.output.output_path)?;
        validation::validate_output_formats("output.output_formats", &self.output.output_formats)?;

        if let Some(format) = self.log_format() {
            format
                .parse::<crate::utils::logger::LogFormat>()
                .map_err(|reason| HitboxError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason,
                })?;
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn job_name(&self) -> &str {
        &self.job.name
    }

    fn input_files(&self) -> &[String] {
        &self.input.files
    }

    fn label_for(&self, file_name: &str) -> Option<String> {
        self.input.labels.as_ref()?.get(file_name).cloned()
    }

    fn target_source(&self) -> Option<TargetSource> {
        let targets = self.targets.as_ref()?;
        let defaults = TargetColumns::default();
        Some(TargetSource {
            path: targets.path.clone(),
            columns: TargetColumns {
                frequency: targets.frequency_column.unwrap_or(defaults.frequency),
                gains: targets.gain_columns.clone().unwrap_or(defaults.gains),
                labels: targets.labels.clone().unwrap_or_default(),
                has_headers: targets.has_headers.unwrap_or(true),
                delimiter: delimiter_for(&targets.path),
            },
        })
    }

    fn layout(&self) -> DocumentLayout {
        self.layout.clone().unwrap_or_default()
    }

    fn output_path(&self) -> &str {
        &self.output.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.output_formats
    }

    fn compression_enabled(&self) -> bool {
        self.output
            .compression
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    fn archive_name(&self) -> &str {
        self.output
            .compression
            .as_ref()
            .and_then(|c| c.filename.as_deref())
            .unwrap_or(DEFAULT_ARCHIVE_NAME)
    }

    fn include_metadata(&self) -> bool {
        self.output
            .compression
            .as_ref()
            .and_then(|c| c.include_metadata)
            .unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
