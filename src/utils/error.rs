use thiserror::Error;

#[derive(Error, Debug)]
pub enum HitboxError {
    #[error("Malformed input '{file}': {reason}")]
    MalformedInput { file: String, reason: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Dimension mismatch in {series}: {details}")]
    DimensionMismatch { series: String, details: String },

    #[error("Target table error: {message}")]
    TargetError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Data,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HitboxError {
    pub fn malformed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        HitboxError::MalformedInput {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HitboxError::MalformedInput { .. } | HitboxError::IoError(_) => ErrorCategory::Input,
            HitboxError::ConfigError { .. }
            | HitboxError::ConfigValidationError { .. }
            | HitboxError::InvalidConfigValueError { .. }
            | HitboxError::MissingConfigError { .. } => ErrorCategory::Configuration,
            HitboxError::CsvError(_)
            | HitboxError::DimensionMismatch { .. }
            | HitboxError::TargetError { .. }
            | HitboxError::ProcessingError { .. } => ErrorCategory::Data,
            HitboxError::ZipError(_) | HitboxError::SerializationError(_) => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單一檔案的問題不影響整批
            HitboxError::MalformedInput { .. } | HitboxError::DimensionMismatch { .. } => {
                ErrorSeverity::Low
            }
            HitboxError::TargetError { .. } | HitboxError::CsvError(_) => ErrorSeverity::Medium,
            HitboxError::ConfigError { .. }
            | HitboxError::ConfigValidationError { .. }
            | HitboxError::InvalidConfigValueError { .. }
            | HitboxError::MissingConfigError { .. }
            | HitboxError::ProcessingError { .. } => ErrorSeverity::High,
            HitboxError::IoError(_)
            | HitboxError::ZipError(_)
            | HitboxError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            HitboxError::MalformedInput { .. } => {
                "Re-export the session from the HitBox software and make sure the file is UTF-8 JSON"
            }
            HitboxError::IoError(_) => "Check that the file exists and that the output directory is writable",
            HitboxError::CsvError(_) | HitboxError::TargetError { .. } => {
                "Check the target table: one frequency column and up to three numeric gain columns"
            }
            HitboxError::ConfigError { .. }
            | HitboxError::ConfigValidationError { .. }
            | HitboxError::InvalidConfigValueError { .. }
            | HitboxError::MissingConfigError { .. } => {
                "Review the command line arguments or the TOML job file"
            }
            HitboxError::DimensionMismatch { .. } => {
                "The series has unequal component lengths and was left out; inspect the source file"
            }
            HitboxError::ZipError(_) | HitboxError::SerializationError(_) => {
                "Retry the export; if it keeps failing, disable compression"
            }
            HitboxError::ProcessingError { .. } => "Run again with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            HitboxError::MalformedInput { file, .. } => {
                format!("Could not read '{}' as a HitBox export", file)
            }
            HitboxError::IoError(e) => format!("File access failed: {}", e),
            HitboxError::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            HitboxError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HitboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_is_low_severity() {
        let err = HitboxError::malformed("a.json", "expected value at line 1");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains("a.json"));
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = HitboxError::MissingConfigError {
            field: "input.files".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
