pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::pipelines::BatchPipeline;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::{
    batch::process_batch,
    engine::{EngineOutput, ViewerEngine},
    extractor::SeriesExtractor,
    targets::{TargetCache, TargetColumns, TargetTable},
};
pub use domain::model::{
    AudiometricPoint, BatchReport, Ear, Extraction, ExtractionResult, ExtractionWarning,
    ProbeCurve, ProbePoint, SourceFile,
};
pub use utils::error::{HitboxError, Result};
