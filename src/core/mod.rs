pub mod batch;
pub mod document;
pub mod engine;
pub mod export;
pub mod extractor;
pub mod series;
pub mod targets;

pub use crate::domain::model::{ExtractedBatch, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TargetSource};
pub use crate::utils::error::Result;
