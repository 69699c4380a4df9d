use crate::core::document::DocumentLayout;
use crate::core::targets::TargetColumns;
use crate::domain::model::{ExtractedBatch, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Where to find the prescription-target table and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSource {
    pub path: String,
    pub columns: TargetColumns,
}

pub trait ConfigProvider: Send + Sync {
    fn job_name(&self) -> &str;
    fn input_files(&self) -> &[String];
    fn label_for(&self, file_name: &str) -> Option<String>;
    fn target_source(&self) -> Option<TargetSource>;
    fn layout(&self) -> DocumentLayout;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compression_enabled(&self) -> bool;
    fn archive_name(&self) -> &str;
    fn include_metadata(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractedBatch>;
    async fn transform(&self, batch: ExtractedBatch) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<String>;
}
