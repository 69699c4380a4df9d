use std::time::{Duration, Instant};

use crate::core::Pipeline;
use crate::domain::model::BatchReport;
use crate::utils::error::Result;

#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub output_path: String,
    pub report: BatchReport,
    pub duration: Duration,
}

pub struct ViewerEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ViewerEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<EngineOutput> {
        let start_time = Instant::now();
        tracing::info!("🚀 Starting HitBox batch");

        // Extract
        let batch = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Read {} file(s), {} unreadable",
            batch.files.len(),
            batch.failures.len()
        );

        // Transform
        let result = self.pipeline.transform(batch).await?;
        tracing::info!(
            "🔄 Extracted series from {} file(s)",
            result.report.processed_count()
        );

        // Load
        let output_path = self.pipeline.load(&result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);

        Ok(EngineOutput {
            output_path,
            report: result.report,
            duration: start_time.elapsed(),
        })
    }
}
