use crate::core::batch::process_batch;
use crate::core::export::{build_charts, build_tables, report_json};
use crate::core::extractor::SeriesExtractor;
use crate::core::targets::{TargetCache, TargetTable};
use crate::core::{ConfigProvider, ExtractedBatch, Pipeline, Storage, TargetSource, TransformResult};
use crate::domain::model::{default_label, FileFailure, SourceFile};
use crate::utils::error::{HitboxError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use zip::write::{FileOptions, ZipWriter};

/// Batch Pipeline：讀取 HitBox 匯出檔、萃取序列並輸出圖表資料與表格
pub struct BatchPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) input: S,
    pub(crate) output: S,
    pub(crate) config: C,
    pub(crate) extractor: SeriesExtractor,
    pub(crate) target_cache: Arc<Mutex<TargetCache>>,
}

impl<S: Storage, C: ConfigProvider> BatchPipeline<S, C> {
    pub fn new(input: S, output: S, config: C) -> Self {
        let extractor = SeriesExtractor::new(config.layout());
        Self {
            input,
            output,
            config,
            extractor,
            target_cache: Arc::new(Mutex::new(TargetCache::new())),
        }
    }

    /// 共用目標表快取（例如同一個行程內重複執行批次）
    pub fn with_target_cache(mut self, cache: Arc<Mutex<TargetCache>>) -> Self {
        self.target_cache = cache;
        self
    }

    fn label_for(&self, file_name: &str) -> String {
        self.config
            .label_for(file_name)
            .unwrap_or_else(|| default_label(file_name))
    }

    fn cached_targets(&self, source: &TargetSource, bytes: &[u8]) -> Result<Arc<TargetTable>> {
        let mut cache = self
            .target_cache
            .lock()
            .map_err(|e| HitboxError::ProcessingError {
                message: format!("Target cache unavailable: {}", e),
            })?;
        cache.load(&source.path, bytes, &source.columns)
    }

    async fn load_targets(&self) -> Result<Option<Arc<TargetTable>>> {
        let Some(source) = self.config.target_source() else {
            return Ok(None);
        };

        tracing::debug!("Reading target table from: {}", source.path);
        let bytes = self.input.read_file(&source.path).await?;
        let table = self.cached_targets(&source, &bytes)?;
        Ok(Some(table))
    }

    fn metadata_json(&self, result: &TransformResult) -> Result<String> {
        let mut metadata = HashMap::new();
        metadata.insert(
            "job_name".to_string(),
            serde_json::Value::String(self.config.job_name().to_string()),
        );
        metadata.insert(
            "generated_at".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        metadata.insert(
            "files_processed".to_string(),
            serde_json::Value::Number(result.report.entries.len().into()),
        );
        metadata.insert(
            "files_failed".to_string(),
            serde_json::Value::Number(result.report.failures.len().into()),
        );
        metadata.insert(
            "warnings".to_string(),
            serde_json::Value::Number(result.report.warnings.len().into()),
        );
        if let Some(targets) = &result.report.targets {
            let labels = targets
                .columns
                .iter()
                .map(|c| serde_json::Value::String(c.label.clone()))
                .collect();
            metadata.insert("targets".to_string(), serde_json::Value::Array(labels));
        }
        Ok(serde_json::to_string_pretty(&metadata)?)
    }

    /// 依輸出格式收集要寫出的檔案
    fn output_files(&self, result: &TransformResult) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();

        for format in self.config.output_formats() {
            match format.as_str() {
                "csv" => files.extend(result.csv_output.iter().cloned()),
                "tsv" => files.extend(result.tsv_output.iter().cloned()),
                "json" => files.push(("chart_data.json".to_string(), result.chart_json.clone())),
                other => {
                    tracing::warn!("🔶 Unsupported output format: {}", other);
                }
            }
        }

        files.push(("report.json".to_string(), result.report_json.clone()));

        if self.config.include_metadata() {
            files.push(("metadata.json".to_string(), self.metadata_json(result)?));
        }
        Ok(files)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BatchPipeline<S, C> {
    async fn extract(&self) -> Result<ExtractedBatch> {
        let mut batch = ExtractedBatch::default();

        tracing::info!(
            "📂 Reading {} HitBox export(s)",
            self.config.input_files().len()
        );

        for file_name in self.config.input_files() {
            let label = self.label_for(file_name);

            // 單一檔案讀取失敗不中斷整批
            match self.input.read_file(file_name).await {
                Ok(contents) => {
                    tracing::debug!("Read '{}' ({} bytes)", file_name, contents.len());
                    batch.files.push(SourceFile {
                        file_name: file_name.clone(),
                        label,
                        contents,
                    });
                }
                Err(e) => {
                    tracing::error!("❌ Could not read '{}': {}", file_name, e);
                    batch.failures.push(FileFailure {
                        file_name: file_name.clone(),
                        label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        batch.targets = self.load_targets().await?;
        Ok(batch)
    }

    async fn transform(&self, batch: ExtractedBatch) -> Result<TransformResult> {
        tracing::info!("🔧 Extracting series from {} file(s)", batch.files.len());

        let mut report = process_batch(&self.extractor, &batch.files, batch.targets);
        let mut failures = batch.failures;
        failures.append(&mut report.failures);
        report.failures = failures;

        let tables = build_tables(&report)?;
        let mut csv_output = Vec::with_capacity(tables.len());
        let mut tsv_output = Vec::with_capacity(tables.len());
        for table in &tables {
            csv_output.push((format!("{}.csv", table.name), table.to_delimited(b',')?));
            tsv_output.push((format!("{}.tsv", table.name), table.to_delimited(b'\t')?));
        }

        let chart_json = serde_json::to_string_pretty(&build_charts(&report))?;
        let report_json = report_json(&report)?;

        tracing::info!(
            "✅ Transform complete: {} table(s), {} file(s) charted",
            tables.len(),
            report.entries.len()
        );

        Ok(TransformResult {
            report,
            csv_output,
            tsv_output,
            chart_json,
            report_json,
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<String> {
        let files = self.output_files(result)?;

        if !self.config.compression_enabled() {
            for (name, contents) in &files {
                self.output.write_file(name, contents.as_bytes()).await?;
            }
            tracing::info!("💾 Wrote {} file(s) to {}", files.len(), self.config.output_path());
            return Ok(self.config.output_path().to_string());
        }

        let archive_name = self.config.archive_name();
        tracing::debug!("Creating ZIP file with {} files", files.len());

        // 創建ZIP文件
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            for (name, contents) in &files {
                zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                zip.write_all(contents.as_bytes())?;
            }

            // 完成並取回底層 Vec<u8>
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.output.write_file(archive_name, &zip_data).await?;

        let output_path = format!("{}/{}", self.config.output_path(), archive_name);
        tracing::info!("📦 Export saved: {}", output_path);
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::DocumentLayout;
    use crate::core::targets::TargetColumns;
    use std::io::Read;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<AsyncMutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(AsyncMutex::new(HashMap::new())),
            }
        }

        async fn put(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                HitboxError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_files: Vec<String>,
        labels: HashMap<String, String>,
        targets: Option<TargetSource>,
        output_formats: Vec<String>,
        compression: bool,
    }

    impl MockConfig {
        fn new(input_files: &[&str]) -> Self {
            Self {
                input_files: input_files.iter().map(|f| f.to_string()).collect(),
                labels: HashMap::new(),
                targets: None,
                output_formats: vec!["csv".to_string(), "json".to_string()],
                compression: true,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn job_name(&self) -> &str {
            "test-job"
        }

        fn input_files(&self) -> &[String] {
            &self.input_files
        }

        fn label_for(&self, file_name: &str) -> Option<String> {
            self.labels.get(file_name).cloned()
        }

        fn target_source(&self) -> Option<TargetSource> {
            self.targets.clone()
        }

        fn layout(&self) -> DocumentLayout {
            DocumentLayout::default()
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn compression_enabled(&self) -> bool {
            self.compression
        }

        fn archive_name(&self) -> &str {
            "hitbox_export.zip"
        }

        fn include_metadata(&self) -> bool {
            true
        }
    }

    const VISIT: &str = r#"{"Sessions": [
        {"DataSets": {"Data": {"Collection": [
            {"Earside": "Right", "Collection": [{"Frequency": 250, "Level": 10}]}
        ]}}},
        {"DataSets": [{"Data": {"Collection": [
            {"Points": [{"Frequency": 1000, "Input": 50, "Output": 62}]}
        ]}}]}
    ]}"#;

    #[tokio::test]
    async fn test_extract_records_unreadable_files() {
        let storage = MockStorage::new();
        storage.put("visit.json", VISIT.as_bytes()).await;

        let mut config = MockConfig::new(&["visit.json", "missing.json"]);
        config
            .labels
            .insert("visit.json".to_string(), "Patient A".to_string());
        let pipeline = BatchPipeline::new(storage.clone(), storage, config);

        let batch = pipeline.extract().await.unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.files[0].label, "Patient A");
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].label, "missing");
    }

    #[tokio::test]
    async fn test_full_run_writes_zip() {
        let storage = MockStorage::new();
        storage.put("visit.json", VISIT.as_bytes()).await;
        storage.put("broken.json", b"{ nope").await;

        let config = MockConfig::new(&["visit.json", "broken.json"]);
        let pipeline = BatchPipeline::new(storage.clone(), storage.clone(), config);

        let batch = pipeline.extract().await.unwrap();
        let result = pipeline.transform(batch).await.unwrap();
        assert_eq!(result.report.entries.len(), 1);
        assert_eq!(result.report.failures.len(), 1);

        let output_path = pipeline.load(&result).await.unwrap();
        assert_eq!(output_path, "test_output/hitbox_export.zip");

        let zip_data = storage.get_file("hitbox_export.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        let names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
        assert!(names.contains(&"audiogram.csv".to_string()));
        assert!(names.contains(&"probe_curves.csv".to_string()));
        assert!(names.contains(&"chart_data.json".to_string()));
        assert!(names.contains(&"report.json".to_string()));
        assert!(names.contains(&"metadata.json".to_string()));
        assert!(!names.contains(&"audiogram.tsv".to_string()));

        let mut probe_csv = String::new();
        archive
            .by_name("probe_curves.csv")
            .unwrap()
            .read_to_string(&mut probe_csv)
            .unwrap();
        assert!(probe_csv.contains("visit.json,visit,REM 1,1000,50,62,12"));
    }

    #[tokio::test]
    async fn test_uncompressed_output_with_targets() {
        let storage = MockStorage::new();
        storage.put("visit.json", VISIT.as_bytes()).await;
        storage
            .put("targets.csv", b"Frequency,NL3\n500,10\n2000,16\n")
            .await;

        let mut config = MockConfig::new(&["visit.json"]);
        config.compression = false;
        config.output_formats = vec!["tsv".to_string()];
        config.targets = Some(TargetSource {
            path: "targets.csv".to_string(),
            columns: TargetColumns {
                gains: vec![1],
                ..TargetColumns::default()
            },
        });
        let pipeline = BatchPipeline::new(storage.clone(), storage.clone(), config);

        let batch = pipeline.extract().await.unwrap();
        assert!(batch.targets.is_some());
        let result = pipeline.transform(batch).await.unwrap();
        let output_path = pipeline.load(&result).await.unwrap();
        assert_eq!(output_path, "test_output");

        assert!(storage.get_file("audiogram.tsv").await.is_some());
        assert!(storage.get_file("target_deviation.tsv").await.is_some());
        assert!(storage.get_file("audiogram.csv").await.is_none());
        assert!(storage.get_file("report.json").await.is_some());
    }

    #[tokio::test]
    async fn test_missing_target_file_fails_extract() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new(&[]);
        config.targets = Some(TargetSource {
            path: "nowhere.csv".to_string(),
            columns: TargetColumns::default(),
        });
        let pipeline = BatchPipeline::new(storage.clone(), storage, config);
        assert!(pipeline.extract().await.is_err());
    }

    #[tokio::test]
    async fn test_shared_target_cache_across_runs() {
        let storage = MockStorage::new();
        storage.put("visit.json", VISIT.as_bytes()).await;
        storage
            .put("targets.csv", b"Frequency,NL3\n500,10\n2000,16\n")
            .await;

        let targets = TargetSource {
            path: "targets.csv".to_string(),
            columns: TargetColumns {
                gains: vec![1],
                ..TargetColumns::default()
            },
        };
        let cache = Arc::new(Mutex::new(TargetCache::new()));

        let mut first_config = MockConfig::new(&["visit.json"]);
        first_config.targets = Some(targets.clone());
        let first = BatchPipeline::new(storage.clone(), storage.clone(), first_config)
            .with_target_cache(Arc::clone(&cache));
        let first_targets = first.extract().await.unwrap().targets.unwrap();

        let mut second_config = MockConfig::new(&["visit.json"]);
        second_config.targets = Some(targets);
        let second = BatchPipeline::new(storage.clone(), storage, second_config)
            .with_target_cache(Arc::clone(&cache));
        let second_targets = second.extract().await.unwrap().targets.unwrap();

        assert!(Arc::ptr_eq(&first_targets, &second_targets));
        assert_eq!(cache.lock().unwrap().len(), 1);
    }
}
