use hitbox_discovery::{
    process_batch, BatchPipeline, LocalStorage, SeriesExtractor, SourceFile, TomlConfig,
    ViewerEngine,
};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const VALID_VISIT: &str = r#"{"Sessions": [
    {"DataSets": {"Data": {"Collection": [
        {"Earside": "Right", "Collection": [{"Frequency": 500, "Level": 20}, {"Frequency": 1000, "Level": 30}]}
    ]}}},
    {"DataSets": [{"Data": {"Collection": [
        {"Points": [{"Frequency": 500, "Input": 50, "Output": 58}, {"Frequency": 1000, "Input": 50, "Output": 62}]}
    ]}}]}
]}"#;

fn demos_dir() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
}

#[test]
fn test_malformed_file_does_not_affect_the_rest_of_the_batch() {
    let files = vec![
        SourceFile::new("a.json", VALID_VISIT.as_bytes().to_vec()),
        SourceFile::new("broken.json", b"{\"Sessions\": [".to_vec()),
        SourceFile::new("c.json", VALID_VISIT.as_bytes().to_vec()).with_label("Visit C"),
    ];

    let report = process_batch(&SeriesExtractor::default(), &files, None);

    assert_eq!(report.processed_count(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file_name, "broken.json");
    assert_eq!(report.failures[0].label, "broken");

    let labels: Vec<&str> = report.entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["a", "Visit C"]);
    assert!(report
        .entries
        .iter()
        .all(|e| e.result.probe_curves.as_ref().map(Vec::len) == Some(1)));
}

#[tokio::test]
async fn test_toml_job_runs_end_to_end_into_zip() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let content = format!(
        r#"
[job]
name = "integration"

[input]
base_dir = "{}"
files = ["visit_right_left.json", "missing.json"]

[targets]
path = "Targets.csv"
gain_columns = [4, 5, 6]

[output]
output_path = "{}"
output_formats = ["csv", "json"]
"#,
        demos_dir().to_string_lossy().replace('\\', "/"),
        output_path.replace('\\', "/")
    );
    let config = TomlConfig::from_toml_str(&content).unwrap();

    let input = LocalStorage::new(config.input_root());
    let output = LocalStorage::new(output_path.clone());
    let engine = ViewerEngine::new(BatchPipeline::new(input, output, config));

    let result = engine.run().await.unwrap();

    assert!(result.output_path.ends_with("hitbox_export.zip"));
    assert_eq!(result.report.processed_count(), 1);
    assert_eq!(result.report.failures.len(), 1);
    assert_eq!(result.report.failures[0].file_name, "missing.json");

    let targets = result.report.targets.as_ref().unwrap();
    let labels: Vec<&str> = targets.columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["NL3 Soft", "NL3 Medium", "NL3 Loud"]);

    let zip_path = Path::new(&output_path).join("hitbox_export.zip");
    let zip_data = std::fs::read(&zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();

    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "audiogram.csv",
            "chart_data.json",
            "metadata.json",
            "probe_curves.csv",
            "report.json",
            "target_deviation.csv",
        ]
    );

    let mut chart_json = String::new();
    archive
        .by_name("chart_data.json")
        .unwrap()
        .read_to_string(&mut chart_json)
        .unwrap();
    let charts: serde_json::Value = serde_json::from_str(&chart_json).unwrap();
    let gain_series = charts["insertion_gain"]["series"].as_array().unwrap();
    let names: Vec<&str> = gain_series
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"visit_right_left - REM 1"));
    assert!(names.contains(&"visit_right_left - REM 2"));
    assert!(names.contains(&"NL3 Medium"));
}

#[tokio::test]
async fn test_uncompressed_output_writes_loose_files() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let content = format!(
        r#"
[job]
name = "loose"

[input]
base_dir = "{}"
files = ["visit_right_left.json"]

[input.labels]
"visit_right_left.json" = "Demo Visit"

[output]
output_path = "{}"
output_formats = ["tsv"]

[output.compression]
enabled = false
include_metadata = false
"#,
        demos_dir().to_string_lossy().replace('\\', "/"),
        output_path.replace('\\', "/")
    );
    let config = TomlConfig::from_toml_str(&content).unwrap();

    let input = LocalStorage::new(config.input_root());
    let output = LocalStorage::new(output_path.clone());
    let result = ViewerEngine::new(BatchPipeline::new(input, output, config))
        .run()
        .await
        .unwrap();

    assert_eq!(result.output_path, output_path);
    assert!(result.report.targets.is_none());

    let audiogram = std::fs::read_to_string(temp_dir.path().join("audiogram.tsv")).unwrap();
    let mut lines = audiogram.lines();
    assert_eq!(
        lines.next().unwrap(),
        "file_name\tlabel\tfrequency_hz\tright_db_hl\tleft_db_hl"
    );
    assert!(lines.all(|line| line.contains("Demo Visit")));

    assert!(temp_dir.path().join("report.json").exists());
    assert!(!temp_dir.path().join("metadata.json").exists());
    assert!(!temp_dir.path().join("chart_data.json").exists());
}
