use clap::Parser;
use hitbox_discovery::utils::error::ErrorSeverity;
use hitbox_discovery::utils::{logger, validation::Validate};
use hitbox_discovery::{BatchPipeline, BatchReport, CliConfig, LocalStorage, ViewerEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_format);

    tracing::info!("Starting hitbox CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 輸入檔案相對於目前目錄，輸出寫到 output_path
    let input = LocalStorage::new(".");
    let output = LocalStorage::new(config.output_path.clone());
    let pipeline = BatchPipeline::new(input, output, config);
    let engine = ViewerEngine::new(pipeline);

    match engine.run().await {
        Ok(output) => {
            print_report(&output.report);
            tracing::info!("✅ Batch completed in {:?}", output.duration);
            println!("✅ Processed {} file(s)", output.report.processed_count());
            println!("📁 Output saved to: {}", output.output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    for failure in &report.failures {
        eprintln!("❌ {}", failure);
    }
    for warning in &report.warnings {
        eprintln!("⚠️ {}", warning);
    }
    if let Some(targets) = &report.targets {
        let labels: Vec<&str> = targets.columns.iter().map(|c| c.label.as_str()).collect();
        println!("🎯 Targets overlaid: {}", labels.join(", "));
    }
}
