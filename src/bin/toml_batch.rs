use anyhow::Context;
use clap::Parser;
use hitbox_discovery::core::ConfigProvider;
use hitbox_discovery::utils::error::ErrorSeverity;
use hitbox_discovery::utils::logger::{self, LogFormat};
use hitbox_discovery::utils::validation::Validate;
use hitbox_discovery::{BatchPipeline, LocalStorage, TomlConfig, ViewerEngine};

#[derive(Parser)]
#[command(name = "toml-batch")]
#[command(about = "Process a batch of HitBox exports described by a TOML job file")]
struct Args {
    /// Path to TOML job file
    #[arg(short, long, default_value = "hitbox-job.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override the output directory from the job file
    #[arg(long)]
    output_path: Option<String>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load job file '{}'", args.config))?;

    // 應用命令列覆蓋設定
    if let Some(output_path) = &args.output_path {
        config.output.output_path = output_path.clone();
    }

    let format = config
        .log_format()
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or_default();
    logger::init_logger(args.verbose || config.verbose(), format);

    tracing::info!("🚀 Starting TOML batch: {}", config.job.name);
    tracing::info!("📁 Job file: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    let input = LocalStorage::new(config.input_root());
    let output = LocalStorage::new(config.output_path());
    let pipeline = BatchPipeline::new(input, output, config);
    let engine = ViewerEngine::new(pipeline);

    match engine.run().await {
        Ok(output) => {
            for failure in &output.report.failures {
                eprintln!("❌ {}", failure);
            }
            for warning in &output.report.warnings {
                eprintln!("⚠️ {}", warning);
            }
            println!(
                "✅ Batch completed: {} processed, {} failed",
                output.report.processed_count(),
                output.report.failures.len()
            );
            println!("📁 Output saved to: {}", output.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

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

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Job Summary:");
    println!("  Job: {}", config.job.name);
    if let Some(description) = &config.job.description {
        println!("  Description: {}", description);
    }
    println!("  Inputs: {} file(s) under {}", config.input.files.len(), config.input_root());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output.output_formats.join(", "));
    if config.compression_enabled() {
        println!("  Archive: {}", config.archive_name());
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📂 Input Files:");
    for (file, resolved) in config.input.files.iter().zip(config.resolved_files()) {
        let label = config
            .label_for(file)
            .unwrap_or_else(|| hitbox_discovery::domain::model::default_label(file));
        let exists = std::path::Path::new(&resolved).exists();
        println!(
            "  {} {} -> \"{}\"",
            if exists { "✅" } else { "❌" },
            resolved,
            label
        );
    }

    if let Some(source) = config.target_source() {
        println!();
        println!("🎯 Targets:");
        println!("  Path: {}", source.path);
        println!("  Frequency column: {}", source.columns.frequency);
        println!("  Gain columns: {:?}", source.columns.gains);
        if !source.columns.labels.is_empty() {
            println!("  Labels: {}", source.columns.labels.join(", "));
        }
    }

    let layout = config.layout();
    println!();
    println!("🧭 Document Layout:");
    println!("  Audiometric session: {}", layout.audiometric_session);
    println!("  Probe session: {}", layout.probe_session);

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
