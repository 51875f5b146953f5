use clap::Parser;
use std::sync::Arc;
use tamboon::core::ConfigProvider;
use tamboon::utils::error::ErrorSeverity;
use tamboon::utils::{logger, validation::Validate};
use tamboon::{
    AbortSignal, BatchEngine, CliConfig, DonateError, DonationRunner, OmiseGateway, RunReport,
    ShiftedFileSource, TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting tamboon donation batch");

    // Ctrl-C 之後不再啟動新的捐款，進行中的會跑完
    let abort = AbortSignal::new();
    let signal = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, finishing in-flight donations");
            signal.trigger();
        }
    });

    let result = match &cli.config {
        Some(path) => {
            tracing::info!("📄 Loading configuration from {}", path);
            match TomlConfig::from_file(path) {
                Ok(mut file_config) => {
                    file_config.apply_overrides(&cli);
                    execute(&file_config, abort).await
                }
                Err(e) => Err(e),
            }
        }
        None => execute(&cli, abort).await,
    };

    match result {
        Ok(report) => {
            if cli.json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render(cli.verbose));
            }
            tracing::info!(
                "✅ Done: {} confirmed, {} failed",
                report.outcomes.confirmed,
                report.outcomes.failed()
            );
        }
        Err(e) => {
            tracing::error!(
                "❌ Donation run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

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

async fn execute<C>(config: &C, abort: AbortSignal) -> Result<RunReport, DonateError>
where
    C: ConfigProvider + Validate,
{
    config.validate()?;

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }
    tracing::debug!(
        "Gateway vault={} api={} concurrency={}",
        config.vault_endpoint(),
        config.api_endpoint(),
        config.concurrency()
    );

    let gateway = Arc::new(OmiseGateway::from_config(config)?);
    let engine = BatchEngine::new(gateway, config.concurrency()).with_abort_signal(abort);
    let source = ShiftedFileSource::new(config.input_path(), config.shift_offset());

    DonationRunner::new_with_monitoring(
        source,
        engine,
        config.currency(),
        config.monitoring_enabled(),
    )
    .run()
    .await
}
