//! 일봉 시세 수집기 CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trader_collector::scheduler::run_daily;
use trader_collector::{CollectorContext, JobRun};
use trader_core::{init_logging, AppConfig, LogConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "trader-collector")]
#[command(about = "KIS daily price collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). 없으면 설정 파일 값
    #[arg(long)]
    log_level: Option<String>,

    /// 설정 파일 경로
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 시작 전에 DB 마이그레이션 실행
    #[arg(long)]
    migrate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 일일 수집 1회 실행
    Collect,

    /// 백필 1회 실행
    Backfill,

    /// 데몬 모드: 매일 설정된 시각에 백필과 일일 수집 실행
    Daemon,

    /// 토큰 암호화 키 생성 (secrets.token_key)
    GenKey,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::GenKey = cli.command {
        println!("{}", trader_core::crypto::generate_master_key());
        return Ok(());
    }

    let app = AppConfig::load(&cli.config)?;

    let mut log_config = LogConfig::from_settings(&app.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config)?;

    tracing::info!(config = %cli.config.display(), "Daily price collector starting");

    let context = CollectorContext::build(&app).await?;
    if cli.migrate {
        context.database.migrate().await?;
    }

    match cli.command {
        Commands::Collect => report(context.jobs.collect_daily_prices().await),
        Commands::Backfill => report(context.jobs.backfill_historical_prices().await),
        Commands::Daemon => {
            let daemon = context.config.daemon;
            tracing::info!(
                backfill_time = %daemon.backfill_time,
                collection_time = %daemon.collection_time,
                "=== Daemon mode (Asia/Seoul) ==="
            );

            let jobs = &context.jobs;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
                _ = run_daily(trader_collector::config::BACKFILL_JOB, daemon.backfill_time, || async {
                    report(jobs.backfill_historical_prices().await);
                }) => {}
                _ = run_daily(trader_collector::config::COLLECT_JOB, daemon.collection_time, || async {
                    report(jobs.collect_daily_prices().await);
                }) => {}
            }
        }
        Commands::GenKey => {}
    }

    context.database.pool().close().await;
    tracing::info!("Daily price collector stopped");

    Ok(())
}

/// 실행 결과 로그. 요약은 실행기가 이미 남깁니다.
fn report(run: JobRun<trader_collector::Result<trader_collector::BatchOutcome>>) {
    match run {
        JobRun::Executed(Ok(outcome)) => {
            tracing::debug!(outcome = ?outcome, "Job finished");
        }
        JobRun::Executed(Err(_)) => {}
        JobRun::Skipped => {
            tracing::info!("Job skipped");
        }
    }
}
