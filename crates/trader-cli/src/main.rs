//! 파생상품 실행 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 스키마 적용
//! trader --config config/engine.toml migrate
//!
//! # 설정 확인
//! trader --config config/engine.toml check-config
//!
//! # 엔진 실행 (Ctrl+C로 종료)
//! trader --config config/engine.toml run
//!
//! # 한 사이클만 실행, 디버그 로그
//! trader --log-level debug once
//! ```
//!
//! 설정 파일 없이 `TRADER__DATABASE__URL` 같은 환경 변수만으로도 실행할 수 있습니다.

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use trader_cli::commands::{check_config, migrate, run_forever, run_once};
use trader_core::{init_logging, EngineConfig};

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Derivatives execution engine - 전략/포트/레그 자동 주문", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (TOML)
    #[arg(short, long, global = true, env = "TRADER_CONFIG")]
    config: Option<PathBuf>,

    /// 로그 레벨 (설정 파일의 logging.level을 덮어씀)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 거래 시간 동안 사이클을 계속 실행
    Run,

    /// 모든 전략을 한 번만 실행
    Once,

    /// 설정 검증 후 요약 출력
    CheckConfig,

    /// 데이터베이스 스키마 마이그레이션
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging).map_err(|e| anyhow!("logging init failed: {}", e))?;

    match cli.command {
        Commands::Run => run_forever(&config).await?,

        Commands::Once => {
            let stats = run_once(&config).await?;
            info!(
                strategies = stats.strategies,
                completed = stats.completed,
                failed = stats.failed,
                skipped = stats.skipped,
                failed_ports = stats.failed_ports,
                "Single cycle finished"
            );
        }

        Commands::CheckConfig => {
            print!("{}", check_config(&config)?);
        }

        Commands::Migrate => migrate(&config).await?,
    }

    Ok(())
}
