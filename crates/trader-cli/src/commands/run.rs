//! 엔진 실행 명령어.
//!
//! PostgreSQL 저장소와 Multitrade 커넥터로 엔진을 구성합니다.
//!
//! ```bash
//! # 종료 신호(Ctrl+C)까지 실행
//! trader run
//!
//! # 거래 시간과 무관하게 한 사이클만 실행
//! trader once
//! ```

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use trader_core::EngineConfig;
use trader_data::{Database, EngineStore, PgStore};
use trader_exchange::MultitradeConnector;
use trader_execution::{AccountManager, CycleStats, EngineContext, Journal, Scheduler};

/// 설정으로 엔진 컨텍스트를 만듭니다.
pub async fn build_context(config: &EngineConfig) -> Result<EngineContext> {
    let db = Database::connect(&config.database).await?;
    let store: Arc<dyn EngineStore> = Arc::new(PgStore::new(db));
    let journal = Journal::new(store.clone());
    let accounts = Arc::new(AccountManager::new(
        store.clone(),
        Arc::new(MultitradeConnector),
        journal.clone(),
        config.session.clone(),
    ));
    Ok(EngineContext::new(
        store,
        accounts,
        journal,
        config.scheduler.clone(),
    ))
}

/// 종료 신호까지 스케줄러를 실행합니다.
pub async fn run_forever(config: &EngineConfig) -> Result<()> {
    let scheduler = Scheduler::new(build_context(config).await?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.cancel();
    });

    scheduler.run(shutdown).await;
    info!("Engine stopped");
    Ok(())
}

/// 한 사이클만 실행하고 세션을 닫습니다.
pub async fn run_once(config: &EngineConfig) -> Result<CycleStats> {
    let ctx = build_context(config).await?;
    let accounts = ctx.accounts.clone();
    let stats = Scheduler::new(ctx).run_cycle().await;
    accounts.shutdown().await;
    Ok(stats?)
}
