//! 스케줄러.
//!
//! 거래 시간 안에서는 사이클을 연속으로 돌리고, 밖에서는 주기적으로 다시 확인합니다.
//! 사이클마다 전략 목록을 새로 읽고 전략마다 새 [`StrategyRunner`]를 만듭니다.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use trader_core::Strategy;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::strategy_runner::{RunOutcome, StrategyRunner};

/// 한 사이클 요약.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// 실행한 전략 수
    pub strategies: usize,
    /// 포트 평가까지 마친 전략 수
    pub completed: usize,
    /// 에러로 끝난 전략 수
    pub failed: usize,
    /// 로그인 실패, 세션 비정상, 주문장 실패, 삭제로 건너뛴 전략 수
    pub skipped: usize,
    /// 실패한 포트 수 (완료된 전략 기준)
    pub failed_ports: usize,
}

impl CycleStats {
    fn record(&mut self, outcome: &EngineResult<RunOutcome>) {
        match outcome {
            Ok(RunOutcome::Completed { failed, .. }) => {
                self.completed += 1;
                self.failed_ports += failed;
            }
            Ok(_) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// 전략 스케줄러.
#[derive(Debug, Clone)]
pub struct Scheduler {
    ctx: EngineContext,
}

impl Scheduler {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// 종료 신호까지 실행합니다.
    ///
    /// 사이클이 실패하면 바로 다시 돌지 않고 대기 후 재시도합니다.
    /// 종료 신호를 받으면 진행 중인 사이클을 마친 뒤 세션을 닫고 반환합니다.
    pub async fn run(&self, shutdown: CancellationToken) {
        let config = &self.ctx.config;
        info!(
            window_start = %config.window_start,
            window_end = %config.window_end,
            timezone = %config.timezone,
            "Scheduler started"
        );

        while !shutdown.is_cancelled() {
            let now = self.ctx.clock.time();
            if !config.in_window(now) {
                info!(now = %now, "Waiting for trading window");
                tokio::select! {
                    _ = tokio::time::sleep(config.idle_poll()) => {}
                    _ = shutdown.cancelled() => break,
                }
                continue;
            }

            let pause = match self.run_cycle().await {
                Ok(stats) => {
                    info!(
                        strategies = stats.strategies,
                        completed = stats.completed,
                        failed = stats.failed,
                        skipped = stats.skipped,
                        failed_ports = stats.failed_ports,
                        "Cycle finished"
                    );
                    config.cycle_pause()
                }
                Err(e) => {
                    // 재시도해도 소용없는 에러는 거래 시간 밖과 같은 간격으로 다시 확인
                    let backoff = if e.is_retryable() {
                        e.retry_delay(config.error_backoff())
                    } else {
                        config.idle_poll().max(config.error_backoff())
                    };
                    error!(
                        error = %e,
                        retryable = e.is_retryable(),
                        backoff_ms = backoff.as_millis() as u64,
                        "Cycle failed"
                    );
                    backoff
                }
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }

        info!("Scheduler stopping");
        self.ctx.accounts.shutdown().await;
    }

    /// 모든 전략을 한 번씩 실행합니다.
    pub async fn run_cycle(&self) -> EngineResult<CycleStats> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);

        async {
            let strategies = self.ctx.store.get_strategies().await?;
            let workers = self.ctx.config.strategy_workers.max(1);

            let outcomes: Vec<(String, EngineResult<RunOutcome>)> = stream::iter(strategies)
                .map(|strategy| async move {
                    let name = strategy.name.clone();
                    (name, self.run_strategy(strategy).await)
                })
                .buffer_unordered(workers)
                .collect()
                .await;

            let mut stats = CycleStats {
                strategies: outcomes.len(),
                ..CycleStats::default()
            };
            for (name, outcome) in &outcomes {
                if let Err(e) = outcome {
                    error!(strategy = %name, error = %e, "Strategy cycle failed");
                }
                stats.record(outcome);
            }
            Ok(stats)
        }
        .instrument(span)
        .await
    }

    async fn run_strategy(&self, strategy: Strategy) -> EngineResult<RunOutcome> {
        let mut runner = StrategyRunner::new(strategy, self.ctx.clone()).await?;
        runner.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_manager::AccountManager;
    use crate::clock::Clock;
    use crate::journal::Journal;
    use crate::testkit::{fast_config, CONTRACTS};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use trader_core::{Account, Alert, Leg, Port, PortFlagUpdate, SchedulerConfig, User};
    use trader_data::{DataError, EngineStore, LogRecord, MemoryStore, OrderRecord};
    use trader_exchange::{parse_master_csv, PaperBroker, PaperConnector, PaperFeed};

    /// 전략 목록 조회만 실패하는 저장소 (DB 장애 재현).
    struct StrategiesDown {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EngineStore for StrategiesDown {
        async fn get_user(&self, user_id: i64) -> trader_data::Result<User> {
            self.inner.get_user(user_id).await
        }

        async fn get_strategies(&self) -> trader_data::Result<Vec<Strategy>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DataError::ConnectionError("connection refused".into()))
        }

        async fn get_strategy(&self, strategy_id: i64) -> trader_data::Result<Option<Strategy>> {
            self.inner.get_strategy(strategy_id).await
        }

        async fn get_accounts(&self) -> trader_data::Result<Vec<Account>> {
            self.inner.get_accounts().await
        }

        async fn get_account(&self, account_id: i64) -> trader_data::Result<Account> {
            self.inner.get_account(account_id).await
        }

        async fn get_ports(&self, strategy_id: i64) -> trader_data::Result<Vec<Port>> {
            self.inner.get_ports(strategy_id).await
        }

        async fn update_port_flags(
            &self,
            port_id: i64,
            update: PortFlagUpdate,
        ) -> trader_data::Result<()> {
            self.inner.update_port_flags(port_id, update).await
        }

        async fn clone_port(
            &self,
            new_name: &str,
            port: &Port,
            strategy_id: i64,
        ) -> trader_data::Result<i64> {
            self.inner.clone_port(new_name, port, strategy_id).await
        }

        async fn get_legs(&self, port_id: i64) -> trader_data::Result<Vec<Leg>> {
            self.inner.get_legs(port_id).await
        }

        async fn save_leg(&self, leg: &Leg) -> trader_data::Result<()> {
            self.inner.save_leg(leg).await
        }

        async fn add_order(&self, order: OrderRecord) -> trader_data::Result<()> {
            self.inner.add_order(order).await
        }

        async fn add_log(&self, log: LogRecord) -> trader_data::Result<()> {
            self.inner.add_log(log).await
        }

        async fn get_pending_alerts(&self, port_id: i64) -> trader_data::Result<Vec<Alert>> {
            self.inner.get_pending_alerts(port_id).await
        }

        async fn complete_alert(&self, alert_id: i64) -> trader_data::Result<()> {
            self.inner.complete_alert(alert_id).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_cycle_backs_off() {
        let store = Arc::new(StrategiesDown {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        });
        let shared: Arc<dyn EngineStore> = store.clone();
        let journal = Journal::new(shared.clone());
        let accounts = Arc::new(AccountManager::new(
            shared.clone(),
            Arc::new(PaperConnector::new(
                PaperBroker::new(parse_master_csv(CONTRACTS).unwrap()),
                PaperFeed::new(),
            )),
            journal.clone(),
            fast_config(),
        ));
        let config = SchedulerConfig {
            error_backoff_ms: 100,
            ..SchedulerConfig::default()
        };
        let at = NaiveDate::from_ymd_opt(2024, 1, 25)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let ctx = EngineContext::new(shared, accounts, journal, config).with_clock(Clock::Fixed(at));

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            stop.cancel();
        });
        Scheduler::new(ctx).run(shutdown).await;

        // 100ms 간격이면 450ms 동안 대략 5번
        let calls = store.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "cycle retried {} times", calls);
        assert!(calls <= 6, "cycle retried {} times", calls);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = CycleStats::default();
        stats.record(&Ok(RunOutcome::Completed { ports: 3, failed: 1 }));
        stats.record(&Ok(RunOutcome::NotLoggedIn));
        stats.record(&Ok(RunOutcome::Deleted));
        stats.record(&Err(trader_core::TraderError::Internal("boom".into()).into()));

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed_ports, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 1);
    }
}
