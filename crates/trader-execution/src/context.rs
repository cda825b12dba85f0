//! 엔진 공유 의존성.

use std::sync::Arc;
use trader_core::SchedulerConfig;
use trader_data::EngineStore;

use crate::account_manager::AccountManager;
use crate::clock::Clock;
use crate::journal::Journal;

/// 스케줄러와 전략 실행기가 공유하는 핸들 묶음.
///
/// 시계는 `scheduler.timezone`의 현지 시각을 씁니다.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn EngineStore>,
    pub accounts: Arc<AccountManager>,
    pub journal: Journal,
    pub config: SchedulerConfig,
    pub clock: Clock,
}

impl EngineContext {
    pub fn new(
        store: Arc<dyn EngineStore>,
        accounts: Arc<AccountManager>,
        journal: Journal,
        config: SchedulerConfig,
    ) -> Self {
        let clock = config.tz().map(Clock::System).unwrap_or_default();
        Self {
            store,
            accounts,
            journal,
            config,
            clock,
        }
    }

    /// 시계를 바꿉니다 (고정 시각 재현, 다른 타임존).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
