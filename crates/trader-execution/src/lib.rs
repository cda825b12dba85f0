//! 전략 실행 엔진.
//!
//! 이 crate는 다음을 제공합니다:
//! - 계좌별 브로커 세션 관리와 주문 제출 ([`AccountManager`])
//! - 레그 주문 추적과 지정가 재주문 ([`OrderTracker`])
//! - 전략/포트/레그 평가 사이클 ([`StrategyRunner`])
//! - 거래 시간 스케줄링 ([`Scheduler`])
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{AccountManager, EngineContext, Journal, Scheduler};
//!
//! let journal = Journal::new(store.clone());
//! let accounts = Arc::new(AccountManager::new(store.clone(), connector, journal.clone(), config.session));
//! let scheduler = Scheduler::new(EngineContext::new(store, accounts, journal, config.scheduler));
//! scheduler.run(shutdown).await;
//! ```

pub mod account_manager;
pub mod clock;
pub mod context;
pub mod error;
pub mod journal;
pub mod order_tracker;
pub mod scheduler;
pub mod strategy_runner;

#[cfg(test)]
mod testkit;

// 주요 타입 재내보내기
pub use account_manager::{AccountManager, LegOrder, OrderQuantity, PlacedOrder};
pub use clock::Clock;
pub use context::EngineContext;
pub use error::{EngineError, EngineResult};
pub use journal::Journal;
pub use order_tracker::{LegActions, OrderTracker, ReplaceOutcome, TicketKind, TrackOutcome};
pub use scheduler::{CycleStats, Scheduler};
pub use strategy_runner::{RunOutcome, StrategyRunner};
