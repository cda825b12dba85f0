//! 실행 엔진 에러 타입.

use std::time::Duration;
use thiserror::Error;
use trader_core::{LegTransitionError, TraderError};
use trader_data::DataError;
use trader_exchange::ExchangeError;

/// 엔진 에러. 하위 crate 에러를 감쌉니다.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Trader(#[from] TraderError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Transition(#[from] LegTransitionError),
}

/// 엔진 작업 Result 타입.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// 다음 사이클에서 그대로 다시 시도해도 되는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Exchange(e) => e.is_retryable(),
            EngineError::Data(e) => e.is_retryable(),
            EngineError::Trader(e) => e.is_retryable(),
            EngineError::Transition(_) => false,
        }
    }

    /// 재시도 전 대기 시간. 브로커 에러가 권장하는 값이 있으면 그 값을 씁니다.
    pub fn retry_delay(&self, fallback: Duration) -> Duration {
        match self {
            EngineError::Exchange(e) => e
                .retry_delay_ms()
                .map(Duration::from_millis)
                .unwrap_or(fallback),
            _ => fallback,
        }
    }

    /// 종목 조회 실패처럼 레그 설정을 고치기 전까지 반복될 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Exchange(e) => e.is_fatal(),
            EngineError::Trader(e) => e.is_critical(),
            _ => false,
        }
    }
}
