//! 실행 엔진 공통 에러 타입.
//!
//! 도메인 모델 파싱, 설정 검증, 레그 상태 전이에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (알 수 없는 스크립, 잘못된 SL 문자열 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 레그 상태 전이 에러
    #[error(transparent)]
    Transition(#[from] LegTransitionError),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl TraderError {
    /// 다음 사이클에서 재시도할 수 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TraderError::NotFound(_))
    }

    /// 프로세스를 중단해야 하는 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, TraderError::Config(_))
    }
}

impl From<serde_json::Error> for TraderError {
    fn from(err: serde_json::Error) -> Self {
        TraderError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}

/// 허용되지 않은 레그 상태 전이.
///
/// 레그는 `no_position → entered → exited → no_position` 순서로만 진행하며,
/// 브로커 거절 시의 되돌리기(`entered → no_position`, `exited → entered`)만 예외로 허용됩니다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("레그 #{leg_id}: '{from}' 상태에서 {action} 불가")]
pub struct LegTransitionError {
    /// 레그 ID
    pub leg_id: i64,
    /// 현재 상태 이름
    pub from: &'static str,
    /// 시도한 동작
    pub action: &'static str,
}
