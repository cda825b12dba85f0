//! 엔진 저장소 경계.
//!
//! 엔진은 [`EngineStore`]로만 영속 데이터에 접근합니다.
//! 구현: [`PgStore`](crate::PgStore) (PostgreSQL), [`MemoryStore`](crate::MemoryStore) (테스트).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trader_core::{
    Account, Alert, Leg, OrderKind, Port, PortFlagUpdate, Side, Strategy, TraderError, User,
};

use crate::error::Result;

/// 운영자 로그 수준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
    Success,
    Pnl,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
            LogLevel::Pnl => "PNL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TraderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "ERROR" => Ok(LogLevel::Error),
            "SUCCESS" => Ok(LogLevel::Success),
            "PNL" => Ok(LogLevel::Pnl),
            _ => Err(TraderError::InvalidInput(format!("unknown log level: {}", s))),
        }
    }
}

/// 주문 제출 기록 (추가 전용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub timestamp: DateTime<Utc>,
    /// 종목 설명
    pub instrument: String,
    pub side: Side,
    pub quantity: i64,
    pub order_type: OrderKind,
    pub price: Decimal,
    pub port_id: i64,
    pub account_id: i64,
}

/// 운영자 로그 한 줄.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub level: LogLevel,
    /// 포트와 무관한 로그는 `None`
    pub port_id: Option<i64>,
}

/// 엔진 영속성 인터페이스.
#[async_trait]
pub trait EngineStore: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<User>;

    async fn get_strategies(&self) -> Result<Vec<Strategy>>;

    /// 삭제된 전략이면 `None`.
    async fn get_strategy(&self, strategy_id: i64) -> Result<Option<Strategy>>;

    async fn get_accounts(&self) -> Result<Vec<Account>>;

    async fn get_account(&self, account_id: i64) -> Result<Account>;

    async fn get_ports(&self, strategy_id: i64) -> Result<Vec<Port>>;

    /// 포트 플래그 하나를 기록합니다.
    async fn update_port_flags(&self, port_id: i64, update: PortFlagUpdate) -> Result<()>;

    /// 포트와 레그 설정을 새 이름으로 복제하고 새 포트 ID를 반환합니다.
    ///
    /// 새 포트는 재실행 포트로 표시되고 버튼/합산 청산 플래그가 초기화됩니다.
    /// 새 레그는 포지션 없음 상태로 시작합니다.
    async fn clone_port(&self, new_name: &str, port: &Port, strategy_id: i64) -> Result<i64>;

    async fn get_legs(&self, port_id: i64) -> Result<Vec<Leg>>;

    /// 레그 실행 상태 전체를 한 번에 기록합니다.
    async fn save_leg(&self, leg: &Leg) -> Result<()>;

    async fn add_order(&self, order: OrderRecord) -> Result<()>;

    async fn add_log(&self, log: LogRecord) -> Result<()>;

    /// 포트의 대기 중 알림.
    async fn get_pending_alerts(&self, port_id: i64) -> Result<Vec<Alert>>;

    /// 알림을 소비 완료로 표시합니다.
    async fn complete_alert(&self, alert_id: i64) -> Result<()>;
}
