//! 운영자 로그.
//!
//! 운영자에게 보이는 모든 메시지는 `tracing`과 로그 테이블에 함께 남깁니다.
//! 로그 테이블 기록 실패는 경고만 남기고 호출자에게 전파하지 않습니다.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use trader_data::{EngineStore, LogLevel, LogRecord};

/// 운영자 로그 기록기.
#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn EngineStore>,
}

impl Journal {
    pub fn new(store: Arc<dyn EngineStore>) -> Self {
        Self { store }
    }

    /// 로그 한 줄을 기록합니다. 포트와 무관하면 `port_id`는 `None`.
    pub async fn log(&self, level: LogLevel, text: impl Into<String>, port_id: Option<i64>) {
        let text = text.into();
        match level {
            LogLevel::Error => error!(port_id = ?port_id, level = %level, "{}", text),
            _ => info!(port_id = ?port_id, level = %level, "{}", text),
        }

        let record = LogRecord {
            timestamp: Utc::now(),
            text,
            level,
            port_id,
        };
        if let Err(e) = self.store.add_log(record).await {
            warn!(error = %e, "Failed to persist log line");
        }
    }

    pub async fn info(&self, text: impl Into<String>, port_id: Option<i64>) {
        self.log(LogLevel::Info, text, port_id).await;
    }

    pub async fn error(&self, text: impl Into<String>, port_id: Option<i64>) {
        self.log(LogLevel::Error, text, port_id).await;
    }

    pub async fn success(&self, text: impl Into<String>, port_id: Option<i64>) {
        self.log(LogLevel::Success, text, port_id).await;
    }

    pub async fn pnl(&self, text: impl Into<String>, port_id: Option<i64>) {
        self.log(LogLevel::Pnl, text, port_id).await;
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").finish_non_exhaustive()
    }
}
