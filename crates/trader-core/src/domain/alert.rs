//! 외부 신호(차트 웹훅) 알림.
//!
//! 알림은 포트 하나에 묶이며 한 번만 소비됩니다.
//! strike/expiry가 모두 있으면 `{포트}-{유형}-{행사가}-{만기}` 이름의 레그만 대상이 되고,
//! 하나라도 없으면 포트의 모든 레그가 대상입니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraderError;

/// 알림 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Entry,
    Exit,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Entry => write!(f, "ENTRY"),
            AlertKind::Exit => write!(f, "EXIT"),
        }
    }
}

impl FromStr for AlertKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ENTRY" => Ok(AlertKind::Entry),
            "EXIT" => Ok(AlertKind::Exit),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 알림 종류: {}", s))),
        }
    }
}

/// 대기 중인 알림.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub port_id: i64,
    pub kind: AlertKind,
    /// 상품 유형 한정자 (CE/PE/FUT)
    pub option_type: Option<String>,
    /// 행사가 한정자
    pub strike: Option<String>,
    /// 만기 한정자
    pub expiry: Option<String>,
    /// 진입 로트 승수
    pub lots: Decimal,
}

impl Alert {
    /// 대상 레그 이름. strike/expiry가 모두 있을 때만 존재합니다.
    pub fn target_leg_name(&self, port_name: &str) -> Option<String> {
        match (&self.strike, &self.expiry) {
            (Some(strike), Some(expiry)) => Some(format!(
                "{}-{}-{}-{}",
                port_name,
                self.option_type.as_deref().unwrap_or_default(),
                strike,
                expiry
            )),
            _ => None,
        }
    }

    /// 이 알림이 해당 레그를 대상으로 하는지 확인합니다.
    pub fn applies_to(&self, port_name: &str, leg_name: &str) -> bool {
        self.target_leg_name(port_name)
            .map_or(true, |expected| expected == leg_name)
    }
}

/// 가장 최신(ID가 가장 큰) 알림 하나를 고릅니다.
pub fn latest_alert(alerts: Vec<Alert>) -> Option<Alert> {
    alerts.into_iter().max_by_key(|alert| alert.id)
}
