//! 사용자, 브로커 계좌, 전략.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// 사용자.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// 브로커 계좌.
#[derive(Debug)]
pub struct Account {
    pub id: i64,
    pub name: String,
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// REST 루트 URL (슬래시로 끝남)
    pub root_url: String,
    /// 시세 WebSocket URL
    pub ws_root_url: String,
    /// 로트 → 수량 환산 승수
    pub lots_multiplier: Decimal,
}

/// 전략. 계좌 하나를 사용하며 모든 레그 진입에 로트 승수를 곱합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub name: String,
    pub lots_multiplier: Decimal,
}
