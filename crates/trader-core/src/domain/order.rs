//! 주문 관련 타입.
//!
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderKind` - 주문 유형 (시장가/지정가)
//! - `BrokerOrderStatus` - 브로커 주문장의 상태 문자열
//! - `OrderSnapshot` - 브로커 주문장 항목
//! - `OrderTicket` - 레그에 기록되는 주문 장부

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraderError;

/// 페이퍼 모드에서 합성하는 주문 메시지 (브로커 철자를 그대로 따름).
pub const PAPER_SUCCESS_MESSAGE: &str = "sucess";

/// 페이퍼 모드 주문 ID.
pub const PAPER_ORDER_ID: &str = "0";

/// 브로커 주문 타임스탬프 형식 (IST 로컬 시각).
pub const BROKER_TIMESTAMP_FORMAT: &str = "%d/%m/%Y%H:%M:%S";

/// 브로커가 성공으로 간주하는 상태/메시지 문자열인지 확인합니다.
pub fn is_success_status(status: &str) -> bool {
    matches!(status, "sucess" | "successful" | "success")
}

/// 브로커 주문 타임스탬프를 파싱합니다.
pub fn parse_broker_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), BROKER_TIMESTAMP_FORMAT).ok()
}

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 주문 방향: {}", s))),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    /// 시장가
    #[default]
    Market,
    /// 지정가
    Limit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MARKET" => Ok(OrderKind::Market),
            "LIMIT" => Ok(OrderKind::Limit),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 주문 유형: {}", s))),
        }
    }
}

/// 브로커 주문 상태.
///
/// 브로커 문자열을 그대로 보존하기 위해 알 수 없는 값은 `Other`로 유지합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BrokerOrderStatus {
    /// 미체결
    Pending,
    /// 부분 체결
    PartiallyFilled,
    /// 체결 완료
    Execute,
    /// 거부
    Reject,
    /// 그 외 (빈 문자열 포함)
    Other(String),
    /// 주문 없음
    #[default]
    Unset,
}

impl BrokerOrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BrokerOrderStatus::Pending => "Pending",
            BrokerOrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            BrokerOrderStatus::Execute => "Execute",
            BrokerOrderStatus::Reject => "Reject",
            BrokerOrderStatus::Other(s) => s,
            BrokerOrderStatus::Unset => "",
        }
    }

    /// 아직 체결을 기다리는 상태인지 확인합니다.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            BrokerOrderStatus::Pending | BrokerOrderStatus::PartiallyFilled
        )
    }
}

impl From<String> for BrokerOrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => BrokerOrderStatus::Pending,
            "PARTIALLY_FILLED" => BrokerOrderStatus::PartiallyFilled,
            "Execute" => BrokerOrderStatus::Execute,
            "Reject" => BrokerOrderStatus::Reject,
            "" => BrokerOrderStatus::Unset,
            _ => BrokerOrderStatus::Other(s),
        }
    }
}

impl From<&str> for BrokerOrderStatus {
    fn from(s: &str) -> Self {
        BrokerOrderStatus::from(s.to_string())
    }
}

impl From<BrokerOrderStatus> for String {
    fn from(status: BrokerOrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BrokerOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 브로커 주문장의 주문 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// 거래소
    pub exchange: String,
    /// 주문 ID
    pub order_id: String,
    /// 주문 상태
    pub status: BrokerOrderStatus,
    /// 주문 수량
    pub quantity: i64,
    /// 체결 수량
    pub filled_quantity: i64,
    /// 평균 체결가
    pub average_price: Decimal,
    /// 주문 접수 시각 (브로커 형식 문자열)
    pub order_timestamp: Option<String>,
    /// 거래소 접수 시각 (브로커 형식 문자열)
    pub exchange_timestamp: Option<String>,
}

impl OrderSnapshot {
    pub fn order_time(&self) -> Option<NaiveDateTime> {
        self.order_timestamp.as_deref().and_then(parse_broker_timestamp)
    }

    pub fn exchange_time(&self) -> Option<NaiveDateTime> {
        self.exchange_timestamp
            .as_deref()
            .and_then(parse_broker_timestamp)
    }
}

/// 주문장에서 거래소 + 주문 ID로 주문을 찾습니다.
pub fn find_order<'a>(
    book: &'a [OrderSnapshot],
    exchange: &str,
    order_id: &str,
) -> Option<&'a OrderSnapshot> {
    book.iter()
        .find(|order| order.exchange == exchange && order.order_id == order_id)
}

/// 레그에 기록하는 주문 장부 (진입/청산 각각 하나).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    /// 브로커 주문 ID ("0"은 주문 실패 또는 페이퍼)
    pub order_id: String,
    /// 주문 유형
    pub order_type: OrderKind,
    /// 주문 제출 시 브로커 메시지
    pub message: String,
    /// 마지막으로 확인한 주문 상태
    pub status: BrokerOrderStatus,
    /// 체결 수량
    pub filled_qty: i64,
    /// 체결가
    pub executed_price: Decimal,
    /// 지정가 재주문 횟수
    pub modifications: u32,
}

impl OrderTicket {
    /// 제출 메시지가 성공인지 확인합니다.
    pub fn accepted(&self) -> bool {
        is_success_status(&self.message)
    }

    /// 제출 성공 + 체결 완료.
    pub fn executed(&self) -> bool {
        self.accepted() && self.status == BrokerOrderStatus::Execute
    }

    /// 주문장 스냅샷의 체결 정보를 반영합니다.
    pub fn apply_snapshot(&mut self, snapshot: &OrderSnapshot) {
        self.status = snapshot.status.clone();
        self.filled_qty = snapshot.filled_quantity;
        self.executed_price = snapshot.average_price;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert!("HOLD".parse::<Side>().is_err());
    }

    #[test]
    fn test_status_round_trip_preserves_unknown() {
        assert_eq!(BrokerOrderStatus::from("Execute"), BrokerOrderStatus::Execute);
        assert_eq!(
            BrokerOrderStatus::from("PARTIALLY_FILLED"),
            BrokerOrderStatus::PartiallyFilled
        );
        assert_eq!(BrokerOrderStatus::from(""), BrokerOrderStatus::Unset);

        let cancelled = BrokerOrderStatus::from("Cancelled");
        assert_eq!(cancelled.as_str(), "Cancelled");
        assert!(!cancelled.is_working());
        assert!(BrokerOrderStatus::Pending.is_working());
    }

    #[test]
    fn test_success_status() {
        assert!(is_success_status("sucess"));
        assert!(is_success_status("successful"));
        assert!(is_success_status("success"));
        assert!(!is_success_status(r#"{"status": "error"}"#));
        assert!(!is_success_status(""));
    }

    #[test]
    fn test_broker_timestamp() {
        let ts = parse_broker_timestamp("25/01/202410:15:30").unwrap();
        assert_eq!(ts.to_string(), "2024-01-25 10:15:30");
        assert!(parse_broker_timestamp("2024-01-25 10:15:30").is_none());
    }

    #[test]
    fn test_ticket_executed_requires_message_and_status() {
        let mut ticket = OrderTicket {
            order_id: "11".to_string(),
            message: "successful".to_string(),
            status: BrokerOrderStatus::Pending,
            ..Default::default()
        };
        assert!(!ticket.executed());

        ticket.apply_snapshot(&OrderSnapshot {
            exchange: "NSEFO".to_string(),
            order_id: "11".to_string(),
            status: BrokerOrderStatus::Execute,
            quantity: 50,
            filled_quantity: 50,
            average_price: dec!(101.5),
            order_timestamp: None,
            exchange_timestamp: None,
        });
        assert!(ticket.executed());
        assert_eq!(ticket.filled_qty, 50);

        ticket.message = "rejected by RMS".to_string();
        assert!(!ticket.executed());
    }

    #[test]
    fn test_find_order_matches_exchange_and_id() {
        let snap = |exchange: &str, id: &str| OrderSnapshot {
            exchange: exchange.to_string(),
            order_id: id.to_string(),
            status: BrokerOrderStatus::Pending,
            quantity: 0,
            filled_quantity: 0,
            average_price: Decimal::ZERO,
            order_timestamp: None,
            exchange_timestamp: None,
        };
        let book = vec![snap("MCX", "7"), snap("NSEFO", "7")];

        assert_eq!(find_order(&book, "NSEFO", "7").unwrap().exchange, "NSEFO");
        assert!(find_order(&book, "NSECM", "7").is_none());
    }
}
