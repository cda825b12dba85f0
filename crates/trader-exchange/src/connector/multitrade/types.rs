//! Multitrade REST/WebSocket 응답 타입.
//!
//! 브로커가 숫자 필드를 문자열 또는 숫자로 보내므로 관대한 역직렬화 함수를 씁니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use trader_core::{BrokerOrderStatus, OrderSnapshot};

/// 공통 응답 봉투.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// `connect/login` 응답 데이터.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub request_token: String,
}

/// `session/token` 응답 데이터. 브로커 필드명 철자 그대로.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionData {
    #[serde(rename = "acess_token", alias = "access_token")]
    pub access_token: String,
}

/// `orders/regular` 응답 데이터.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderData {
    #[serde(deserialize_with = "string_or_number")]
    pub orderid: String,
}

/// 주문장 한 행.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOrder {
    #[serde(default)]
    pub exchange: String,
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub filled_quantity: i64,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub average_price: Decimal,
    #[serde(default, deserialize_with = "optional_string")]
    pub order_timestamp: Option<String>,
    #[serde(default, deserialize_with = "optional_string")]
    pub exchange_timestamp: Option<String>,
}

impl From<WireOrder> for OrderSnapshot {
    fn from(order: WireOrder) -> Self {
        OrderSnapshot {
            exchange: order.exchange,
            order_id: order.order_id,
            status: BrokerOrderStatus::from(order.status),
            quantity: order.quantity,
            filled_quantity: order.filled_quantity,
            average_price: order.average_price,
            order_timestamp: order.order_timestamp,
            exchange_timestamp: order.exchange_timestamp,
        }
    }
}

/// 시세 스트림 메시지.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// 연결 핸드셰이크 완료
    HandShake,
    /// 체결가 방송
    Broadcast {
        exchange: String,
        token: String,
        ltp: Decimal,
    },
    /// 처리하지 않는 메시지
    Other(String),
}

impl FeedMessage {
    /// 원문 JSON을 해석합니다.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let kind = value
            .get("Message")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("missing Message field: {}", text))?;

        match kind {
            "HandShake" => Ok(FeedMessage::HandShake),
            "Broadcast" => {
                let exchange = value_to_string(value.get("EXC"))
                    .ok_or_else(|| "broadcast without EXC".to_string())?;
                let token = value_to_string(value.get("SECID"))
                    .ok_or_else(|| "broadcast without SECID".to_string())?;
                let ltp = value_to_decimal(value.get("LTP"))
                    .ok_or_else(|| format!("broadcast with invalid LTP: {}", text))?;
                Ok(FeedMessage::Broadcast {
                    exchange,
                    token,
                    ltp,
                })
            }
            other => Ok(FeedMessage::Other(other.to_string())),
        }
    }
}

/// 구독 요청 프레임.
pub fn subscribe_frame(exchange: &str, token: &str) -> String {
    serde_json::json!({
        "Message": "Broadcast",
        "EXC": exchange,
        "SECID": token,
    })
    .to_string()
}

// =============================================================================
// 관대한 역직렬화
// =============================================================================

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(Some(&value))
        .ok_or_else(|| serde::de::Error::custom(format!("expected string or number, got {}", value)))
}

fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| value_to_string(Some(v)))
        .filter(|s| !s.trim().is_empty()))
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value_to_decimal(value.as_ref()).unwrap_or_default())
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().or_else(|| {
            Decimal::from_str(s.trim())
                .ok()
                .and_then(|d| i64::try_from(d.trunc()).ok())
        }),
        _ => None,
    }
    .unwrap_or_default())
}
