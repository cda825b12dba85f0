//! 브로커 경계 trait 정의.
//!
//! - [`BrokerApi`]: 로그인, 주문장, 주문/취소, 종목 마스터 (REST)
//! - [`MarketFeed`]: 시세 스트림 연결과 구독 (WebSocket)
//! - [`BrokerConnector`]: 계좌 하나에 대한 두 구현을 만드는 팩토리

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trader_core::{is_success_status, Account, OrderKind, OrderSnapshot, SessionConfig, Side};

use crate::contract::ContractRow;
use crate::tick_cache::TickCache;
use crate::ExchangeError;

/// 브로커 작업 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 브로커에 제출할 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// 주문 거래소
    pub exchange: String,
    /// 종목 토큰
    pub token: String,
    pub side: Side,
    pub order_type: OrderKind,
    pub quantity: i64,
    /// 지정가 (시장가 주문에서는 무시)
    pub price: Decimal,
}

/// 주문 제출 응답.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// 브로커 주문 ID ("0"은 ID 없음)
    pub order_id: String,
    /// 성공 시 상태 문자열, 실패 시 원문 응답
    pub message: String,
}

impl OrderAck {
    pub fn accepted(&self) -> bool {
        is_success_status(&self.message)
    }
}

/// 주문 취소 응답.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub status: String,
    /// 원문 응답
    pub raw: serde_json::Value,
}

impl CancelAck {
    pub fn is_success(&self) -> bool {
        is_success_status(&self.status)
    }
}

/// 브로커 REST 인터페이스.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// 브로커 이름.
    fn name(&self) -> &str;

    /// 자격증명으로 요청 토큰을 발급받습니다.
    async fn login(&self) -> ExchangeResult<String>;

    /// 요청 토큰으로 세션(접근) 토큰을 발급받아 보관합니다.
    async fn create_session(&self, request_token: &str) -> ExchangeResult<()>;

    /// 당일 주문장 전체.
    async fn order_book(&self) -> ExchangeResult<Vec<OrderSnapshot>>;

    /// 주문 제출.
    async fn place_order(&self, order: &BrokerOrder) -> ExchangeResult<OrderAck>;

    /// 주문 취소.
    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelAck>;

    /// 종목 마스터 원본 행.
    async fn master_contract(&self) -> ExchangeResult<Vec<ContractRow>>;
}

/// 시세 스트림 인터페이스.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// 백그라운드 연결 감독 태스크를 시작합니다.
    ///
    /// 수신한 시세와 연결 상태는 `ticks`에 기록합니다.
    async fn start(&self, ticks: TickCache) -> ExchangeResult<()>;

    /// 거래소 + 종목 토큰 시세를 구독합니다.
    async fn subscribe(&self, exchange: &str, token: &str) -> ExchangeResult<()>;

    /// 연결 감독 태스크를 종료합니다.
    fn shutdown(&self);
}

/// 계좌 하나에 대한 브로커 구현 한 쌍.
pub struct BrokerHandles {
    pub api: Arc<dyn BrokerApi>,
    pub feed: Arc<dyn MarketFeed>,
}

/// 계좌 정보로 브로커 구현을 생성하는 팩토리.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self, account: &Account, config: &SessionConfig) -> ExchangeResult<BrokerHandles>;
}
