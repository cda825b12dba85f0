//! 메모리 브로커.
//!
//! 실제 주문 없이 주문장을 흉내 냅니다. 체결 방식과 실패 횟수를 스크립트로 지정할 수 있습니다.

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Asia::Kolkata;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use trader_core::{BrokerOrderStatus, OrderSnapshot, BROKER_TIMESTAMP_FORMAT};

use crate::contract::ContractRow;
use crate::traits::{BrokerApi, BrokerOrder, CancelAck, ExchangeResult, OrderAck};
use crate::ExchangeError;

/// 새 주문을 주문장에 넣는 방식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    /// 즉시 전량 체결
    #[default]
    Immediate,
    /// 미체결로 대기 (테스트가 [`PaperBroker::set_order_status`]로 진행)
    Pending,
    /// 접수 후 거부
    Reject,
    /// 접수 자체를 거절 (주문 ID "0")
    RejectOnSubmit,
}

#[derive(Debug)]
struct PaperState {
    book: Vec<OrderSnapshot>,
    placed: Vec<BrokerOrder>,
    cancelled: Vec<String>,
    next_order_id: u64,
    fill_mode: FillMode,
    cancel_status: String,
    contracts: Vec<ContractRow>,
    login_failures: u32,
    master_failures: u32,
    book_failures: u32,
    logged_in: bool,
}

/// 메모리 브로커.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    state: Arc<RwLock<PaperState>>,
}

impl PaperBroker {
    /// 종목 마스터를 지정해 생성합니다.
    pub fn new(contracts: Vec<ContractRow>) -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState {
                book: Vec::new(),
                placed: Vec::new(),
                cancelled: Vec::new(),
                next_order_id: 1000,
                fill_mode: FillMode::default(),
                cancel_status: "success".to_string(),
                contracts,
                login_failures: 0,
                master_failures: 0,
                book_failures: 0,
                logged_in: false,
            })),
        }
    }

    pub async fn set_fill_mode(&self, mode: FillMode) {
        self.state.write().await.fill_mode = mode;
    }

    /// 취소 응답 상태 문자열.
    pub async fn set_cancel_status(&self, status: impl Into<String>) {
        self.state.write().await.cancel_status = status.into();
    }

    /// 다음 `n`번의 로그인을 실패시킵니다.
    pub async fn fail_logins(&self, n: u32) {
        self.state.write().await.login_failures = n;
    }

    /// 다음 `n`번의 종목 마스터 조회를 실패시킵니다.
    pub async fn fail_master_contract(&self, n: u32) {
        self.state.write().await.master_failures = n;
    }

    /// 다음 `n`번의 주문장 조회를 실패시킵니다.
    pub async fn fail_order_book(&self, n: u32) {
        self.state.write().await.book_failures = n;
    }

    /// 주문장의 주문 상태를 바꿉니다. 없는 주문이면 `false`.
    pub async fn set_order_status(
        &self,
        order_id: &str,
        status: BrokerOrderStatus,
        filled_quantity: i64,
        average_price: Decimal,
    ) -> bool {
        let mut state = self.state.write().await;
        match state.book.iter_mut().find(|o| o.order_id == order_id) {
            Some(order) => {
                order.status = status;
                order.filled_quantity = filled_quantity;
                order.average_price = average_price;
                order.exchange_timestamp = Some(broker_now());
                true
            }
            None => false,
        }
    }

    /// 주문 접수 시각을 덮어씁니다 (대기 시간 초과 시나리오용).
    pub async fn set_order_timestamp(&self, order_id: &str, timestamp: &str) -> bool {
        let mut state = self.state.write().await;
        match state.book.iter_mut().find(|o| o.order_id == order_id) {
            Some(order) => {
                order.order_timestamp = Some(timestamp.to_string());
                order.exchange_timestamp = Some(timestamp.to_string());
                true
            }
            None => false,
        }
    }

    /// 주문장에서 주문을 지웁니다.
    pub async fn drop_order(&self, order_id: &str) {
        self.state.write().await.book.retain(|o| o.order_id != order_id);
    }

    pub async fn placed_orders(&self) -> Vec<BrokerOrder> {
        self.state.read().await.placed.clone()
    }

    pub async fn cancelled_orders(&self) -> Vec<String> {
        self.state.read().await.cancelled.clone()
    }

    pub async fn book(&self) -> Vec<OrderSnapshot> {
        self.state.read().await.book.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.read().await.logged_in
    }
}

/// 브로커 형식의 현재 IST 시각.
fn broker_now() -> String {
    Utc::now()
        .with_timezone(&Kolkata)
        .format(BROKER_TIMESTAMP_FORMAT)
        .to_string()
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl BrokerApi for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    async fn login(&self) -> ExchangeResult<String> {
        let mut state = self.state.write().await;
        if take_failure(&mut state.login_failures) {
            return Err(ExchangeError::Unauthorized("paper login refused".to_string()));
        }
        Ok("paper-request-token".to_string())
    }

    async fn create_session(&self, _request_token: &str) -> ExchangeResult<()> {
        self.state.write().await.logged_in = true;
        Ok(())
    }

    async fn order_book(&self) -> ExchangeResult<Vec<OrderSnapshot>> {
        let mut state = self.state.write().await;
        if take_failure(&mut state.book_failures) {
            return Err(ExchangeError::NetworkError("paper order book unavailable".to_string()));
        }
        Ok(state.book.clone())
    }

    async fn place_order(&self, order: &BrokerOrder) -> ExchangeResult<OrderAck> {
        let mut state = self.state.write().await;
        state.placed.push(order.clone());

        if state.fill_mode == FillMode::RejectOnSubmit {
            return Ok(OrderAck {
                order_id: "0".to_string(),
                message: r#"{"status":"error","message":"paper rejection"}"#.to_string(),
            });
        }

        let order_id = state.next_order_id.to_string();
        state.next_order_id += 1;

        let (status, filled, average) = match state.fill_mode {
            FillMode::Immediate => (BrokerOrderStatus::Execute, order.quantity, order.price),
            FillMode::Pending => (BrokerOrderStatus::Pending, 0, Decimal::ZERO),
            FillMode::Reject | FillMode::RejectOnSubmit => {
                (BrokerOrderStatus::Reject, 0, Decimal::ZERO)
            }
        };

        let now = broker_now();
        state.book.push(OrderSnapshot {
            exchange: order.exchange.clone(),
            order_id: order_id.clone(),
            status,
            quantity: order.quantity,
            filled_quantity: filled,
            average_price: average,
            order_timestamp: Some(now.clone()),
            exchange_timestamp: Some(now),
        });

        debug!(order_id = %order_id, side = %order.side, qty = order.quantity, "Paper order booked");
        Ok(OrderAck {
            order_id,
            message: "successful".to_string(),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelAck> {
        let mut state = self.state.write().await;
        state.cancelled.push(order_id.to_string());

        let status = state.cancel_status.clone();
        if trader_core::is_success_status(&status) {
            if let Some(order) = state.book.iter_mut().find(|o| o.order_id == order_id) {
                order.status = BrokerOrderStatus::Other("Cancelled".to_string());
            }
        }

        Ok(CancelAck {
            raw: serde_json::json!({ "status": status, "orderid": order_id }),
            status,
        })
    }

    async fn master_contract(&self) -> ExchangeResult<Vec<ContractRow>> {
        let mut state = self.state.write().await;
        if take_failure(&mut state.master_failures) {
            return Err(ExchangeError::Timeout("paper master contract".to_string()));
        }
        Ok(state.contracts.clone())
    }
}
