//! 계좌 관리자.
//!
//! 계좌마다 로그인된 [`Session`] 하나를 소유하고 모든 전략/포트 태스크가 공유합니다.
//!
//! 제공 기능:
//! - 최초 사용 시 로그인, 실패 시 다음 사이클에 처음부터 재시도
//! - 시세 조회와 거래 종목 선택
//! - 주문 제출/취소와 주문 기록

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use trader_core::{
    limit_price, lots_to_quantity, LegConfig, OrderKind, OrderSnapshot, Port, SessionConfig, Side,
    Strategy, TradingMode, PAPER_ORDER_ID, PAPER_SUCCESS_MESSAGE,
};
use trader_data::{EngineStore, OrderRecord};
use trader_exchange::{
    BrokerConnector, BrokerOrder, CancelAck, ExchangeError, ResolvedInstrument, Session,
};

use crate::error::EngineResult;
use crate::journal::Journal;

/// 주문 수량 단위.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderQuantity {
    /// 로트 수. 계좌 승수와 로트 크기로 환산합니다.
    Lots(Decimal),
    /// 체결 수량 그대로 (청산, 재주문)
    Quantity(i64),
}

/// 레그 하나가 내는 주문.
#[derive(Debug, Clone, PartialEq)]
pub struct LegOrder {
    /// 종목 설명
    pub instrument: String,
    /// 종목 토큰
    pub token: String,
    pub amount: OrderQuantity,
    pub side: Side,
    pub order_type: OrderKind,
    /// 지정가 산출 퍼센트
    pub limit_pct: Decimal,
}

/// 주문 제출 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    /// 브로커 주문 ID (실패/페이퍼는 "0")
    pub order_id: String,
    /// 브로커 메시지 (실패 시 빈 문자열)
    pub message: String,
    /// 실제 주문 수량
    pub quantity: i64,
    /// 주문 시점 종목 현재가
    pub ltp: Decimal,
    /// 주문 시점 기초자산 현재가
    pub underlying_ltp: Decimal,
}

/// 계좌 세션 관리자.
pub struct AccountManager {
    store: Arc<dyn EngineStore>,
    connector: Arc<dyn BrokerConnector>,
    journal: Journal,
    config: SessionConfig,
    sessions: RwLock<HashMap<i64, Arc<Session>>>,
    /// 계좌별 로그인 잠금. 같은 계좌에 두 세션이 생기지 않게 하며 다른 계좌는 기다리지 않습니다.
    login_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl AccountManager {
    pub fn new(
        store: Arc<dyn EngineStore>,
        connector: Arc<dyn BrokerConnector>,
        journal: Journal,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            connector,
            journal,
            config,
            sessions: RwLock::new(HashMap::new()),
            login_locks: Mutex::new(HashMap::new()),
        }
    }

    // ==================== 세션 ====================

    /// 전략 계좌의 세션이 없으면 로그인합니다.
    ///
    /// 실패해도 에러를 돌려주지 않습니다. 로그를 남기고 잠시 대기한 뒤 `false`를 반환하며,
    /// 다음 사이클이 처음부터 다시 로그인합니다.
    #[instrument(skip(self, strategy), fields(strategy = %strategy.name, account_id = strategy.account_id))]
    pub async fn ensure_logged_in(&self, strategy: &Strategy) -> bool {
        let account_id = strategy.account_id;
        if self.sessions.read().await.contains_key(&account_id) {
            return true;
        }

        let lock = self
            .login_locks
            .lock()
            .await
            .entry(account_id)
            .or_default()
            .clone();

        let logged_in = {
            let _guard = lock.lock().await;
            self.login(account_id).await
        };

        if !logged_in {
            tokio::time::sleep(self.config.login_retry_delay()).await;
        }
        logged_in
    }

    /// 계좌 잠금을 잡은 상태에서 로그인하고 세션을 등록합니다.
    async fn login(&self, account_id: i64) -> bool {
        if self.sessions.read().await.contains_key(&account_id) {
            return true;
        }

        let account = match self.store.get_account(account_id).await {
            Ok(account) => account,
            Err(e) => {
                self.journal
                    .error(
                        format!(
                            "Error {} came while trying to login to account: #{}",
                            e, account_id
                        ),
                        None,
                    )
                    .await;
                return false;
            }
        };

        let session = match self.connector.connect(&account, &self.config) {
            Ok(handles) => Session::login(&account, handles, &self.config).await,
            Err(e) => Err(e),
        };

        match session {
            Ok(session) => {
                info!(account = %account.name, "Account logged in");
                self.sessions
                    .write()
                    .await
                    .insert(account_id, Arc::new(session));
                true
            }
            Err(e) => {
                if e.is_auth_error() {
                    warn!(account = %account.name, "Broker rejected the account credentials");
                }
                self.journal
                    .error(
                        format!(
                            "Error {} came while trying to login to account: {}",
                            e, account.name
                        ),
                        None,
                    )
                    .await;
                false
            }
        }
    }

    /// 세션이 있고 시세 스트림이 연결된 상태인지 확인합니다.
    pub async fn is_healthy(&self, strategy: &Strategy) -> bool {
        self.sessions
            .read()
            .await
            .get(&strategy.account_id)
            .map_or(false, |session| session.is_healthy())
    }

    /// 계좌의 세션.
    pub async fn session(&self, account_id: i64) -> EngineResult<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or_else(|| ExchangeError::NotLoggedIn(account_id).into())
    }

    /// 모든 세션을 닫습니다 (시세 스트림 종료).
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        info!(sessions = sessions.len(), "Closing broker sessions");
        sessions.clear();
    }

    // ==================== 시세 / 종목 ====================

    /// 종목 현재가. 시세가 들어오지 않으면 0입니다.
    pub async fn ltp(&self, strategy: &Strategy, exchange: &str, token: &str) -> EngineResult<Decimal> {
        let session = self.session(strategy.account_id).await?;
        Ok(session.ltp(exchange, token).await?)
    }

    /// 포트 기초자산 현재가.
    pub async fn underlying_ltp(&self, strategy: &Strategy, port: &Port) -> EngineResult<Decimal> {
        let session = self.session(strategy.account_id).await?;
        Ok(session.underlying_ltp(port.scrip, port.scrip_type).await?)
    }

    /// 레그 설정으로 거래할 종목을 고릅니다.
    pub async fn resolve_instrument(
        &self,
        strategy: &Strategy,
        port: &Port,
        config: &LegConfig,
    ) -> EngineResult<ResolvedInstrument> {
        let session = self.session(strategy.account_id).await?;
        let resolved = session
            .resolve_instrument(
                port.scrip,
                port.scrip_type,
                config.instrument_type,
                config.strike_distance,
                config.expiry,
            )
            .await?;
        Ok(resolved)
    }

    // ==================== 주문 ====================

    /// 브로커 주문장.
    ///
    /// 실패하면 로그를 남기고 잠시 대기한 뒤 에러를 반환합니다.
    pub async fn order_book(&self, strategy: &Strategy) -> EngineResult<Vec<OrderSnapshot>> {
        let session = self.session(strategy.account_id).await?;
        match session.order_book().await {
            Ok(book) => {
                debug!(account = session.account_name(), orders = book.len(), "Fetched order book");
                Ok(book)
            }
            Err(e) => {
                self.journal
                    .error(
                        format!(
                            "Error {} came while fetching orderbook of Account#{}",
                            e,
                            session.account_name()
                        ),
                        None,
                    )
                    .await;
                tokio::time::sleep(self.config.error_backoff()).await;
                Err(e.into())
            }
        }
    }

    /// 주문을 제출하고 주문 기록을 남깁니다.
    ///
    /// 페이퍼 포트는 브로커를 호출하지 않고 성공 응답을 합성합니다.
    /// 실거래 제출 실패는 에러가 아니라 주문 ID "0", 빈 메시지로 돌려줍니다.
    #[instrument(skip(self, strategy, port, order), fields(port = %port.name, instrument = %order.instrument))]
    pub async fn place_order(
        &self,
        strategy: &Strategy,
        port: &Port,
        order: LegOrder,
    ) -> EngineResult<PlacedOrder> {
        let account = self.store.get_account(strategy.account_id).await?;
        let session = self.session(strategy.account_id).await?;
        let exchanges = port.scrip.exchanges();

        let ltp = session.ltp(exchanges.trading, &order.token).await?;
        let underlying_ltp = session.underlying_ltp(port.scrip, port.scrip_type).await?;
        let price = limit_price(ltp, order.limit_pct, order.side);

        let quantity = match order.amount {
            OrderQuantity::Lots(lots) => {
                lots_to_quantity(lots, account.lots_multiplier, session.lot_size(port.scrip)?)
            }
            OrderQuantity::Quantity(qty) => qty,
        };

        let (order_id, message) = match port.trading_mode {
            TradingMode::Paper => (
                PAPER_ORDER_ID.to_string(),
                PAPER_SUCCESS_MESSAGE.to_string(),
            ),
            TradingMode::Live => {
                let request = BrokerOrder {
                    exchange: exchanges.trading.to_string(),
                    token: order.token.clone(),
                    side: order.side,
                    order_type: order.order_type,
                    quantity,
                    price,
                };
                match session.submit_order(&request).await {
                    Ok(ack) => (ack.order_id, ack.message),
                    Err(e) => {
                        self.journal
                            .error(
                                format!(
                                    "Error {} came while placing order in Account#{}",
                                    e, account.name
                                ),
                                Some(port.id),
                            )
                            .await;
                        tokio::time::sleep(self.config.error_backoff()).await;
                        (PAPER_ORDER_ID.to_string(), String::new())
                    }
                }
            }
        };

        let record = OrderRecord {
            timestamp: Utc::now(),
            instrument: order.instrument.clone(),
            side: order.side,
            quantity,
            order_type: order.order_type,
            price,
            port_id: port.id,
            account_id: account.id,
        };
        if let Err(e) = self.store.add_order(record).await {
            warn!(error = %e, "Failed to persist order record");
        }

        self.journal
            .success(
                format!(
                    "Order Placed: {} | Trade: {} | Qty: {} | Type: {} | Price: {} | Account: {}",
                    order.instrument, order.side, quantity, order.order_type, price, account.name
                ),
                Some(port.id),
            )
            .await;

        Ok(PlacedOrder {
            order_id,
            message,
            quantity,
            ltp,
            underlying_ltp,
        })
    }

    /// 주문 취소. 실패하면 로그를 남기고 `None`을 반환합니다.
    pub async fn cancel_order(&self, strategy: &Strategy, order_id: &str) -> Option<CancelAck> {
        let session = match self.session(strategy.account_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, order_id, "Cannot cancel without a session");
                return None;
            }
        };

        match session.cancel_order(order_id).await {
            Ok(ack) => Some(ack),
            Err(e) => {
                self.journal
                    .error(
                        format!(
                            "Error {} came while cancelling order: {} from Account#{}",
                            e,
                            order_id,
                            session.account_name()
                        ),
                        None,
                    )
                    .await;
                tokio::time::sleep(self.config.error_backoff()).await;
                None
            }
        }
    }
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
