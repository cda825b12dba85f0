//! Multitrade 브로커 커넥터.
//!
//! 계좌 하나마다 REST 클라이언트와 시세 스트림을 한 쌍으로 생성합니다.
//!
//! # 구성
//!
//! - [`MultitradeClient`]: 로그인, 주문장, 주문 제출/취소, 종목 마스터
//! - [`MultitradeFeed`]: 시세 WebSocket (자동 재연결)
//! - [`MultitradeConnector`]: 계좌 레코드 → 위 두 구현
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use trader_exchange::connector::multitrade::MultitradeConnector;
//! use trader_exchange::{BrokerConnector, Session};
//!
//! let handles = MultitradeConnector.connect(&account, &config.session)?;
//! let session = Session::login(&account, handles, &config.session).await?;
//! let ltp = session.ltp("NSEFO", "4411").await?;
//! ```

pub mod client;
pub mod config;
pub mod types;
pub mod websocket;

pub use client::MultitradeClient;
pub use config::MultitradeConfig;
pub use websocket::MultitradeFeed;

use std::sync::Arc;
use trader_core::{Account, SessionConfig};

use crate::traits::{BrokerConnector, BrokerHandles, ExchangeResult};

/// 실계좌용 커넥터.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultitradeConnector;

impl BrokerConnector for MultitradeConnector {
    fn connect(&self, account: &Account, config: &SessionConfig) -> ExchangeResult<BrokerHandles> {
        let multitrade = MultitradeConfig::from_account(account, config);
        let feed = MultitradeFeed::new(
            multitrade.ws_url.clone(),
            account.name.clone(),
            config.ws_reconnect_delay(),
        );
        let client = MultitradeClient::new(multitrade)?;

        Ok(BrokerHandles {
            api: Arc::new(client),
            feed: Arc::new(feed),
        })
    }
}
