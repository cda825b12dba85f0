//! 메모리 브로커와 시세 스트림.
//!
//! 실제 브로커 없이 세션/엔진 전체를 구동할 때 사용합니다.
//!
//! # 예제
//!
//! ```ignore
//! use trader_exchange::simulated::{PaperBroker, PaperConnector, PaperFeed};
//!
//! let broker = PaperBroker::new(contract_rows);
//! let feed = PaperFeed::new();
//! feed.set_price("NSECM", "26000", dec!(22010)).await;
//!
//! let connector = PaperConnector::new(broker.clone(), feed.clone());
//! let session = Session::login(&account, connector.connect(&account, &config)?, &config).await?;
//! ```

mod broker;
mod feed;

pub use broker::{FillMode, PaperBroker};
pub use feed::PaperFeed;

use std::sync::Arc;
use trader_core::{Account, SessionConfig};

use crate::traits::{BrokerConnector, BrokerHandles, ExchangeResult};

/// 같은 메모리 브로커/스트림을 모든 계좌에 돌려주는 커넥터.
#[derive(Debug, Clone)]
pub struct PaperConnector {
    broker: PaperBroker,
    feed: PaperFeed,
}

impl PaperConnector {
    pub fn new(broker: PaperBroker, feed: PaperFeed) -> Self {
        Self { broker, feed }
    }
}

impl BrokerConnector for PaperConnector {
    fn connect(&self, _account: &Account, _config: &SessionConfig) -> ExchangeResult<BrokerHandles> {
        Ok(BrokerHandles {
            api: Arc::new(self.broker.clone()),
            feed: Arc::new(self.feed.clone()),
        })
    }
}
