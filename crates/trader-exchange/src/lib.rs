//! 브로커 연결과 계좌 세션.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - [`BrokerApi`] / [`MarketFeed`]: 브로커 REST와 시세 스트림 경계
//! - Multitrade 커넥터 (REST + WebSocket)
//! - 종목 마스터 파싱과 종목 조회
//! - [`Session`]: 로그인된 계좌 하나의 시세/주문 창구
//! - 메모리 브로커 (테스트와 드라이런용)

pub mod connector;
pub mod contract;
pub mod error;
pub mod session;
pub mod simulated;
pub mod tick_cache;
pub mod traits;

pub use connector::{MultitradeClient, MultitradeConfig, MultitradeConnector, MultitradeFeed};
pub use contract::{parse_master_csv, ContractMaster, ContractRow, ResolvedInstrument};
pub use error::*;
pub use session::Session;
pub use simulated::{FillMode, PaperBroker, PaperConnector, PaperFeed};
pub use tick_cache::{tick_key, TickCache};
pub use traits::*;
