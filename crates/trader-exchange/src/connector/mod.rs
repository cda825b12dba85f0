//! 브로커 커넥터.

pub mod multitrade;

pub use multitrade::{MultitradeClient, MultitradeConfig, MultitradeConnector, MultitradeFeed};
