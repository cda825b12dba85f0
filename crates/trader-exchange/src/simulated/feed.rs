//! 메모리 시세 스트림.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tick_cache::{tick_key, TickCache};
use crate::traits::{ExchangeResult, MarketFeed};
use crate::ExchangeError;

#[derive(Debug, Default)]
struct FeedState {
    prices: HashMap<String, Decimal>,
    subscriptions: Vec<String>,
    sinks: Vec<TickCache>,
    handshake: bool,
}

/// 지정한 가격을 구독 즉시 방송하는 시세 스트림.
///
/// 같은 인스턴스로 시작한 모든 캐시에 같은 가격을 씁니다.
#[derive(Debug, Clone)]
pub struct PaperFeed {
    state: Arc<RwLock<FeedState>>,
}

impl Default for PaperFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperFeed {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState {
                handshake: true,
                ..FeedState::default()
            })),
        }
    }

    /// 핸드셰이크를 보내지 않는 스트림 (세션이 계속 비정상 상태).
    pub fn silent() -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState::default())),
        }
    }

    /// 가격을 설정합니다. 이미 구독 중이면 즉시 캐시에 반영합니다.
    pub async fn set_price(&self, exchange: &str, token: &str, price: Decimal) {
        let mut state = self.state.write().await;
        let key = tick_key(exchange, token);
        state.prices.insert(key.clone(), price);

        if state.subscriptions.contains(&key) {
            for ticks in &state.sinks {
                ticks.update(exchange, token, price).await;
            }
        }
    }

    /// 연결 끊김을 흉내 냅니다 (캐시 비움, 상태 false).
    pub async fn drop_connection(&self) {
        let mut state = self.state.write().await;
        state.subscriptions.clear();
        for ticks in &state.sinks {
            ticks.set_connected(false);
            ticks.clear().await;
        }
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.state.read().await.subscriptions.clone()
    }
}

#[async_trait]
impl MarketFeed for PaperFeed {
    async fn start(&self, ticks: TickCache) -> ExchangeResult<()> {
        let mut state = self.state.write().await;
        ticks.clear().await;
        if state.handshake {
            ticks.set_connected(true);
        }
        state.sinks.push(ticks);
        Ok(())
    }

    async fn subscribe(&self, exchange: &str, token: &str) -> ExchangeResult<()> {
        let mut state = self.state.write().await;
        if state.sinks.is_empty() {
            return Err(ExchangeError::Disconnected(
                "paper feed not started".to_string(),
            ));
        }

        let key = tick_key(exchange, token);
        if !state.subscriptions.contains(&key) {
            state.subscriptions.push(key.clone());
        }
        if let Some(price) = state.prices.get(&key).copied() {
            for ticks in &state.sinks {
                ticks.update(exchange, token, price).await;
            }
        }
        Ok(())
    }

    fn shutdown(&self) {
        if let Ok(state) = self.state.try_read() {
            for ticks in &state.sinks {
                ticks.set_connected(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_subscribe_broadcasts_known_price() {
        let feed = PaperFeed::new();
        let ticks = TickCache::new();
        feed.set_price("NSECM", "26000", dec!(22010)).await;

        feed.start(ticks.clone()).await.unwrap();
        assert!(ticks.is_connected());

        feed.subscribe("NSECM", "26000").await.unwrap();
        assert_eq!(ticks.get("NSECM", "26000").await, Some(dec!(22010)));

        feed.set_price("NSECM", "26000", dec!(22050)).await;
        assert_eq!(ticks.get("NSECM", "26000").await, Some(dec!(22050)));
    }

    #[tokio::test]
    async fn test_silent_feed() {
        let feed = PaperFeed::silent();
        let ticks = TickCache::new();
        feed.start(ticks.clone()).await.unwrap();
        assert!(!ticks.is_connected());
    }

    #[tokio::test]
    async fn test_subscribe_before_start() {
        let feed = PaperFeed::new();
        assert!(feed.subscribe("MCX", "1").await.is_err());
    }
}
