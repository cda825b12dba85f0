//! 계좌별 시세 캐시.
//!
//! 시세 스트림이 쓰고 엔진이 읽습니다. 키는 `"{거래소}:{토큰}"`입니다.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 시세 캐시 키.
pub fn tick_key(exchange: &str, token: &str) -> String {
    format!("{}:{}", exchange, token)
}

/// 공유 시세 캐시와 스트림 연결 상태.
#[derive(Debug, Clone, Default)]
pub struct TickCache {
    prices: Arc<RwLock<HashMap<String, Decimal>>>,
    connected: Arc<AtomicBool>,
}

impl TickCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 캐시 값. 구독 전이면 `None`.
    pub async fn get(&self, exchange: &str, token: &str) -> Option<Decimal> {
        self.prices.read().await.get(&tick_key(exchange, token)).copied()
    }

    /// 아직 없으면 0을 넣고 `true`를 반환합니다 (호출자가 구독해야 함).
    pub async fn seed(&self, exchange: &str, token: &str) -> bool {
        let mut prices = self.prices.write().await;
        let key = tick_key(exchange, token);
        if prices.contains_key(&key) {
            return false;
        }
        prices.insert(key, Decimal::ZERO);
        true
    }

    /// 시드를 되돌립니다 (구독 실패 시).
    pub async fn forget(&self, exchange: &str, token: &str) {
        self.prices.write().await.remove(&tick_key(exchange, token));
    }

    /// 수신한 체결가 기록.
    pub async fn update(&self, exchange: &str, token: &str, ltp: Decimal) {
        self.prices
            .write()
            .await
            .insert(tick_key(exchange, token), ltp);
    }

    /// 재연결 시 캐시를 비웁니다. 이후 조회는 다시 구독합니다.
    pub async fn clear(&self) {
        self.prices.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.prices.read().await.len()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// 핸드셰이크 이후 연결 상태인지 확인합니다.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
