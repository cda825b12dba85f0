//! Multitrade 시세 WebSocket.
//!
//! 연결 감독 태스크가 끊김을 감지하면 일정 시간 후 다시 연결합니다.
//! 연결마다 시세 캐시를 비우므로 이후 조회가 구독을 다시 보냅니다.
//!
//! # 메시지
//!
//! - `HandShake`: 연결 완료 → 캐시 연결 상태 `true`
//! - `Broadcast`: `EXC`/`SECID`/`LTP` 체결가 → 캐시 갱신

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{subscribe_frame, FeedMessage};
use crate::tick_cache::TickCache;
use crate::traits::{ExchangeResult, MarketFeed};
use crate::ExchangeError;

type Outbound = Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>;

/// Multitrade 시세 스트림.
pub struct MultitradeFeed {
    url: String,
    account_name: String,
    reconnect_delay: Duration,
    outbound: Outbound,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MultitradeFeed {
    pub fn new(url: impl Into<String>, account_name: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            account_name: account_name.into(),
            reconnect_delay,
            outbound: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// 연결 감독 루프. 취소될 때까지 재연결합니다.
    async fn supervise(
        url: String,
        account: String,
        reconnect_delay: Duration,
        ticks: TickCache,
        outbound: Outbound,
        cancel: CancellationToken,
    ) {
        loop {
            match Self::run_connection(&url, &account, &ticks, &outbound, &cancel).await {
                Ok(()) => info!(account = %account, "Multitrade websocket closed"),
                Err(e) => error!(account = %account, error = %e, "Multitrade websocket error"),
            }

            ticks.set_connected(false);
            *outbound.write().await = None;

            if cancel.is_cancelled() {
                break;
            }

            warn!(
                account = %account,
                delay_ms = reconnect_delay.as_millis() as u64,
                "Multitrade websocket connection lost, reconnecting"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
        debug!(account = %account, "Feed supervisor stopped");
    }

    /// 연결 하나의 수명. 정상 종료면 `Ok`.
    async fn run_connection(
        url: &str,
        account: &str,
        ticks: &TickCache,
        outbound: &Outbound,
        cancel: &CancellationToken,
    ) -> ExchangeResult<()> {
        let (stream, _) = connect_async(url).await?;
        let (mut write, mut read) = stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *outbound.write().await = Some(tx);
        ticks.clear().await;
        info!(account = %account, "Connected to Multitrade websocket");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(frame) = rx.recv() => {
                    if let Err(e) = write.send(frame).await {
                        if is_closed(&e) {
                            return Err(e.into());
                        }
                        error!(account = %account, error = %e, "Websocket send error");
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => Self::handle_message(account, &text, ticks).await,
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            if is_closed(&e) {
                                return Err(e.into());
                            }
                            error!(account = %account, error = %e, "Websocket pong error");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(account = %account, ?frame, "Server closed websocket");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) if is_closed(&e) => return Err(e.into()),
                    Some(Err(e)) => {
                        error!(account = %account, error = %e, "Websocket receive error");
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    async fn handle_message(account: &str, text: &str, ticks: &TickCache) {
        match FeedMessage::parse(text) {
            Ok(FeedMessage::HandShake) => {
                ticks.set_connected(true);
                info!(account = %account, "Multitrade websocket handshake received");
            }
            Ok(FeedMessage::Broadcast {
                exchange,
                token,
                ltp,
            }) => ticks.update(&exchange, &token, ltp).await,
            Ok(FeedMessage::Other(kind)) => debug!(kind = %kind, "Ignoring feed message"),
            Err(e) => error!(account = %account, error = %e, "Failed to handle feed message"),
        }
    }
}

/// 연결 자체가 끊긴 에러인지 확인합니다. 그 외 송수신 에러는 연결을 유지합니다.
fn is_closed(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
    )
}

#[async_trait]
impl MarketFeed for MultitradeFeed {
    async fn start(&self, ticks: TickCache) -> ExchangeResult<()> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        *task = Some(tokio::spawn(Self::supervise(
            self.url.clone(),
            self.account_name.clone(),
            self.reconnect_delay,
            ticks,
            self.outbound.clone(),
            self.cancel.clone(),
        )));
        Ok(())
    }

    async fn subscribe(&self, exchange: &str, token: &str) -> ExchangeResult<()> {
        let guard = self.outbound.read().await;
        let sender = guard.as_ref().ok_or_else(|| {
            ExchangeError::Disconnected(format!("feed for {} is not connected", self.account_name))
        })?;

        sender
            .send(Message::Text(subscribe_frame(exchange, token)))
            .map_err(|_| ExchangeError::Disconnected("feed writer closed".to_string()))?;
        Ok(())
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for MultitradeFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_handle_message_updates_cache() {
        let ticks = TickCache::new();
        MultitradeFeed::handle_message("desk-1", r#"{"Message":"HandShake"}"#, &ticks).await;
        assert!(ticks.is_connected());

        MultitradeFeed::handle_message(
            "desk-1",
            r#"{"Message":"Broadcast","EXC":"NSEFO","SECID":"4411","LTP":"101.5"}"#,
            &ticks,
        )
        .await;
        assert_eq!(ticks.get("NSEFO", "4411").await, Some(dec!(101.5)));

        // 잘못된 메시지는 무시
        MultitradeFeed::handle_message("desk-1", "garbage", &ticks).await;
        assert_eq!(ticks.len().await, 1);
    }

    #[test]
    fn test_only_closed_socket_ends_connection() {
        assert!(is_closed(&tungstenite::Error::ConnectionClosed));
        assert!(is_closed(&tungstenite::Error::AlreadyClosed));
        assert!(is_closed(&tungstenite::Error::Io(std::io::Error::from(
            std::io::ErrorKind::BrokenPipe
        ))));

        // 큰 프레임 전송 실패는 연결을 유지
        let too_long = tungstenite::Error::Capacity(
            tungstenite::error::CapacityError::MessageTooLong {
                size: 1 << 25,
                max_size: 1 << 24,
            },
        );
        assert!(!is_closed(&too_long));
    }

    #[tokio::test]
    async fn test_subscribe_without_connection() {
        let feed = MultitradeFeed::new("ws://127.0.0.1:1", "desk-1", Duration::from_millis(10));
        let err = feed.subscribe("MCX", "233").await.unwrap_err();
        assert!(matches!(err, ExchangeError::Disconnected(_)));
    }

    #[tokio::test]
    async fn test_unreachable_feed_stays_disconnected() {
        let feed = MultitradeFeed::new("ws://127.0.0.1:1", "desk-1", Duration::from_millis(10));
        let ticks = TickCache::new();
        feed.start(ticks.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!ticks.is_connected());
        feed.shutdown();
    }
}
