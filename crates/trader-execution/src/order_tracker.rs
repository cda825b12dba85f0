//! 레그 주문 추적.
//!
//! 매 사이클 레그마다 한 번, 브로커 주문장 스냅샷과 레그의 진입/청산 장부를 맞춥니다.
//!
//! | 상태 | 제출 실패 | Execute | Reject | Pending / Partial |
//! |---|---|---|---|---|
//! | entered | `no_position`으로 되돌림 | 평가 계속 | `no_position`으로 되돌림 | 체결 정보 반영, 지정가 대기 초과 시 취소 후 재주문 |
//! | exited | `entered`로 되돌림 | 실현 손익 정산 후 `no_position` | `entered`로 되돌림 | 동일 |
//!
//! 평가 계속(`Continue`)이 아니면 이번 사이클에서 해당 레그의 다른 판단은 하지 않습니다.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use trader_core::{
    find_order, BrokerOrderStatus, Leg, LegState, OrderKind, OrderSnapshot, Port, Strategy,
};
use trader_data::EngineStore;

use crate::account_manager::AccountManager;
use crate::clock::Clock;
use crate::error::EngineResult;
use crate::journal::Journal;

/// 추적 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// 진행 중인 주문 없음. 진입/청산 판단을 계속합니다.
    Continue,
    /// 이번 사이클은 이 레그를 더 평가하지 않습니다.
    Hold,
}

/// 재주문 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// 새 지정가 주문 제출
    Replaced,
    /// 재주문 한도 소진. 호출자가 진입/청산을 정리해야 합니다.
    Close,
}

/// 진입/청산 장부 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Entry,
    Exit,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::Entry => "entry",
            TicketKind::Exit => "exit",
        }
    }
}

/// 추적기가 재주문에 쓰는 진입/청산 동작.
///
/// 최초 진입/청산과 같은 주문 경로를 쓰므로 주문 기록과 로그가 동일하게 남습니다.
#[async_trait]
pub trait LegActions: Send + Sync {
    /// 보유 종목 그대로 진입 지정가 주문을 다시 냅니다.
    async fn reenter(&self, leg: &mut Leg, port: &Port, quantity: i64) -> EngineResult<()>;

    /// 청산 지정가 주문을 다시 냅니다.
    async fn reexit(&self, leg: &mut Leg, port: &Port, quantity: i64) -> EngineResult<()>;
}

/// 주문 추적기.
#[derive(Clone)]
pub struct OrderTracker {
    accounts: Arc<AccountManager>,
    store: Arc<dyn EngineStore>,
    journal: Journal,
    clock: Clock,
}

impl OrderTracker {
    pub fn new(
        accounts: Arc<AccountManager>,
        store: Arc<dyn EngineStore>,
        journal: Journal,
        clock: Clock,
    ) -> Self {
        Self {
            accounts,
            store,
            journal,
            clock,
        }
    }

    /// 레그 하나를 주문장과 맞춥니다.
    #[instrument(skip_all, fields(leg = %leg.name, state = leg.state.name()))]
    pub async fn check_leg(
        &self,
        book: &[OrderSnapshot],
        leg: &mut Leg,
        port: &Port,
        strategy: &Strategy,
        actions: &dyn LegActions,
    ) -> EngineResult<TrackOutcome> {
        let kind = match leg.state {
            LegState::NoPosition => return Ok(TrackOutcome::Continue),
            LegState::Entered(_) => TicketKind::Entry,
            LegState::Exited(_) => TicketKind::Exit,
        };
        let ticket = match kind {
            TicketKind::Entry => &leg.entry,
            TicketKind::Exit => &leg.exit,
        };

        if !ticket.accepted() {
            warn!(message = %ticket.message, "{} order was not accepted, reverting", kind.as_str());
            self.revert(leg, kind).await?;
            return Ok(TrackOutcome::Hold);
        }

        let status = ticket.status.clone();
        match (status, kind) {
            (BrokerOrderStatus::Execute, TicketKind::Entry) => Ok(TrackOutcome::Continue),
            (BrokerOrderStatus::Execute, TicketKind::Exit) => {
                self.finalize_exit(leg, port).await?;
                Ok(TrackOutcome::Hold)
            }
            (BrokerOrderStatus::Reject, _) => {
                warn!("{} order rejected, reverting", kind.as_str());
                self.revert(leg, kind).await?;
                Ok(TrackOutcome::Hold)
            }
            (status, _) if status.is_working() => {
                self.reconcile(book, leg, port, strategy, kind, actions)
                    .await
            }
            (status, _) => {
                debug!(status = %status, "Order in terminal state, holding leg");
                Ok(TrackOutcome::Hold)
            }
        }
    }

    /// 주문장 스냅샷 반영과 지정가 대기 시간 초과 처리.
    async fn reconcile(
        &self,
        book: &[OrderSnapshot],
        leg: &mut Leg,
        port: &Port,
        strategy: &Strategy,
        kind: TicketKind,
        actions: &dyn LegActions,
    ) -> EngineResult<TrackOutcome> {
        let ticket = match kind {
            TicketKind::Entry => &leg.entry,
            TicketKind::Exit => &leg.exit,
        };
        let exchange = port.scrip.exchanges().trading;
        let Some(snapshot) = find_order(book, exchange, &ticket.order_id) else {
            warn!(order_id = %ticket.order_id, exchange, "Order missing from order book");
            return Ok(TrackOutcome::Hold);
        };

        let terminal = ticket.order_type == OrderKind::Market
            || snapshot.status != BrokerOrderStatus::Pending;
        if terminal {
            match kind {
                TicketKind::Entry => leg.apply_entry_snapshot(snapshot),
                TicketKind::Exit => leg.apply_exit_snapshot(snapshot),
            }
            self.store.save_leg(leg).await?;
            return Ok(TrackOutcome::Hold);
        }

        let placed_at = match kind {
            TicketKind::Entry => snapshot.order_time(),
            TicketKind::Exit => snapshot.exchange_time(),
        };
        let Some(placed_at) = placed_at else {
            warn!(order_id = %snapshot.order_id, "Order has no readable timestamp");
            return Ok(TrackOutcome::Hold);
        };

        let elapsed = (self.clock.now() - placed_at).num_seconds();
        let allowed = leg.config.modification_wait.as_secs_f64();
        if (elapsed as f64) <= allowed {
            return Ok(TrackOutcome::Hold);
        }

        let cancel = self
            .accounts
            .cancel_order(strategy, &snapshot.order_id)
            .await;
        let cancel_message = cancel
            .as_ref()
            .map_or_else(|| "None".to_string(), |ack| ack.raw.to_string());
        self.journal
            .error(
                format!(
                    "Time elapsed: {} > Max allowed time diff.: {}, retrying, {} order cancellation message: {}",
                    elapsed,
                    allowed,
                    kind.as_str(),
                    cancel_message
                ),
                Some(port.id),
            )
            .await;

        if !cancel.map_or(false, |ack| ack.is_success()) {
            return Ok(TrackOutcome::Hold);
        }

        let quantity = snapshot.quantity;
        if self.replace_order(quantity, leg, port, kind, actions).await? == ReplaceOutcome::Close {
            let modifications = match kind {
                TicketKind::Entry => leg.entry.modifications,
                TicketKind::Exit => leg.exit.modifications,
            };
            self.journal
                .error(
                    format!(
                        "No. of modifications already done: {} exceeds Max allowed No. of modifications: {}, cancelling {}",
                        modifications,
                        leg.config.max_modifications,
                        kind.as_str()
                    ),
                    Some(port.id),
                )
                .await;
            self.revert(leg, kind).await?;
        }
        Ok(TrackOutcome::Hold)
    }

    /// 같은 수량으로 지정가 재주문. 재주문 한도에 도달했으면 주문하지 않고 `Close`.
    pub async fn replace_order(
        &self,
        quantity: i64,
        leg: &mut Leg,
        port: &Port,
        kind: TicketKind,
        actions: &dyn LegActions,
    ) -> EngineResult<ReplaceOutcome> {
        let modifications = match kind {
            TicketKind::Entry => leg.entry.modifications,
            TicketKind::Exit => leg.exit.modifications,
        };
        if modifications >= leg.config.max_modifications {
            return Ok(ReplaceOutcome::Close);
        }

        match kind {
            TicketKind::Entry => actions.reenter(leg, port, quantity).await?,
            TicketKind::Exit => actions.reexit(leg, port, quantity).await?,
        }
        Ok(ReplaceOutcome::Replaced)
    }

    /// 청산 체결 정산: 실현 손익 누적 후 `no_position`.
    async fn finalize_exit(&self, leg: &mut Leg, port: &Port) -> EngineResult<()> {
        let pnl = leg.settle_exit(port.scrip.pnl_multiplier())?;
        self.store.save_leg(leg).await?;
        self.journal
            .pnl(
                format!("Booked P&L: {} for Leg#{}", pnl, leg.name),
                Some(port.id),
            )
            .await;
        Ok(())
    }

    async fn revert(&self, leg: &mut Leg, kind: TicketKind) -> EngineResult<()> {
        match kind {
            TicketKind::Entry => leg.revert_entry()?,
            TicketKind::Exit => leg.revert_exit()?,
        }
        self.store.save_leg(leg).await?;
        Ok(())
    }
}

impl std::fmt::Debug for OrderTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTracker")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
