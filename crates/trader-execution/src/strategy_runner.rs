//! 전략 실행기.
//!
//! 전략 하나의 한 사이클을 수행합니다.
//!
//! 1. 전략/사용자 재조회 (삭제된 전략이면 종료)
//! 2. 계좌 로그인 확인, 세션 비정상이면 이번 사이클 건너뜀
//! 3. 주문장 한 번 조회 후 포트들을 동시에 평가
//!
//! 포트 하나의 실패는 로그만 남기고 다른 포트에 영향을 주지 않습니다.
//! 레그 하나의 실패도 같은 포트의 다른 레그에 영향을 주지 않습니다.

use async_trait::async_trait;
use chrono::NaiveTime;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use trader_core::{
    latest_alert, rex_name, Alert, AlertKind, BrokerOrderStatus, Direction, ExitTrigger, Leg,
    OrderKind, OrderSnapshot, OrderTicket, Port, PortFlagUpdate, PortPhase, Position, Side,
    Strategy, TraderError, TradingMode, User,
};

use crate::account_manager::{LegOrder, OrderQuantity, PlacedOrder};
use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::order_tracker::{LegActions, OrderTracker, TrackOutcome};

/// 전략 한 사이클의 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 포트 평가 완료
    Completed { ports: usize, failed: usize },
    /// 전략이 삭제됨
    Deleted,
    /// 로그인 실패
    NotLoggedIn,
    /// 시세 스트림 미연결
    SessionUnhealthy,
    /// 주문장 조회 실패
    OrderBookUnavailable,
}

/// 레그 평가가 어디까지 진행됐는지.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegVisit {
    /// 진행 중인 주문 때문에 보류
    Held,
    /// 진입/청산 판단까지 진행
    Evaluated,
}

/// 전략 실행기.
pub struct StrategyRunner {
    strategy: Strategy,
    user: User,
    ctx: EngineContext,
    tracker: OrderTracker,
}

impl StrategyRunner {
    /// 전략 사용자를 조회해 실행기를 만듭니다.
    pub async fn new(strategy: Strategy, ctx: EngineContext) -> EngineResult<Self> {
        let user = ctx.store.get_user(strategy.user_id).await?;
        let tracker = OrderTracker::new(
            ctx.accounts.clone(),
            ctx.store.clone(),
            ctx.journal.clone(),
            ctx.clock,
        );
        Ok(Self {
            strategy,
            user,
            ctx,
            tracker,
        })
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// 한 사이클 실행.
    #[instrument(skip(self), fields(strategy_id = self.strategy.id))]
    pub async fn run(&mut self) -> EngineResult<RunOutcome> {
        let Some(strategy) = self.ctx.store.get_strategy(self.strategy.id).await? else {
            info!(strategy = %self.strategy.name, "Strategy deleted, skipping");
            return Ok(RunOutcome::Deleted);
        };
        self.strategy = strategy;
        self.user = self.ctx.store.get_user(self.strategy.user_id).await?;

        let accounts = &self.ctx.accounts;
        if !accounts.ensure_logged_in(&self.strategy).await {
            return Ok(RunOutcome::NotLoggedIn);
        }
        if !accounts.is_healthy(&self.strategy).await {
            warn!(strategy = %self.strategy.name, "Price stream not connected, skipping cycle");
            return Ok(RunOutcome::SessionUnhealthy);
        }

        let book = match accounts.order_book(&self.strategy).await {
            Ok(book) => book,
            Err(_) => return Ok(RunOutcome::OrderBookUnavailable),
        };

        let ports = self.ctx.store.get_ports(self.strategy.id).await?;
        let total = ports.len();
        let workers = self.ctx.config.port_workers.max(1);
        let this = &*self;
        let book = book.as_slice();

        let results: Vec<(Port, EngineResult<()>)> = stream::iter(ports)
            .map(|port| async move {
                let result = this.run_port(&port, book).await;
                (port, result)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut failed = 0;
        for (port, result) in results {
            if let Err(e) = result {
                failed += 1;
                self.ctx
                    .journal
                    .error(
                        format!("Error {} came while running Port#{}", e, port.name),
                        Some(port.id),
                    )
                    .await;
            }
        }

        debug!(user = %self.user.username, ports = total, failed, "Strategy cycle finished");
        Ok(RunOutcome::Completed {
            ports: total,
            failed,
        })
    }

    // ==================== 포트 ====================

    #[instrument(skip_all, fields(port = %port.name))]
    async fn run_port(&self, port: &Port, book: &[OrderSnapshot]) -> EngineResult<()> {
        let store = &self.ctx.store;
        let mut port = port.clone();

        let alert = latest_alert(store.get_pending_alerts(port.id).await?);
        if let Some(alert) = &alert {
            store.complete_alert(alert.id).await?;
            debug!(alert_id = alert.id, kind = %alert.kind, "Consumed alert");
        }

        // 이번 사이클은 읽은 값으로 평가하고 저장소만 비움
        if port.controls.execute_button {
            store
                .update_port_flags(port.id, PortFlagUpdate::ClearExecuteButton)
                .await?;
        }

        let mut legs = store.get_legs(port.id).await?;

        if !port.combined_exit_done {
            let combined: Decimal = legs.iter().map(Leg::total_pnl).sum();
            if let Some(breach) = port.combined_breach(combined) {
                self.combined_exit(&mut port, &mut legs, &breach.to_string())
                    .await?;
            }
        }

        let now = self.ctx.clock.time();
        let mut squareoff_seen = false;
        for leg in legs.iter_mut() {
            match self.run_leg(leg, &port, alert.as_ref(), book, now).await {
                Ok(LegVisit::Evaluated) => squareoff_seen |= port.controls.squareoff_button,
                Ok(LegVisit::Held) => {}
                Err(e) => {
                    if e.is_fatal() {
                        warn!(
                            leg = %leg.name,
                            error = %e,
                            "Leg keeps failing until its configuration is fixed"
                        );
                    }
                    self.ctx
                        .journal
                        .error(
                            format!("Error {} came while evaluating Leg#{}", e, leg.name),
                            Some(port.id),
                        )
                        .await;
                }
            }
        }

        if squareoff_seen {
            store
                .update_port_flags(port.id, PortFlagUpdate::ClearSquareoffButton)
                .await?;
        }
        Ok(())
    }

    /// 합산 손익 한도 돌파: 보유 레그 전량 청산, 플래그 기록, 필요하면 재실행.
    async fn combined_exit(
        &self,
        port: &mut Port,
        legs: &mut [Leg],
        reason: &str,
    ) -> EngineResult<()> {
        self.ctx
            .journal
            .info(format!("{}, re-executing port", reason), Some(port.id))
            .await;

        for leg in legs.iter_mut().filter(|leg| leg.is_filled_entry()) {
            if let Err(e) = self.exit_leg(leg, port).await {
                self.ctx
                    .journal
                    .error(
                        format!("Error {} came while exiting Leg#{}", e, leg.name),
                        Some(port.id),
                    )
                    .await;
            }
        }

        self.ctx
            .store
            .update_port_flags(port.id, PortFlagUpdate::MarkCombinedExitDone)
            .await?;
        port.combined_exit_done = true;

        if port.to_re_execute {
            self.reexecute_port(port).await?;
        }
        Ok(())
    }

    /// 포트와 레그 설정을 `_REXn` 이름으로 복제합니다.
    async fn reexecute_port(&self, port: &Port) -> EngineResult<i64> {
        let new_name = rex_name(&port.name);
        let new_id = self
            .ctx
            .store
            .clone_port(&new_name, port, self.strategy.id)
            .await?;
        info!(from = %port.name, to = %new_name, port_id = new_id, "Port re-executed");
        Ok(new_id)
    }

    // ==================== 레그 ====================

    async fn run_leg(
        &self,
        leg: &mut Leg,
        port: &Port,
        alert: Option<&Alert>,
        book: &[OrderSnapshot],
        now: NaiveTime,
    ) -> EngineResult<LegVisit> {
        if self
            .tracker
            .check_leg(book, leg, port, &self.strategy, self)
            .await?
            != TrackOutcome::Continue
        {
            return Ok(LegVisit::Held);
        }

        let journal = &self.ctx.journal;
        if port.controls.squareoff_button {
            if leg.is_entered() {
                journal
                    .info(
                        format!("Exiting Leg#{} because Squareoff button was clicked", leg.name),
                        Some(port.id),
                    )
                    .await;
                self.exit_leg(leg, port).await?;
            }
            return Ok(LegVisit::Evaluated);
        }
        if port.controls.stop_button {
            return Ok(LegVisit::Evaluated);
        }

        match port.schedule.phase(now) {
            PortPhase::SquareOff if leg.is_entered() => {
                journal
                    .info(
                        format!("Exiting Leg#{} as Squareoff time is reached", leg.name),
                        Some(port.id),
                    )
                    .await;
                self.exit_leg(leg, port).await?;
            }
            PortPhase::Trading { entries_open } => {
                if leg.is_flat() && entries_open && !port.combined_exit_done {
                    self.try_entry(leg, port, alert).await?;
                } else if leg.is_entered() {
                    self.evaluate_position(leg, port, alert).await?;
                }
            }
            _ => {}
        }
        Ok(LegVisit::Evaluated)
    }

    /// 진입 판단. 알림 → 수동 버튼 → 재실행 포트 순으로 하나만 적용합니다.
    async fn try_entry(&self, leg: &mut Leg, port: &Port, alert: Option<&Alert>) -> EngineResult<()> {
        let entry = match alert {
            Some(alert) if alert.kind == AlertKind::Entry => {
                if !alert.applies_to(&port.name, &leg.name) {
                    debug!(alert_id = alert.id, leg = %leg.name, "Entry alert targets another leg");
                    return Ok(());
                }
                Some((
                    format!(
                        "Taking entry in Leg#{} as Latest TV Entry Alert: {} has come{}",
                        leg.name,
                        alert.id,
                        unqualified_suffix(alert, &port.name)
                    ),
                    alert.lots,
                ))
            }
            _ if port.controls.execute_button => Some((
                format!(
                    "Taking entry in Leg#{} as Manual Execute Button was clicked",
                    leg.name
                ),
                port.controls.execute_button_lots,
            )),
            _ if port.is_re_executed_port => Some((
                format!("Taking entry in Leg#{} as this port is re-executed", leg.name),
                port.lots_multiplier_set,
            )),
            _ => None,
        };

        let Some((reason, multiplier)) = entry else {
            return Ok(());
        };
        self.ctx.journal.info(reason, Some(port.id)).await;
        self.enter_leg(leg, port, multiplier).await?;

        if port.is_re_executed_port {
            self.ctx
                .store
                .update_port_flags(port.id, PortFlagUpdate::ClearReExecuted)
                .await?;
        }
        Ok(())
    }

    /// 보유 레그의 청산 판단, 청산하지 않으면 평가 손익 갱신.
    async fn evaluate_position(
        &self,
        leg: &mut Leg,
        port: &Port,
        alert: Option<&Alert>,
    ) -> EngineResult<()> {
        let token = open_position(leg)?.token;
        let accounts = &self.ctx.accounts;
        let ltp = accounts
            .ltp(&self.strategy, port.scrip.exchanges().trading, &token)
            .await?;
        let underlying_ltp = accounts.underlying_ltp(&self.strategy, port).await?;

        let reason = match alert {
            Some(alert) if alert.kind == AlertKind::Exit => {
                if !alert.applies_to(&port.name, &leg.name) {
                    debug!(alert_id = alert.id, leg = %leg.name, "Exit alert targets another leg");
                    return Ok(());
                }
                Some(format!(
                    "Exiting Leg#{} as Latest TV Exit Alert: {} has come{}",
                    leg.name,
                    alert.id,
                    unqualified_suffix(alert, &port.name)
                ))
            }
            _ => leg
                .check_exit(ltp, underlying_ltp)
                .map(|trigger| exit_message(&trigger, leg.config.side, &leg.name)),
        };

        match reason {
            Some(reason) => {
                self.ctx.journal.info(reason, Some(port.id)).await;
                self.exit_leg(leg, port).await
            }
            None => {
                leg.mark(ltp, port.scrip.pnl_multiplier())?;
                self.ctx.store.save_leg(leg).await?;
                Ok(())
            }
        }
    }

    /// 신규 진입: 종목 선택, 주문, 레그 저장.
    #[instrument(skip_all, fields(leg = %leg.name))]
    async fn enter_leg(&self, leg: &mut Leg, port: &Port, multiplier: Decimal) -> EngineResult<()> {
        let accounts = &self.ctx.accounts;
        let lots = Decimal::from(leg.config.lots) * multiplier * self.strategy.lots_multiplier;
        let resolved = accounts
            .resolve_instrument(&self.strategy, port, &leg.config)
            .await?;

        let placed = accounts
            .place_order(
                &self.strategy,
                port,
                LegOrder {
                    instrument: resolved.description.clone(),
                    token: resolved.token.clone(),
                    amount: OrderQuantity::Lots(lots),
                    side: leg.config.side,
                    order_type: leg.config.order_type,
                    limit_pct: leg.config.limit_pct,
                },
            )
            .await?;

        let position = Position::new(
            resolved.description,
            resolved.token,
            resolved.strike,
            placed.underlying_ltp,
        );
        let ticket = new_ticket(port.trading_mode, leg.config.order_type, placed);
        leg.enter(position, ticket, multiplier)?;
        self.ctx.store.save_leg(leg).await?;
        Ok(())
    }

    /// 청산 주문: 진입 체결 수량 전량, 반대 방향.
    #[instrument(skip_all, fields(leg = %leg.name))]
    async fn exit_leg(&self, leg: &mut Leg, port: &Port) -> EngineResult<()> {
        let position = open_position(leg)?;
        let order_type = leg.config.order_type;
        let placed = self
            .ctx
            .accounts
            .place_order(
                &self.strategy,
                port,
                LegOrder {
                    instrument: position.instrument,
                    token: position.token,
                    amount: OrderQuantity::Quantity(leg.entry.filled_qty),
                    side: leg.config.side.opposite(),
                    order_type,
                    limit_pct: leg.config.limit_pct,
                },
            )
            .await?;

        leg.exit(new_ticket(port.trading_mode, order_type, placed))?;
        self.ctx.store.save_leg(leg).await?;
        Ok(())
    }
}

#[async_trait]
impl LegActions for StrategyRunner {
    async fn reenter(&self, leg: &mut Leg, port: &Port, quantity: i64) -> EngineResult<()> {
        let position = open_position(leg)?;
        let placed = self
            .ctx
            .accounts
            .place_order(
                &self.strategy,
                port,
                LegOrder {
                    instrument: position.instrument.clone(),
                    token: position.token.clone(),
                    amount: OrderQuantity::Quantity(quantity),
                    side: leg.config.side,
                    order_type: OrderKind::Limit,
                    limit_pct: leg.config.limit_pct,
                },
            )
            .await?;

        let position = Position::new(
            position.instrument,
            position.token,
            position.strike,
            placed.underlying_ltp,
        );
        leg.replace_entry(position, new_ticket(port.trading_mode, OrderKind::Limit, placed))?;
        self.ctx.store.save_leg(leg).await?;
        Ok(())
    }

    async fn reexit(&self, leg: &mut Leg, port: &Port, quantity: i64) -> EngineResult<()> {
        let position = open_position(leg)?;
        let placed = self
            .ctx
            .accounts
            .place_order(
                &self.strategy,
                port,
                LegOrder {
                    instrument: position.instrument,
                    token: position.token,
                    amount: OrderQuantity::Quantity(quantity),
                    side: leg.config.side.opposite(),
                    order_type: OrderKind::Limit,
                    limit_pct: leg.config.limit_pct,
                },
            )
            .await?;

        leg.replace_exit(new_ticket(port.trading_mode, OrderKind::Limit, placed))?;
        self.ctx.store.save_leg(leg).await?;
        Ok(())
    }
}

impl std::fmt::Debug for StrategyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRunner")
            .field("strategy", &self.strategy)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// 주문 결과로 레그 장부를 만듭니다.
///
/// 페이퍼는 주문 시점 현재가로 즉시 체결, 실거래는 주문 추적기가 체결을 반영할 때까지 대기.
fn new_ticket(mode: TradingMode, order_type: OrderKind, placed: PlacedOrder) -> OrderTicket {
    let (status, filled_qty, executed_price) = match mode {
        TradingMode::Paper => (BrokerOrderStatus::Execute, placed.quantity, placed.ltp),
        TradingMode::Live => (BrokerOrderStatus::Pending, 0, Decimal::ZERO),
    };
    OrderTicket {
        order_id: placed.order_id,
        order_type,
        message: placed.message,
        status,
        filled_qty,
        executed_price,
        modifications: 0,
    }
}

fn open_position(leg: &Leg) -> Result<Position, TraderError> {
    leg.position()
        .cloned()
        .ok_or_else(|| TraderError::InvalidInput(format!("Leg#{} has no open position", leg.name)))
}

fn unqualified_suffix(alert: &Alert, port_name: &str) -> &'static str {
    if alert.target_leg_name(port_name).is_none() {
        " (strike/expiry not provided)"
    } else {
        ""
    }
}

/// 청산 사유 문구.
fn exit_message(trigger: &ExitTrigger, side: Side, leg_name: &str) -> String {
    let reason = match (trigger, side) {
        (ExitTrigger::PremiumStopLoss { price, level }, Side::Buy) => {
            format!("Premium: {} went below SL: {}", price, level)
        }
        (ExitTrigger::PremiumStopLoss { price, level }, Side::Sell) => {
            format!("Premium: {} went above SL: {}", price, level)
        }
        (ExitTrigger::Target { price, level }, Side::Buy) => {
            format!("Premium: {} went above Target: {}", price, level)
        }
        (ExitTrigger::Target { price, level }, Side::Sell) => {
            format!("Premium: {} went below Target: {}", price, level)
        }
        (
            ExitTrigger::UnderlyingStopLoss {
                price,
                level,
                direction,
            },
            _,
        ) => match direction {
            Direction::Bullish => {
                format!("Underlying LTP: {} went below SL: {}", price, level)
            }
            Direction::Bearish => {
                format!("Underlying LTP: {} went above SL: {}", price, level)
            }
        },
    };
    format!("{}, exiting Leg#{}", reason, leg_name)
}
