//! 엔진 통합 테스트.
//!
//! 메모리 저장소와 메모리 브로커로 전략 사이클 전체를 돌립니다.
//! 시계는 2024-01-25 10:00 (거래 중, 신규 진입 가능)으로 고정합니다.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trader_core::{
    Account, Alert, AlertKind, InstrumentType, Leg, LegConfig, LegState, OrderKind, OrderTicket,
    Port, PortControls, PortSchedule, RiskThreshold, SchedulerConfig, Scrip, ScripType,
    SessionConfig, Side, SlBasis, Strategy, TradingMode, User, BROKER_TIMESTAMP_FORMAT,
};
use trader_data::{EngineStore, LogLevel, MemoryStore};
use trader_exchange::{parse_master_csv, FillMode, PaperBroker, PaperConnector, PaperFeed};
use trader_execution::{
    AccountManager, Clock, EngineContext, Journal, RunOutcome, Scheduler, StrategyRunner,
};

const CONTRACTS: &str = "\
26000,26000,Nifty 50,Nifty 50,21950.5,,0,0.05,1,,INDEX,NSECM
43001,43001,NIFTY,NIFTY 25JAN24 22100 CE,110,2024-01-25,22100,0.05,50,CE,OPTIDX,NSEFO
43002,43002,NIFTY,NIFTY 25JAN24 21900 PE,95,2024-01-25,21900,0.05,50,PE,OPTIDX,NSEFO
";

const PORT_ID: i64 = 7;
const LEG_ID: i64 = 21;
const LEG_NAME: &str = "P1-CE-22100-2024-01-25";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 25)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn account() -> Account {
    Account {
        id: 1,
        name: "desk-1".into(),
        api_key: "k".into(),
        api_secret: SecretString::from("s".to_string()),
        root_url: "http://paper/".into(),
        ws_root_url: "ws://paper".into(),
        lots_multiplier: Decimal::ONE,
    }
}

fn strategy() -> Strategy {
    Strategy {
        id: 1,
        user_id: 1,
        account_id: 1,
        name: "straddle".into(),
        lots_multiplier: Decimal::ONE,
    }
}

fn port(mode: TradingMode) -> Port {
    let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    Port {
        id: PORT_ID,
        strategy_id: 1,
        name: "P1".into(),
        scrip: Scrip::Nifty,
        scrip_type: ScripType::Index,
        trading_mode: mode,
        schedule: PortSchedule {
            start: t(9, 20),
            stop: t(14, 0),
            squareoff: t(15, 15),
        },
        combined_sl: Decimal::ZERO,
        combined_target: Decimal::ZERO,
        to_re_execute: false,
        lots_multiplier_set: Decimal::ONE,
        is_re_executed_port: false,
        combined_exit_done: false,
        controls: PortControls::default(),
    }
}

fn leg(order_type: OrderKind) -> Leg {
    Leg {
        id: LEG_ID,
        port_id: PORT_ID,
        name: LEG_NAME.into(),
        config: LegConfig {
            lots: 1,
            instrument_type: InstrumentType::Ce,
            strike_distance: 2,
            expiry: NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
            side: Side::Buy,
            order_type,
            limit_pct: dec!(1),
            max_modifications: 1,
            modification_wait: Duration::from_secs(30),
            sl_on: SlBasis::Premium,
            stop_loss: RiskThreshold::Points(dec!(10)),
            target: RiskThreshold::default(),
        },
        state: LegState::NoPosition,
        entry: OrderTicket::default(),
        exit: OrderTicket::default(),
        booked_pnl: Decimal::ZERO,
        lots_multiplier_set: Decimal::ONE,
    }
}

fn pressed(mut port: Port) -> Port {
    port.controls.execute_button = true;
    port.controls.execute_button_lots = Decimal::ONE;
    port
}

struct Engine {
    store: MemoryStore,
    broker: PaperBroker,
    feed: PaperFeed,
    ctx: EngineContext,
}

impl Engine {
    async fn new(port: Port, leg: Leg) -> Self {
        let store = MemoryStore::new();
        store
            .add_user(User {
                id: 1,
                username: "trader".into(),
            })
            .await;
        store.add_account(&account()).await;
        store.add_strategy(strategy()).await;
        store.add_port(port).await;
        store.add_leg(leg).await;

        let broker = PaperBroker::new(parse_master_csv(CONTRACTS).unwrap());
        let feed = PaperFeed::new();
        feed.set_price("NSECM", "26000", dec!(22012)).await;
        feed.set_price("NSEFO", "43001", dec!(110)).await;

        let shared: Arc<dyn EngineStore> = Arc::new(store.clone());
        let journal = Journal::new(shared.clone());
        let session = SessionConfig {
            price_poll_attempts: 3,
            price_poll_interval_ms: 1,
            login_retry_delay_secs: 0,
            error_backoff_ms: 0,
            ..SessionConfig::default()
        };
        let accounts = Arc::new(AccountManager::new(
            shared.clone(),
            Arc::new(PaperConnector::new(broker.clone(), feed.clone())),
            journal.clone(),
            session,
        ));
        let config = SchedulerConfig {
            cycle_pause_ms: 0,
            ..SchedulerConfig::default()
        };
        let ctx = EngineContext::new(shared, accounts, journal, config).with_clock(Clock::Fixed(now()));

        Self {
            store,
            broker,
            feed,
            ctx,
        }
    }

    async fn cycle(&self) -> RunOutcome {
        let mut runner = StrategyRunner::new(strategy(), self.ctx.clone()).await.unwrap();
        runner.run().await.unwrap()
    }

    async fn leg(&self) -> Leg {
        self.store.leg(LEG_ID).await.unwrap()
    }

    async fn port(&self) -> Port {
        self.store.port(PORT_ID).await.unwrap()
    }

    async fn log_texts(&self) -> Vec<String> {
        self.store.logs().await.into_iter().map(|l| l.text).collect()
    }

    /// 주문 접수 시각을 고정 시계보다 `secs`초 앞으로 돌립니다.
    async fn age_order(&self, order_id: &str, secs: i64) {
        let placed = (now() - ChronoDuration::seconds(secs))
            .format(BROKER_TIMESTAMP_FORMAT)
            .to_string();
        assert!(self.broker.set_order_timestamp(order_id, &placed).await);
    }
}

fn completed(outcome: RunOutcome) {
    assert_eq!(outcome, RunOutcome::Completed { ports: 1, failed: 0 });
}

// ==================== 진입 ====================

#[tokio::test]
async fn test_paper_entry_on_execute_button() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;

    completed(engine.cycle().await);

    let leg = engine.leg().await;
    assert!(leg.is_entered());
    assert_eq!(leg.entry.order_id, "0");
    assert_eq!(leg.entry.filled_qty, 50);
    assert_eq!(leg.entry.executed_price, dec!(110));
    let position = leg.position().unwrap();
    assert_eq!(position.token, "43001");
    assert_eq!(position.strike, dec!(22100));

    assert!(!engine.port().await.controls.execute_button);
    assert!(engine.broker.placed_orders().await.is_empty());

    let orders = engine.store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, 50);
    assert_eq!(orders[0].side, Side::Buy);

    let logs = engine.log_texts().await;
    assert!(logs.contains(&format!(
        "Taking entry in Leg#{} as Manual Execute Button was clicked",
        LEG_NAME
    )));
    assert!(logs.iter().any(|l| l.starts_with("Order Placed: NIFTY 25JAN24 22100 CE | Trade: BUY | Qty: 50")));

    // 버튼이 비워졌으므로 두 번째 사이클은 주문하지 않음
    completed(engine.cycle().await);
    assert_eq!(engine.store.orders().await.len(), 1);
}

#[tokio::test]
async fn test_entry_alert_sets_lots_and_is_consumed() {
    let engine = Engine::new(port(TradingMode::Paper), leg(OrderKind::Market)).await;
    engine
        .store
        .add_alert(Alert {
            id: 50,
            port_id: PORT_ID,
            kind: AlertKind::Entry,
            option_type: Some("CE".into()),
            strike: Some("22100".into()),
            expiry: Some("2024-01-25".into()),
            lots: dec!(2),
        })
        .await;

    completed(engine.cycle().await);

    assert_eq!(engine.store.alert_completed(50).await, Some(true));
    let leg = engine.leg().await;
    assert_eq!(leg.entry.filled_qty, 100);
    assert_eq!(leg.lots_multiplier_set, dec!(2));
    assert!(engine.log_texts().await.contains(&format!(
        "Taking entry in Leg#{} as Latest TV Entry Alert: 50 has come",
        LEG_NAME
    )));
}

#[tokio::test]
async fn test_alert_for_other_leg_skips_entry() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    engine
        .store
        .add_alert(Alert {
            id: 50,
            port_id: PORT_ID,
            kind: AlertKind::Entry,
            option_type: Some("CE".into()),
            strike: Some("22200".into()),
            expiry: Some("2024-01-25".into()),
            lots: Decimal::ONE,
        })
        .await;

    completed(engine.cycle().await);

    // 알림은 소비되고 수동 버튼도 이번 사이클에는 무시됨
    assert_eq!(engine.store.alert_completed(50).await, Some(true));
    assert!(engine.leg().await.is_flat());
    assert!(engine.store.orders().await.is_empty());
    assert!(!engine.port().await.controls.execute_button);
}

#[tokio::test]
async fn test_no_entry_outside_entry_window() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    let late = NaiveDate::from_ymd_opt(2024, 1, 25)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    let ctx = engine.ctx.clone().with_clock(Clock::Fixed(late));

    let mut runner = StrategyRunner::new(strategy(), ctx).await.unwrap();
    completed(runner.run().await.unwrap());

    assert!(engine.leg().await.is_flat());
    assert!(engine.store.orders().await.is_empty());
}

// ==================== 청산 ====================

#[tokio::test]
async fn test_premium_stop_loss_exit_and_settlement() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    // 손절가 100 아래
    engine.feed.set_price("NSEFO", "43001", dec!(95)).await;
    completed(engine.cycle().await);

    let exited = engine.leg().await;
    assert!(matches!(exited.state, LegState::Exited(_)));
    assert_eq!(exited.exit.executed_price, dec!(95));
    assert_eq!(exited.exit.filled_qty, 50);
    let orders = engine.store.orders().await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].side, Side::Sell);
    assert!(engine
        .log_texts()
        .await
        .iter()
        .any(|l| l.starts_with("Premium: 95 went below SL:") && l.ends_with(LEG_NAME)));

    // 다음 사이클에서 정산
    completed(engine.cycle().await);
    let settled = engine.leg().await;
    assert!(settled.is_flat());
    assert_eq!(settled.booked_pnl, dec!(-750));
    let pnl_logs: Vec<_> = engine
        .store
        .logs()
        .await
        .into_iter()
        .filter(|l| l.level == LogLevel::Pnl)
        .collect();
    assert_eq!(pnl_logs.len(), 1);
    assert!(pnl_logs[0].text.starts_with("Booked P&L: -750"));

    // 정산은 한 번만
    completed(engine.cycle().await);
    assert_eq!(engine.leg().await.booked_pnl, dec!(-750));
    assert_eq!(engine.store.orders().await.len(), 2);
}

#[tokio::test]
async fn test_running_pnl_marked_while_holding() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    engine.feed.set_price("NSEFO", "43001", dec!(114)).await;
    completed(engine.cycle().await);

    let leg = engine.leg().await;
    let position = leg.position().unwrap();
    assert_eq!(position.ltp, dec!(114));
    assert_eq!(position.running_pnl, dec!(200));
    assert_eq!(leg.total_pnl(), dec!(200));
}

#[tokio::test]
async fn test_squareoff_button_exits_and_clears() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    let mut port = engine.port().await;
    port.controls.squareoff_button = true;
    engine.store.update_port(port).await;
    completed(engine.cycle().await);

    assert!(matches!(engine.leg().await.state, LegState::Exited(_)));
    assert!(!engine.port().await.controls.squareoff_button);
    assert!(engine.log_texts().await.contains(&format!(
        "Exiting Leg#{} because Squareoff button was clicked",
        LEG_NAME
    )));

    completed(engine.cycle().await);
    let leg = engine.leg().await;
    assert!(leg.is_flat());
    assert_eq!(leg.booked_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn test_squareoff_time_exits_entered_leg() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    let closing = NaiveDate::from_ymd_opt(2024, 1, 25)
        .unwrap()
        .and_hms_opt(15, 20, 0)
        .unwrap();
    let ctx = engine.ctx.clone().with_clock(Clock::Fixed(closing));
    let mut runner = StrategyRunner::new(strategy(), ctx).await.unwrap();
    completed(runner.run().await.unwrap());

    assert!(matches!(engine.leg().await.state, LegState::Exited(_)));
    assert!(engine.log_texts().await.contains(&format!(
        "Exiting Leg#{} as Squareoff time is reached",
        LEG_NAME
    )));
}

fn exit_alert(id: i64, strike: &str) -> Alert {
    Alert {
        id,
        port_id: PORT_ID,
        kind: AlertKind::Exit,
        option_type: Some("CE".into()),
        strike: Some(strike.into()),
        expiry: Some("2024-01-25".into()),
        lots: Decimal::ONE,
    }
}

#[tokio::test]
async fn test_exit_alert_forces_exit() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    // 손절/목표 조건은 없음
    engine.store.add_alert(exit_alert(60, "22100")).await;
    completed(engine.cycle().await);

    assert_eq!(engine.store.alert_completed(60).await, Some(true));
    let exited = engine.leg().await;
    assert!(matches!(exited.state, LegState::Exited(_)));
    assert_eq!(exited.exit.executed_price, dec!(110));
    assert!(engine.log_texts().await.contains(&format!(
        "Exiting Leg#{} as Latest TV Exit Alert: 60 has come",
        LEG_NAME
    )));

    completed(engine.cycle().await);
    let leg = engine.leg().await;
    assert!(leg.is_flat());
    assert_eq!(leg.booked_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn test_exit_alert_for_other_leg_skips_stop_loss_check() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    // 손절가 100 아래지만 다른 레그를 지목한 청산 알림이 있음
    engine.feed.set_price("NSEFO", "43001", dec!(95)).await;
    engine.store.add_alert(exit_alert(61, "22200")).await;
    completed(engine.cycle().await);

    assert_eq!(engine.store.alert_completed(61).await, Some(true));
    assert!(engine.leg().await.is_entered());
    assert_eq!(engine.store.orders().await.len(), 1);
    assert!(!engine
        .log_texts()
        .await
        .iter()
        .any(|l| l.starts_with("Premium:")));

    // 알림이 소비된 다음 사이클에는 손절
    completed(engine.cycle().await);
    assert!(matches!(engine.leg().await.state, LegState::Exited(_)));
    assert_eq!(engine.store.orders().await.len(), 2);
    assert!(engine
        .log_texts()
        .await
        .iter()
        .any(|l| l.starts_with("Premium: 95 went below SL:") && l.ends_with(LEG_NAME)));
}

#[tokio::test]
async fn test_stop_button_halts_entries_and_exits() {
    let mut stopped = pressed(port(TradingMode::Paper));
    stopped.controls.stop_button = true;
    let engine = Engine::new(stopped, leg(OrderKind::Market)).await;

    completed(engine.cycle().await);
    assert!(engine.leg().await.is_flat());
    assert!(engine.store.orders().await.is_empty());

    let mut port = engine.port().await;
    port.controls.stop_button = false;
    port.controls.execute_button = true;
    port.controls.execute_button_lots = Decimal::ONE;
    engine.store.update_port(port).await;
    completed(engine.cycle().await);
    assert!(engine.leg().await.is_entered());

    // 정지 중에는 손절가를 넘어도 청산하지 않음
    let mut port = engine.port().await;
    port.controls.stop_button = true;
    engine.store.update_port(port).await;
    engine.feed.set_price("NSEFO", "43001", dec!(95)).await;
    completed(engine.cycle().await);
    assert!(engine.leg().await.is_entered());
    assert_eq!(engine.store.orders().await.len(), 1);

    let mut port = engine.port().await;
    port.controls.stop_button = false;
    engine.store.update_port(port).await;
    completed(engine.cycle().await);
    assert!(matches!(engine.leg().await.state, LegState::Exited(_)));
}

#[tokio::test]
async fn test_combined_stop_loss_reexecutes_port() {
    let mut p1 = pressed(port(TradingMode::Paper));
    p1.combined_sl = dec!(200);
    p1.to_re_execute = true;
    let engine = Engine::new(p1, leg(OrderKind::Market)).await;
    completed(engine.cycle().await);

    // 평가 손익 -250 (손절가 100은 아직 아님)
    engine.feed.set_price("NSEFO", "43001", dec!(105)).await;
    completed(engine.cycle().await);
    assert_eq!(engine.leg().await.total_pnl(), dec!(-250));

    completed(engine.cycle().await);
    let leg = engine.leg().await;
    assert!(leg.is_flat());
    assert_eq!(leg.booked_pnl, dec!(-250));
    assert!(engine.port().await.combined_exit_done);
    assert!(engine
        .log_texts()
        .await
        .iter()
        .any(|l| l.contains("went below Combined SL") && l.ends_with(", re-executing port")));

    let ports = engine.store.ports(1).await;
    assert_eq!(ports.len(), 2);
    let rex = ports.iter().find(|p| p.name == "P1_REX1").unwrap();
    assert!(rex.is_re_executed_port);

    // 복제 포트만 자동 진입, 원래 포트는 합산 청산 이후 진입하지 않음
    let outcome = engine.cycle().await;
    assert_eq!(outcome, RunOutcome::Completed { ports: 2, failed: 0 });
    let rex_legs = engine.store.get_legs(rex.id).await.unwrap();
    assert_eq!(rex_legs.len(), 1);
    assert!(rex_legs[0].is_entered());
    assert_eq!(rex_legs[0].name, LEG_NAME);
    assert!(engine.leg().await.is_flat());
    assert!(!engine.store.port(rex.id).await.unwrap().is_re_executed_port);
    assert!(engine.log_texts().await.contains(&format!(
        "Taking entry in Leg#{} as this port is re-executed",
        LEG_NAME
    )));
}

// ==================== 실거래 주문 추적 ====================

#[tokio::test]
async fn test_live_limit_entry_replaced_then_abandoned() {
    let engine = Engine::new(pressed(port(TradingMode::Live)), leg(OrderKind::Limit)).await;
    engine.broker.set_fill_mode(FillMode::Pending).await;

    completed(engine.cycle().await);
    let leg = engine.leg().await;
    assert!(leg.is_entered());
    assert_eq!(leg.entry.order_id, "1000");
    assert_eq!(leg.entry.filled_qty, 0);

    // 대기 시간 안: 유지
    completed(engine.cycle().await);
    assert!(engine.broker.cancelled_orders().await.is_empty());

    engine.age_order("1000", 60).await;
    completed(engine.cycle().await);
    let replaced = engine.leg().await;
    assert_eq!(replaced.entry.order_id, "1001");
    assert_eq!(replaced.entry.modifications, 1);
    assert_eq!(replaced.entry.order_type, OrderKind::Limit);

    engine.age_order("1001", 60).await;
    completed(engine.cycle().await);

    assert!(engine.leg().await.is_flat());
    assert_eq!(engine.broker.placed_orders().await.len(), 2);
    assert_eq!(engine.broker.cancelled_orders().await, vec!["1000", "1001"]);
    let logs = engine.log_texts().await;
    assert!(logs
        .iter()
        .any(|l| l.starts_with("Time elapsed: 60 > Max allowed time diff.: 30")));
    assert!(logs.iter().any(|l| l.starts_with(
        "No. of modifications already done: 1 exceeds Max allowed No. of modifications: 1"
    )));
}

#[tokio::test]
async fn test_live_fill_applied_from_order_book() {
    let engine = Engine::new(pressed(port(TradingMode::Live)), leg(OrderKind::Limit)).await;
    engine.broker.set_fill_mode(FillMode::Pending).await;
    completed(engine.cycle().await);

    assert!(
        engine
            .broker
            .set_order_status("1000", trader_core::BrokerOrderStatus::Execute, 50, dec!(110.5))
            .await
    );
    completed(engine.cycle().await);

    let leg = engine.leg().await;
    assert!(leg.entry.executed());
    assert_eq!(leg.entry.filled_qty, 50);
    assert_eq!(leg.entry.executed_price, dec!(110.5));
}

#[tokio::test]
async fn test_live_rejected_entry_reverts() {
    let engine = Engine::new(pressed(port(TradingMode::Live)), leg(OrderKind::Limit)).await;
    engine.broker.set_fill_mode(FillMode::RejectOnSubmit).await;

    completed(engine.cycle().await);
    assert!(engine.leg().await.is_entered());

    completed(engine.cycle().await);
    assert!(engine.leg().await.is_flat());
}

// ==================== 전략 수준 ====================

#[tokio::test]
async fn test_login_failure_then_recovery() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    engine.broker.fail_logins(1).await;

    assert_eq!(engine.cycle().await, RunOutcome::NotLoggedIn);
    assert!(engine.leg().await.is_flat());
    assert!(engine.port().await.controls.execute_button);

    completed(engine.cycle().await);
    assert!(engine.leg().await.is_entered());
}

#[tokio::test]
async fn test_order_book_failure_skips_cycle() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    engine.broker.fail_order_book(1).await;

    assert_eq!(engine.cycle().await, RunOutcome::OrderBookUnavailable);
    assert!(engine.leg().await.is_flat());
}

#[tokio::test]
async fn test_deleted_strategy_stops() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    let mut runner = StrategyRunner::new(strategy(), engine.ctx.clone()).await.unwrap();

    engine.store.remove_strategy(1).await;
    assert_eq!(runner.run().await.unwrap(), RunOutcome::Deleted);
    assert!(engine.store.orders().await.is_empty());
}

#[tokio::test]
async fn test_leg_error_is_isolated() {
    // 종목 마스터에 없는 만기
    let mut broken = leg(OrderKind::Market);
    broken.config.expiry = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let engine = Engine::new(pressed(port(TradingMode::Paper)), broken).await;

    completed(engine.cycle().await);

    assert!(engine.leg().await.is_flat());
    assert!(engine.store.logs().await.iter().any(|l| l.level == LogLevel::Error
        && l.text.ends_with(&format!("came while evaluating Leg#{}", LEG_NAME))));
}

// ==================== 스케줄러 ====================

#[tokio::test]
async fn test_scheduler_cycle_stats() {
    let engine = Engine::new(pressed(port(TradingMode::Paper)), leg(OrderKind::Market)).await;
    let scheduler = Scheduler::new(engine.ctx.clone());

    let stats = scheduler.run_cycle().await.unwrap();
    assert_eq!(stats.strategies, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed_ports, 0);
    assert!(engine.leg().await.is_entered());
}

#[tokio::test]
async fn test_scheduler_stops_on_shutdown() {
    let engine = Engine::new(port(TradingMode::Paper), leg(OrderKind::Market)).await;
    assert!(engine.ctx.accounts.ensure_logged_in(&strategy()).await);

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    Scheduler::new(engine.ctx.clone()).run(shutdown).await;

    assert!(engine.ctx.accounts.session(1).await.is_err());
}
