//! 단위 테스트 공용 픽스처.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use trader_core::{
    Account, InstrumentType, Leg, LegConfig, LegState, OrderKind, OrderTicket, Port, PortControls,
    PortSchedule, RiskThreshold, Scrip, ScripType, SessionConfig, Side, SlBasis, Strategy,
    TradingMode,
};
use trader_data::{EngineStore, MemoryStore};
use trader_exchange::{parse_master_csv, PaperBroker, PaperConnector, PaperFeed};

use crate::account_manager::AccountManager;
use crate::journal::Journal;

pub(crate) const CONTRACTS: &str = "\
26000,26000,Nifty 50,Nifty 50,21950.5,,0,0.05,1,,INDEX,NSECM
43001,43001,NIFTY,NIFTY 25JAN24 22100 CE,110,2024-01-25,22100,0.05,50,CE,OPTIDX,NSEFO
43002,43002,NIFTY,NIFTY 25JAN24 21900 PE,95,2024-01-25,21900,0.05,50,PE,OPTIDX,NSEFO
";

pub(crate) fn account() -> Account {
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

pub(crate) fn strategy() -> Strategy {
    Strategy {
        id: 1,
        user_id: 1,
        account_id: 1,
        name: "straddle".into(),
        lots_multiplier: Decimal::ONE,
    }
}

pub(crate) fn port(mode: TradingMode) -> Port {
    let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    Port {
        id: 7,
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

pub(crate) fn leg(order_type: OrderKind) -> Leg {
    Leg {
        id: 21,
        port_id: 7,
        name: "P1-CE-22100-2024-01-25".into(),
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

pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig {
        price_poll_attempts: 3,
        price_poll_interval_ms: 1,
        login_retry_delay_secs: 0,
        error_backoff_ms: 0,
        ..SessionConfig::default()
    }
}

pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub broker: PaperBroker,
    pub journal: Journal,
    pub accounts: Arc<AccountManager>,
}

impl Fixture {
    pub fn shared_store(&self) -> Arc<dyn EngineStore> {
        Arc::new(self.store.clone())
    }
}

/// 시세가 설정되고 로그인까지 마친 픽스처.
pub(crate) async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    store.add_account(&account()).await;
    store.add_strategy(strategy()).await;

    let broker = PaperBroker::new(parse_master_csv(CONTRACTS).unwrap());
    let feed = PaperFeed::new();
    feed.set_price("NSECM", "26000", dec!(22012)).await;
    feed.set_price("NSEFO", "43001", dec!(110)).await;

    let shared: Arc<dyn EngineStore> = Arc::new(store.clone());
    let journal = Journal::new(shared.clone());
    let accounts = Arc::new(AccountManager::new(
        shared,
        Arc::new(PaperConnector::new(broker.clone(), feed)),
        journal.clone(),
        fast_config(),
    ));
    assert!(accounts.ensure_logged_in(&strategy()).await);

    Fixture {
        store,
        broker,
        journal,
        accounts,
    }
}
