//! 데이터베이스 레코드와 도메인 타입 변환.
//!
//! 테이블 컬럼은 운영 웹앱과 공유하므로 이름을 그대로 따릅니다.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use trader_core::{
    Account, Alert, BrokerOrderStatus, Leg, LegConfig, LegState, OrderKind, OrderTicket, Port,
    PortControls, PortSchedule, Position, Strategy, TraderError, User,
};

use crate::error::{DataError, Result};

fn parse_or_default<T>(value: &str) -> std::result::Result<T, TraderError>
where
    T: FromStr<Err = TraderError> + Default,
{
    if value.trim().is_empty() {
        Ok(T::default())
    } else {
        value.parse()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 사용자 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            username: record.username,
        }
    }
}

/// 전략 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct StrategyRecord {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub account_id: i64,
    pub lots_multiplier: Decimal,
}

impl From<StrategyRecord> for Strategy {
    fn from(record: StrategyRecord) -> Self {
        Strategy {
            id: record.id,
            user_id: record.user_id,
            account_id: record.account_id,
            name: record.name,
            lots_multiplier: record.lots_multiplier,
        }
    }
}

/// 계좌 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRecord {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    pub root_url: String,
    pub ws_root_url: String,
    pub lots_multiplier: Decimal,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account {
            id: record.id,
            name: record.name,
            api_key: record.api_key,
            api_secret: SecretString::from(record.api_secret),
            root_url: record.root_url,
            ws_root_url: record.ws_root_url,
            lots_multiplier: record.lots_multiplier,
        }
    }
}

impl From<&Account> for AccountRecord {
    fn from(account: &Account) -> Self {
        AccountRecord {
            id: account.id,
            name: account.name.clone(),
            api_key: account.api_key.clone(),
            api_secret: account.api_secret.expose_secret().to_string(),
            root_url: account.root_url.clone(),
            ws_root_url: account.ws_root_url.clone(),
            lots_multiplier: account.lots_multiplier,
        }
    }
}

/// 포트 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct PortRecord {
    pub id: i64,
    pub name: String,
    pub strategy_id: i64,
    pub scrip: String,
    pub scrip_type: String,
    pub start_time: NaiveTime,
    pub stop_time: NaiveTime,
    pub squareoff_time: NaiveTime,
    pub combined_sl: Decimal,
    pub combined_target: Decimal,
    pub to_re_execute: bool,
    pub trading_mode: String,
    pub lots_multiplier_set: Decimal,
    pub is_re_executed_port: bool,
    pub execute_button: bool,
    pub execute_button_lots: Decimal,
    pub squareoff_button: bool,
    pub stop_button: bool,
    pub combined_exit_done: bool,
}

impl TryFrom<PortRecord> for Port {
    type Error = DataError;

    fn try_from(record: PortRecord) -> Result<Self> {
        Ok(Port {
            id: record.id,
            strategy_id: record.strategy_id,
            name: record.name,
            scrip: record.scrip.parse()?,
            scrip_type: record.scrip_type.parse()?,
            trading_mode: record.trading_mode.parse()?,
            schedule: PortSchedule {
                start: record.start_time,
                stop: record.stop_time,
                squareoff: record.squareoff_time,
            },
            combined_sl: record.combined_sl,
            combined_target: record.combined_target,
            to_re_execute: record.to_re_execute,
            lots_multiplier_set: record.lots_multiplier_set,
            is_re_executed_port: record.is_re_executed_port,
            combined_exit_done: record.combined_exit_done,
            controls: PortControls {
                execute_button: record.execute_button,
                execute_button_lots: record.execute_button_lots,
                squareoff_button: record.squareoff_button,
                stop_button: record.stop_button,
            },
        })
    }
}

/// 레그 레코드 (설정 + 실행 상태).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LegRecord {
    pub id: i64,
    pub name: String,
    pub port_id: i64,
    pub lots: i64,
    pub ins_type: String,
    pub strike_distance: i64,
    pub expiry: NaiveDate,
    pub trade_type: String,
    pub order_type: String,
    pub limit_pct: Decimal,
    pub num_modifications: i32,
    pub modification_wait_time: f64,
    pub sl_on: String,
    pub sl: String,
    pub target: String,
    pub status: String,
    pub entered_ins: String,
    pub entered_token: String,
    pub entered_strike: Decimal,
    pub entered_underlying_price: Decimal,
    pub ltp: Decimal,
    pub running_pnl: Decimal,
    pub booked_pnl: Decimal,
    pub entry_order_id: String,
    pub exit_order_id: String,
    pub entry_order_type: String,
    pub exit_order_type: String,
    pub entry_order_message: String,
    pub exit_order_message: String,
    pub entry_order_status: String,
    pub exit_order_status: String,
    pub entry_num_modifications_done: i32,
    pub exit_num_modifications_done: i32,
    pub entry_filled_qty: i64,
    pub exit_filled_qty: i64,
    pub entry_executed_price: Decimal,
    pub exit_executed_price: Decimal,
    pub lots_multiplier_set: Decimal,
}

fn ticket(
    order_id: String,
    order_type: &str,
    message: String,
    status: String,
    filled_qty: i64,
    executed_price: Decimal,
    modifications: i32,
) -> std::result::Result<OrderTicket, TraderError> {
    Ok(OrderTicket {
        order_id,
        order_type: parse_or_default::<OrderKind>(order_type)?,
        message,
        status: BrokerOrderStatus::from(status),
        filled_qty,
        executed_price,
        modifications: modifications.max(0) as u32,
    })
}

impl TryFrom<LegRecord> for Leg {
    type Error = DataError;

    fn try_from(r: LegRecord) -> Result<Self> {
        let config = LegConfig {
            lots: r.lots,
            instrument_type: r.ins_type.parse()?,
            strike_distance: r.strike_distance,
            expiry: r.expiry,
            side: r.trade_type.parse()?,
            order_type: parse_or_default(&r.order_type)?,
            limit_pct: r.limit_pct,
            max_modifications: r.num_modifications.max(0) as u32,
            modification_wait: Duration::try_from_secs_f64(r.modification_wait_time.max(0.0))
                .unwrap_or_default(),
            sl_on: parse_or_default(&r.sl_on)?,
            stop_loss: r.sl.parse()?,
            target: r.target.parse()?,
        };

        let position = Position {
            instrument: r.entered_ins,
            token: r.entered_token,
            strike: r.entered_strike,
            underlying_price: r.entered_underlying_price,
            ltp: r.ltp,
            running_pnl: r.running_pnl,
        };
        let state = match r.status.trim() {
            "" | "no_position" => LegState::NoPosition,
            "entered" => LegState::Entered(position),
            "exited" => LegState::Exited(position),
            other => {
                return Err(DataError::InvalidData(format!(
                    "leg #{} has unknown status '{}'",
                    r.id, other
                )))
            }
        };

        Ok(Leg {
            id: r.id,
            port_id: r.port_id,
            name: r.name,
            config,
            state,
            entry: ticket(
                r.entry_order_id,
                &r.entry_order_type,
                r.entry_order_message,
                r.entry_order_status,
                r.entry_filled_qty,
                r.entry_executed_price,
                r.entry_num_modifications_done,
            )?,
            exit: ticket(
                r.exit_order_id,
                &r.exit_order_type,
                r.exit_order_message,
                r.exit_order_status,
                r.exit_filled_qty,
                r.exit_executed_price,
                r.exit_num_modifications_done,
            )?,
            booked_pnl: r.booked_pnl,
            lots_multiplier_set: r.lots_multiplier_set,
        })
    }
}

impl From<&Leg> for LegRecord {
    fn from(leg: &Leg) -> Self {
        let position = leg.position().cloned().unwrap_or_default();
        let config = &leg.config;
        LegRecord {
            id: leg.id,
            name: leg.name.clone(),
            port_id: leg.port_id,
            lots: config.lots,
            ins_type: config.instrument_type.to_string(),
            strike_distance: config.strike_distance,
            expiry: config.expiry,
            trade_type: config.side.to_string(),
            order_type: config.order_type.to_string(),
            limit_pct: config.limit_pct,
            num_modifications: config.max_modifications as i32,
            modification_wait_time: config.modification_wait.as_secs_f64(),
            sl_on: config.sl_on.to_string(),
            sl: threshold_text(&config.stop_loss),
            target: threshold_text(&config.target),
            status: leg.state.name().to_string(),
            entered_ins: position.instrument,
            entered_token: position.token,
            entered_strike: position.strike,
            entered_underlying_price: position.underlying_price,
            ltp: position.ltp,
            running_pnl: position.running_pnl,
            booked_pnl: leg.booked_pnl,
            entry_order_id: leg.entry.order_id.clone(),
            exit_order_id: leg.exit.order_id.clone(),
            entry_order_type: leg.entry.order_type.to_string(),
            exit_order_type: leg.exit.order_type.to_string(),
            entry_order_message: leg.entry.message.clone(),
            exit_order_message: leg.exit.message.clone(),
            entry_order_status: leg.entry.status.to_string(),
            exit_order_status: leg.exit.status.to_string(),
            entry_num_modifications_done: leg.entry.modifications as i32,
            exit_num_modifications_done: leg.exit.modifications as i32,
            entry_filled_qty: leg.entry.filled_qty,
            exit_filled_qty: leg.exit.filled_qty,
            entry_executed_price: leg.entry.executed_price,
            exit_executed_price: leg.exit.executed_price,
            lots_multiplier_set: leg.lots_multiplier_set,
        }
    }
}

/// 0 포인트는 빈 문자열(비활성)로 저장합니다.
fn threshold_text(threshold: &trader_core::RiskThreshold) -> String {
    match threshold {
        trader_core::RiskThreshold::Points(points) if points.is_zero() => String::new(),
        other => other.to_string(),
    }
}

/// 알림 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct AlertRecord {
    pub id: i64,
    pub port_id: i64,
    #[sqlx(rename = "type")]
    pub alert_type: String,
    #[sqlx(rename = "TYPE")]
    pub option_type: Option<String>,
    #[sqlx(rename = "STRIKE")]
    pub strike: Option<String>,
    #[sqlx(rename = "EXPIRY")]
    pub expiry: Option<String>,
    pub lots: Decimal,
    pub status: String,
}

impl TryFrom<AlertRecord> for Alert {
    type Error = DataError;

    fn try_from(record: AlertRecord) -> Result<Self> {
        Ok(Alert {
            id: record.id,
            port_id: record.port_id,
            kind: record.alert_type.parse()?,
            option_type: non_empty(record.option_type),
            strike: non_empty(record.strike),
            expiry: non_empty(record.expiry),
            lots: record.lots,
        })
    }
}

/// 재실행 포트로 복제한 포트 (ID는 저장소가 정함).
pub fn cloned_port(port: &Port, new_name: &str, strategy_id: i64) -> Port {
    Port {
        id: 0,
        strategy_id,
        name: new_name.to_string(),
        is_re_executed_port: true,
        combined_exit_done: false,
        controls: PortControls::default(),
        ..port.clone()
    }
}

/// 복제 포트의 레그. 설정만 유지하고 실행 상태는 비웁니다.
pub fn cloned_leg(leg: &Leg, port_id: i64) -> Leg {
    Leg {
        id: 0,
        port_id,
        name: leg.name.clone(),
        config: leg.config.clone(),
        state: LegState::NoPosition,
        entry: OrderTicket::default(),
        exit: OrderTicket::default(),
        booked_pnl: Decimal::ZERO,
        lots_multiplier_set: Decimal::ONE,
    }
}
