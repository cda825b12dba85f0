//! 포트(Port) 도메인 모델.
//!
//! 포트는 손익 한도와 거래 모드를 공유하는 레그 묶음입니다.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::scrip::{Scrip, ScripType};
use crate::error::TraderError;

/// 거래 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    /// 실거래 (브로커 주문)
    Live,
    /// 모의거래 (주문 즉시 체결로 합성)
    Paper,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Live => write!(f, "Live"),
            TradingMode::Paper => write!(f, "Paper"),
        }
    }
}

impl FromStr for TradingMode {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(TradingMode::Live),
            "paper" => Ok(TradingMode::Paper),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 거래 모드: {}", s))),
        }
    }
}

/// 포트의 하루 일정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSchedule {
    /// 평가 시작 시각
    pub start: NaiveTime,
    /// 신규 진입 마감 시각
    pub stop: NaiveTime,
    /// 강제 청산 시각
    pub squareoff: NaiveTime,
}

/// 주어진 시각에서 포트가 처한 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPhase {
    /// 시작 전
    Idle,
    /// 거래 중. `entries_open`이면 신규 진입 가능
    Trading { entries_open: bool },
    /// 청산 시각 이후
    SquareOff,
}

impl PortSchedule {
    pub fn phase(&self, now: NaiveTime) -> PortPhase {
        if now >= self.squareoff {
            PortPhase::SquareOff
        } else if now >= self.start {
            PortPhase::Trading {
                entries_open: now <= self.stop,
            }
        } else {
            PortPhase::Idle
        }
    }
}

/// 운영자 수동 버튼.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortControls {
    /// 즉시 진입 (한 사이클만 유효)
    pub execute_button: bool,
    /// 즉시 진입 로트 승수
    pub execute_button_lots: Decimal,
    /// 즉시 전량 청산
    pub squareoff_button: bool,
    /// 평가 중지
    pub stop_button: bool,
}

/// 포트 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub strategy_id: i64,
    pub name: String,
    pub scrip: Scrip,
    pub scrip_type: ScripType,
    pub trading_mode: TradingMode,
    pub schedule: PortSchedule,
    /// 합산 손절 (0이면 비활성)
    pub combined_sl: Decimal,
    /// 합산 목표 (0이면 비활성)
    pub combined_target: Decimal,
    /// 합산 청산 후 재실행 여부
    pub to_re_execute: bool,
    /// 재실행 포트의 자동 진입 로트 승수
    pub lots_multiplier_set: Decimal,
    /// 재실행으로 생성된 포트인지 여부
    pub is_re_executed_port: bool,
    /// 합산 청산 발동 여부 (한 번 true면 이 포트에서 되돌리지 않음)
    pub combined_exit_done: bool,
    pub controls: PortControls,
}

/// 합산 손익 한도 돌파.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedBreach {
    StopLoss { pnl: Decimal, limit: Decimal },
    Target { pnl: Decimal, limit: Decimal },
}

impl fmt::Display for CombinedBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinedBreach::StopLoss { pnl, limit } => {
                write!(f, "Combined P&L: {} went below Combined SL: {}", pnl, limit)
            }
            CombinedBreach::Target { pnl, limit } => {
                write!(f, "Combined P&L: {} went above Combined Target: {}", pnl, limit)
            }
        }
    }
}

impl Port {
    /// 합산 손익이 한도를 넘었는지 확인합니다.
    pub fn combined_breach(&self, combined_pnl: Decimal) -> Option<CombinedBreach> {
        let pnl = combined_pnl.round_dp(2);
        if !self.combined_sl.is_zero() && pnl <= -self.combined_sl {
            Some(CombinedBreach::StopLoss {
                pnl,
                limit: -self.combined_sl,
            })
        } else if !self.combined_target.is_zero() && pnl >= self.combined_target {
            Some(CombinedBreach::Target {
                pnl,
                limit: self.combined_target,
            })
        } else {
            None
        }
    }
}

/// 엔진이 포트에 기록하는 플래그 변경.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortFlagUpdate {
    /// 즉시 진입 버튼과 로트를 초기화
    ClearExecuteButton,
    /// 즉시 청산 버튼 초기화
    ClearSquareoffButton,
    /// 합산 청산 발동 기록
    MarkCombinedExitDone,
    /// 재실행 포트의 자동 진입 소진
    ClearReExecuted,
}
