//! 레그(Leg) 도메인 모델과 상태 머신.
//!
//! 레그는 포트 안에서 독립적으로 진입/청산되는 옵션·선물 슬롯입니다.
//! 실행 상태는 [`LegState`]로 명시하며, 모든 상태 변경은 전이 메서드를 통해서만 일어납니다.
//!
//! ```text
//! NoPosition ──enter──▶ Entered ──exit──▶ Exited ──settle──▶ NoPosition
//!      ▲                   │  ▲               │
//!      └───revert_entry────┘  └──revert_exit──┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::calculations::position_pnl;
use super::order::{OrderKind, OrderSnapshot, OrderTicket, Side};
use crate::error::{LegTransitionError, TraderError};

/// 레그 상품 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentType {
    /// 콜 옵션
    Ce,
    /// 풋 옵션
    Pe,
    /// 선물
    Fut,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Ce => "CE",
            InstrumentType::Pe => "PE",
            InstrumentType::Fut => "FUT",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentType {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CE" => Ok(InstrumentType::Ce),
            "PE" => Ok(InstrumentType::Pe),
            "FUT" => Ok(InstrumentType::Fut),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 상품 유형: {}", s))),
        }
    }
}

/// 손절 기준 가격.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlBasis {
    /// 진입 체결가 기준
    #[default]
    Premium,
    /// 진입 시점 기초자산 가격 기준
    Underlying,
}

impl fmt::Display for SlBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlBasis::Premium => write!(f, "PREMIUM"),
            SlBasis::Underlying => write!(f, "UNDERLYING"),
        }
    }
}

impl FromStr for SlBasis {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PREMIUM" => Ok(SlBasis::Premium),
            "UNDERLYING" => Ok(SlBasis::Underlying),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 손절 기준: {}", s))),
        }
    }
}

/// 손절/목표 임계값. 절대 포인트 또는 기준가 대비 퍼센트.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskThreshold {
    Points(Decimal),
    Percent(Decimal),
}

impl Default for RiskThreshold {
    fn default() -> Self {
        RiskThreshold::Points(Decimal::ZERO)
    }
}

impl RiskThreshold {
    /// 기준가에 대한 포인트 값. 0이면 비활성입니다.
    pub fn points(&self, base: Decimal) -> Decimal {
        match self {
            RiskThreshold::Points(points) => points.round_dp(2),
            RiskThreshold::Percent(pct) => {
                let ratio = (*pct / Decimal::ONE_HUNDRED).round_dp(2);
                (base * ratio).round_dp(2)
            }
        }
    }
}

impl FromStr for RiskThreshold {
    type Err = TraderError;

    /// `"10"`, `"12.5"`, `"10%"`, `" 5 % "`를 받습니다. 빈 문자열은 0 포인트입니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(RiskThreshold::default());
        }
        let invalid = |_| TraderError::InvalidInput(format!("잘못된 손절/목표 값: {}", s));
        match trimmed.strip_suffix('%') {
            Some(pct) => pct
                .trim()
                .parse::<Decimal>()
                .map(RiskThreshold::Percent)
                .map_err(invalid),
            None => trimmed
                .parse::<Decimal>()
                .map(RiskThreshold::Points)
                .map_err(invalid),
        }
    }
}

impl fmt::Display for RiskThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskThreshold::Points(points) => write!(f, "{}", points),
            RiskThreshold::Percent(pct) => write!(f, "{}%", pct),
        }
    }
}

/// 포지션 방향성.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// 상품 유형 × 매매 방향으로 방향성을 정합니다.
    ///
    /// FUT/CE 매수와 PE 매도는 상승, FUT/CE 매도와 PE 매수는 하락입니다.
    pub fn of(instrument: InstrumentType, side: Side) -> Self {
        match (instrument, side) {
            (InstrumentType::Fut | InstrumentType::Ce, Side::Buy) => Direction::Bullish,
            (InstrumentType::Fut | InstrumentType::Ce, Side::Sell) => Direction::Bearish,
            (InstrumentType::Pe, Side::Buy) => Direction::Bearish,
            (InstrumentType::Pe, Side::Sell) => Direction::Bullish,
        }
    }
}

/// 레그 설정 (외부에서 구성되며 엔진은 읽기만 함).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegConfig {
    /// 기본 로트 수
    pub lots: i64,
    /// 상품 유형
    pub instrument_type: InstrumentType,
    /// ATM에서 떨어진 행사가 간격 수
    pub strike_distance: i64,
    /// 만기일
    pub expiry: NaiveDate,
    /// 매매 방향
    pub side: Side,
    /// 기본 주문 유형
    pub order_type: OrderKind,
    /// 지정가 산출 퍼센트
    pub limit_pct: Decimal,
    /// 최대 재주문 횟수
    pub max_modifications: u32,
    /// 지정가 재주문 대기 시간
    pub modification_wait: Duration,
    /// 손절 기준
    pub sl_on: SlBasis,
    /// 손절
    pub stop_loss: RiskThreshold,
    /// 목표
    pub target: RiskThreshold,
}

/// 진입 후 보유 중인 포지션 정보.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 종목 설명 (주문에 사용)
    pub instrument: String,
    /// 종목 토큰 (시세/주문 키)
    pub token: String,
    /// 행사가 (선물은 0)
    pub strike: Decimal,
    /// 진입 시점 기초자산 가격
    pub underlying_price: Decimal,
    /// 최근 평가 가격
    pub ltp: Decimal,
    /// 평가 손익
    pub running_pnl: Decimal,
}

impl Position {
    pub fn new(
        instrument: impl Into<String>,
        token: impl Into<String>,
        strike: Decimal,
        underlying_price: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            token: token.into(),
            strike,
            underlying_price,
            ltp: Decimal::ZERO,
            running_pnl: Decimal::ZERO,
        }
    }
}

/// 레그 실행 상태.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum LegState {
    /// 포지션 없음
    #[default]
    NoPosition,
    /// 진입 주문 제출 (체결 여부는 진입 장부가 결정)
    Entered(Position),
    /// 청산 주문 제출 (체결 여부는 청산 장부가 결정)
    Exited(Position),
}

impl LegState {
    pub fn name(&self) -> &'static str {
        match self {
            LegState::NoPosition => "no_position",
            LegState::Entered(_) => "entered",
            LegState::Exited(_) => "exited",
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            LegState::NoPosition => None,
            LegState::Entered(position) | LegState::Exited(position) => Some(position),
        }
    }
}

/// 레그 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub id: i64,
    pub port_id: i64,
    /// `{포트}-{유형}-{행사가}-{만기}` 형태의 이름
    pub name: String,
    pub config: LegConfig,
    pub state: LegState,
    /// 마지막 진입 주문 장부
    pub entry: OrderTicket,
    /// 마지막 청산 주문 장부
    pub exit: OrderTicket,
    /// 누적 실현 손익
    pub booked_pnl: Decimal,
    /// 마지막 신규 진입 때 적용된 로트 승수
    pub lots_multiplier_set: Decimal,
}

impl Leg {
    fn refuse(&self, action: &'static str) -> LegTransitionError {
        LegTransitionError {
            leg_id: self.id,
            from: self.state.name(),
            action,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, LegState::NoPosition)
    }

    pub fn is_entered(&self) -> bool {
        matches!(self.state, LegState::Entered(_))
    }

    pub fn position(&self) -> Option<&Position> {
        self.state.position()
    }

    /// 진입 주문이 제출 성공 + 체결된 보유 상태인지 확인합니다.
    pub fn is_filled_entry(&self) -> bool {
        self.is_entered() && self.entry.executed()
    }

    /// 청산 주문이 체결되어 정산까지 끝난 상태인지 확인합니다.
    pub fn is_filled_exit(&self) -> bool {
        self.is_flat() && self.exit.executed()
    }

    /// 평가 손익 + 실현 손익.
    pub fn total_pnl(&self) -> Decimal {
        let running = self.position().map(|p| p.running_pnl).unwrap_or_default();
        running + self.booked_pnl
    }

    /// 신규 진입: `NoPosition → Entered`.
    pub fn enter(
        &mut self,
        position: Position,
        mut ticket: OrderTicket,
        lots_multiplier: Decimal,
    ) -> Result<(), LegTransitionError> {
        if !self.is_flat() {
            return Err(self.refuse("enter"));
        }
        ticket.modifications = 0;
        self.entry = ticket;
        self.lots_multiplier_set = lots_multiplier;
        self.state = LegState::Entered(position);
        Ok(())
    }

    /// 진입 지정가 재주문: `Entered → Entered`, 재주문 횟수 +1.
    pub fn replace_entry(
        &mut self,
        position: Position,
        mut ticket: OrderTicket,
    ) -> Result<(), LegTransitionError> {
        if !self.is_entered() {
            return Err(self.refuse("replace entry"));
        }
        ticket.modifications = self.entry.modifications + 1;
        self.entry = ticket;
        self.state = LegState::Entered(position);
        Ok(())
    }

    /// 청산 주문: `Entered → Exited`.
    pub fn exit(&mut self, mut ticket: OrderTicket) -> Result<(), LegTransitionError> {
        let LegState::Entered(position) = &self.state else {
            return Err(self.refuse("exit"));
        };
        ticket.modifications = 0;
        self.state = LegState::Exited(position.clone());
        self.exit = ticket;
        Ok(())
    }

    /// 청산 지정가 재주문: `Exited → Exited`, 재주문 횟수 +1.
    pub fn replace_exit(&mut self, mut ticket: OrderTicket) -> Result<(), LegTransitionError> {
        if !matches!(self.state, LegState::Exited(_)) {
            return Err(self.refuse("replace exit"));
        }
        ticket.modifications = self.exit.modifications + 1;
        self.exit = ticket;
        Ok(())
    }

    /// 진입 거절/실패 되돌리기: `Entered → NoPosition`.
    pub fn revert_entry(&mut self) -> Result<(), LegTransitionError> {
        if !self.is_entered() {
            return Err(self.refuse("revert entry"));
        }
        self.state = LegState::NoPosition;
        Ok(())
    }

    /// 청산 거절/실패 되돌리기: `Exited → Entered`.
    pub fn revert_exit(&mut self) -> Result<(), LegTransitionError> {
        let LegState::Exited(position) = &self.state else {
            return Err(self.refuse("revert exit"));
        };
        self.state = LegState::Entered(position.clone());
        Ok(())
    }

    /// 청산 체결 정산: `Exited → NoPosition`.
    ///
    /// 청산 체결 수량 기준 실현 손익을 누적하고 그 값을 반환합니다.
    pub fn settle_exit(&mut self, multiplier: Decimal) -> Result<Decimal, LegTransitionError> {
        if !matches!(self.state, LegState::Exited(_)) {
            return Err(self.refuse("settle exit"));
        }
        let pnl = position_pnl(
            self.config.side,
            self.entry.executed_price,
            self.exit.executed_price,
            self.exit.filled_qty,
            multiplier,
        );
        self.booked_pnl = (self.booked_pnl + pnl).round_dp(2);
        self.state = LegState::NoPosition;
        Ok(pnl)
    }

    /// 보유 중 평가 가격과 평가 손익을 갱신합니다.
    pub fn mark(&mut self, ltp: Decimal, multiplier: Decimal) -> Result<Decimal, LegTransitionError> {
        let side = self.config.side;
        let entry_price = self.entry.executed_price;
        let qty = self.entry.filled_qty;
        let refused = self.refuse("mark");
        let LegState::Entered(position) = &mut self.state else {
            return Err(refused);
        };
        let pnl = position_pnl(side, entry_price, ltp, qty, multiplier);
        position.ltp = ltp;
        position.running_pnl = pnl;
        Ok(pnl)
    }

    /// 진입 주문장 스냅샷 반영.
    pub fn apply_entry_snapshot(&mut self, snapshot: &OrderSnapshot) {
        self.entry.apply_snapshot(snapshot);
    }

    /// 청산 주문장 스냅샷 반영.
    pub fn apply_exit_snapshot(&mut self, snapshot: &OrderSnapshot) {
        self.exit.apply_snapshot(snapshot);
    }

    /// 손절 기준가와 손절 포인트.
    pub fn stop_loss_levels(&self) -> (Decimal, Decimal) {
        let base = match self.config.sl_on {
            SlBasis::Premium => self.entry.executed_price,
            SlBasis::Underlying => self
                .position()
                .map(|p| p.underlying_price)
                .unwrap_or_default(),
        };
        (base, self.config.stop_loss.points(base))
    }

    /// 목표 기준가(항상 진입 체결가)와 목표 포인트.
    pub fn target_levels(&self) -> (Decimal, Decimal) {
        let base = self.entry.executed_price;
        (base, self.config.target.points(base))
    }

    /// 현재 가격으로 손절/목표 청산 조건을 평가합니다.
    ///
    /// 기준 가격을 넘어선 경우에만 발동하며 같은 값은 유지입니다.
    /// 목표는 항상 프리미엄 기준이며, 기초자산 기준 손절은 [`Direction`]으로 방향을 정합니다.
    pub fn check_exit(&self, ltp: Decimal, underlying_ltp: Decimal) -> Option<ExitTrigger> {
        let (sl_base, sl) = self.stop_loss_levels();
        let (tp_base, target) = self.target_levels();
        let premium_sl = !sl.is_zero() && self.config.sl_on == SlBasis::Premium;

        let mut trigger = match self.config.side {
            Side::Buy if premium_sl && ltp < sl_base - sl => Some(ExitTrigger::PremiumStopLoss {
                price: ltp,
                level: sl_base - sl,
            }),
            Side::Buy if !target.is_zero() && ltp > tp_base + target => {
                Some(ExitTrigger::Target {
                    price: ltp,
                    level: tp_base + target,
                })
            }
            Side::Sell if premium_sl && ltp > sl_base + sl => Some(ExitTrigger::PremiumStopLoss {
                price: ltp,
                level: sl_base + sl,
            }),
            Side::Sell if !target.is_zero() && ltp < tp_base - target => {
                Some(ExitTrigger::Target {
                    price: ltp,
                    level: tp_base - target,
                })
            }
            _ => None,
        };

        if self.config.sl_on == SlBasis::Underlying && !sl.is_zero() {
            let direction = Direction::of(self.config.instrument_type, self.config.side);
            let breached = match direction {
                Direction::Bullish if underlying_ltp < sl_base - sl => Some(sl_base - sl),
                Direction::Bearish if underlying_ltp > sl_base + sl => Some(sl_base + sl),
                _ => None,
            };
            if let Some(level) = breached {
                trigger = Some(ExitTrigger::UnderlyingStopLoss {
                    price: underlying_ltp,
                    level,
                    direction,
                });
            }
        }

        trigger
    }
}

/// 손절/목표 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    PremiumStopLoss { price: Decimal, level: Decimal },
    Target { price: Decimal, level: Decimal },
    UnderlyingStopLoss {
        price: Decimal,
        level: Decimal,
        direction: Direction,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::BrokerOrderStatus;
    use rust_decimal_macros::dec;

    fn sample_leg(side: Side, instrument: InstrumentType) -> Leg {
        Leg {
            id: 1,
            port_id: 10,
            name: "PORT1-CE-48500-2024-01-25".to_string(),
            config: LegConfig {
                lots: 1,
                instrument_type: instrument,
                strike_distance: 0,
                expiry: NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
                side,
                order_type: OrderKind::Market,
                limit_pct: dec!(1),
                max_modifications: 3,
                modification_wait: Duration::from_secs(30),
                sl_on: SlBasis::Premium,
                stop_loss: RiskThreshold::Points(dec!(10)),
                target: RiskThreshold::Points(Decimal::ZERO),
            },
            state: LegState::NoPosition,
            entry: OrderTicket::default(),
            exit: OrderTicket::default(),
            booked_pnl: Decimal::ZERO,
            lots_multiplier_set: Decimal::ONE,
        }
    }

    fn filled(price: Decimal, qty: i64) -> OrderTicket {
        OrderTicket {
            order_id: "1".to_string(),
            order_type: OrderKind::Market,
            message: "sucess".to_string(),
            status: BrokerOrderStatus::Execute,
            filled_qty: qty,
            executed_price: price,
            modifications: 0,
        }
    }

    fn entered(side: Side, entry_price: Decimal) -> Leg {
        let mut leg = sample_leg(side, InstrumentType::Ce);
        leg.enter(
            Position::new("NIFTY 25JAN 48500 CE", "4411", dec!(48500), dec!(48470)),
            filled(entry_price, 50),
            Decimal::ONE,
        )
        .unwrap();
        leg
    }

    #[test]
    fn test_risk_threshold_parse() {
        assert_eq!("10".parse::<RiskThreshold>().unwrap(), RiskThreshold::Points(dec!(10)));
        assert_eq!(
            " 10 % ".parse::<RiskThreshold>().unwrap(),
            RiskThreshold::Percent(dec!(10))
        );
        assert_eq!("".parse::<RiskThreshold>().unwrap(), RiskThreshold::default());
        assert!("ten".parse::<RiskThreshold>().is_err());
    }

    #[test]
    fn test_risk_threshold_points() {
        assert_eq!(RiskThreshold::Percent(dec!(10)).points(dec!(100)), dec!(10));
        // 비율을 먼저 소수 둘째 자리로 반올림: 12.5% → 0.12
        assert_eq!(RiskThreshold::Percent(dec!(12.5)).points(dec!(200)), dec!(24));
        assert_eq!(RiskThreshold::Points(dec!(7.456)).points(dec!(999)), dec!(7.46));
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::of(InstrumentType::Fut, Side::Buy), Direction::Bullish);
        assert_eq!(Direction::of(InstrumentType::Ce, Side::Sell), Direction::Bearish);
        assert_eq!(Direction::of(InstrumentType::Pe, Side::Buy), Direction::Bearish);
        assert_eq!(Direction::of(InstrumentType::Pe, Side::Sell), Direction::Bullish);
    }

    #[test]
    fn test_buy_premium_stop_loss() {
        let leg = entered(Side::Buy, dec!(100));
        assert!(matches!(
            leg.check_exit(dec!(89), dec!(0)),
            Some(ExitTrigger::PremiumStopLoss { .. })
        ));
        assert_eq!(leg.check_exit(dec!(90), dec!(0)), None);
    }

    #[test]
    fn test_sell_percent_stop_loss() {
        let mut leg = entered(Side::Sell, dec!(100));
        leg.config.stop_loss = RiskThreshold::Percent(dec!(10));
        assert_eq!(
            leg.check_exit(dec!(111), dec!(0)),
            Some(ExitTrigger::PremiumStopLoss {
                price: dec!(111),
                level: dec!(110)
            })
        );
        assert_eq!(leg.check_exit(dec!(109), dec!(0)), None);
    }

    #[test]
    fn test_target_applies_with_underlying_stop() {
        let mut leg = entered(Side::Buy, dec!(100));
        leg.config.sl_on = SlBasis::Underlying;
        leg.config.stop_loss = RiskThreshold::Points(dec!(100));
        leg.config.target = RiskThreshold::Points(dec!(20));

        // 프리미엄 손절은 비활성
        assert_eq!(leg.check_exit(dec!(50), dec!(48470)), None);
        assert!(matches!(
            leg.check_exit(dec!(121), dec!(48470)),
            Some(ExitTrigger::Target { .. })
        ));
        assert_eq!(leg.check_exit(dec!(120), dec!(48370)), None);
        // 상승 포지션: 기초자산 48470 - 100 아래에서 손절
        assert!(matches!(
            leg.check_exit(dec!(100), dec!(48369)),
            Some(ExitTrigger::UnderlyingStopLoss {
                direction: Direction::Bullish,
                ..
            })
        ));
    }

    #[test]
    fn test_bearish_underlying_stop() {
        let mut leg = entered(Side::Buy, dec!(100));
        leg.config.instrument_type = InstrumentType::Pe;
        leg.config.sl_on = SlBasis::Underlying;
        leg.config.stop_loss = RiskThreshold::Points(dec!(50));

        assert_eq!(leg.check_exit(dec!(100), dec!(48520)), None);
        assert!(matches!(
            leg.check_exit(dec!(100), dec!(48521)),
            Some(ExitTrigger::UnderlyingStopLoss {
                direction: Direction::Bearish,
                ..
            })
        ));
    }

    #[test]
    fn test_full_lifecycle_books_pnl() {
        let mut leg = entered(Side::Buy, dec!(100));
        assert!(leg.is_filled_entry());

        assert_eq!(leg.mark(dec!(103), dec!(1)).unwrap(), dec!(150));
        assert_eq!(leg.total_pnl(), dec!(150));

        leg.exit(filled(dec!(105), 50)).unwrap();
        assert_eq!(leg.state.name(), "exited");

        let pnl = leg.settle_exit(dec!(1)).unwrap();
        assert_eq!(pnl, dec!(250.00));
        assert_eq!(leg.booked_pnl, dec!(250.00));
        assert!(leg.is_flat());
        assert!(leg.is_filled_exit());
        assert_eq!(leg.total_pnl(), dec!(250.00));

        // 재진입 시 평가 손익 0, 실현 손익 유지
        leg.enter(Position::default(), filled(dec!(90), 50), dec!(2)).unwrap();
        assert_eq!(leg.position().unwrap().running_pnl, Decimal::ZERO);
        assert_eq!(leg.booked_pnl, dec!(250.00));
        assert_eq!(leg.lots_multiplier_set, dec!(2));
    }

    #[test]
    fn test_illegal_transitions_are_errors() {
        let mut leg = sample_leg(Side::Buy, InstrumentType::Fut);
        assert!(leg.exit(OrderTicket::default()).is_err());
        assert!(leg.settle_exit(dec!(1)).is_err());
        assert!(leg.revert_exit().is_err());
        assert!(leg.mark(dec!(1), dec!(1)).is_err());

        let mut leg = entered(Side::Buy, dec!(100));
        let err = leg
            .enter(Position::default(), OrderTicket::default(), dec!(1))
            .unwrap_err();
        assert_eq!(err.from, "entered");
        assert!(leg.settle_exit(dec!(1)).is_err());
    }

    #[test]
    fn test_reverts_and_replacement_counters() {
        let mut leg = entered(Side::Sell, dec!(100));
        leg.replace_entry(Position::default(), OrderTicket::default()).unwrap();
        leg.replace_entry(Position::default(), OrderTicket::default()).unwrap();
        assert_eq!(leg.entry.modifications, 2);

        leg.revert_entry().unwrap();
        assert!(leg.is_flat());

        let mut leg = entered(Side::Sell, dec!(100));
        leg.exit(OrderTicket::default()).unwrap();
        leg.replace_exit(OrderTicket::default()).unwrap();
        assert_eq!(leg.exit.modifications, 1);
        leg.revert_exit().unwrap();
        assert!(leg.is_entered());
        assert_eq!(leg.position().unwrap().token, "4411");
    }
}
