//! 가격 및 손익 계산 공통 로직.
//!
//! 지정가 산출, ATM 행사가, 실현/평가 손익, 재실행 포트 이름을 계산합니다.
//! 모든 반올림은 `Decimal`의 은행가 반올림을 사용합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::leg::InstrumentType;
use super::order::Side;

/// 지정가 호가 단위.
pub const LIMIT_PRICE_TICK: Decimal = dec!(0.05);

/// 재실행 포트 이름 접미사.
pub const REX_SUFFIX: &str = "_REX";

/// 가격을 호가 단위로 반올림합니다.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return price;
    }
    (price / tick).round() * tick
}

/// 현재가 기준 지정가.
///
/// 매수는 `ltp × (1 + pct/100)`, 매도는 `ltp × (1 − pct/100)`이며
/// 0.05 단위로 반올림한 뒤 소수 둘째 자리로 맞춥니다.
///
/// ```
/// use rust_decimal_macros::dec;
/// use trader_core::{limit_price, Side};
///
/// assert_eq!(limit_price(dec!(200), dec!(1), Side::Buy), dec!(202.00));
/// ```
pub fn limit_price(ltp: Decimal, limit_pct: Decimal, side: Side) -> Decimal {
    let offset = limit_pct / dec!(100);
    let raw = match side {
        Side::Buy => ltp * (Decimal::ONE + offset),
        Side::Sell => ltp * (Decimal::ONE - offset),
    };
    round_to_tick(raw, LIMIT_PRICE_TICK).round_dp(2)
}

/// 기초자산 가격을 행사가 간격으로 반올림한 ATM 행사가.
pub fn atm_strike(underlying: Decimal, step: Decimal) -> Decimal {
    round_to_tick(underlying, step)
}

/// ATM에서 `distance` 간격만큼 떨어진 옵션 행사가.
///
/// 콜은 거리가 양수일수록 높아지고 풋은 낮아집니다. 선물은 ATM을 그대로 반환합니다.
pub fn option_strike(
    underlying: Decimal,
    step: Decimal,
    distance: i64,
    instrument: InstrumentType,
) -> Decimal {
    let atm = atm_strike(underlying, step);
    let offset = Decimal::from(distance) * step;
    match instrument {
        InstrumentType::Ce => atm + offset,
        InstrumentType::Pe => atm - offset,
        InstrumentType::Fut => atm,
    }
}

/// 체결 수량 기준 손익.
///
/// 매수 레그는 `(청산가 − 진입가)`, 매도 레그는 `(진입가 − 청산가)`에
/// 수량과 스크립 승수를 곱해 소수 둘째 자리로 반올림합니다.
pub fn position_pnl(
    side: Side,
    entry_price: Decimal,
    mark_price: Decimal,
    quantity: i64,
    multiplier: Decimal,
) -> Decimal {
    let diff = match side {
        Side::Buy => mark_price - entry_price,
        Side::Sell => entry_price - mark_price,
    };
    (diff * Decimal::from(quantity) * multiplier).round_dp(2)
}

/// 로트 수를 주문 수량으로 환산합니다: `floor(lots × 계좌 승수) × 로트 크기`.
pub fn lots_to_quantity(lots: Decimal, account_multiplier: Decimal, lot_size: i64) -> i64 {
    let lots = (lots * account_multiplier).floor();
    (lots * Decimal::from(lot_size))
        .trunc()
        .try_into()
        .unwrap_or(0)
}

/// 재실행으로 복제할 포트의 이름.
///
/// `PORT1` → `PORT1_REX1`, `PORT1_REX1` → `PORT1_REX2`.
pub fn rex_name(current: &str) -> String {
    if let Some((prefix, number)) = current.split_once(REX_SUFFIX) {
        if let Ok(n) = number.parse::<u32>() {
            return format!("{}{}{}", prefix, REX_SUFFIX, n + 1);
        }
    }
    format!("{}{}1", current, REX_SUFFIX)
}
