//! 거래 대상 스크립(기초자산) 정의.
//!
//! 스크립마다 거래소 구성, 행사가 간격, 손익 승수, 지수 이름이 고정되어 있습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraderError;

/// 지원하는 스크립.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scrip {
    Nifty,
    BankNifty,
    FinNifty,
    CrudeOil,
    NaturalGas,
}

/// 스크립 하나에 쓰이는 거래소 세 개.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScripExchanges {
    /// 기초자산(지수/선물) 시세 거래소
    pub underlying: &'static str,
    /// 옵션 마스터 거래소
    pub options: &'static str,
    /// 주문/시세 거래소
    pub trading: &'static str,
}

const NSE: ScripExchanges = ScripExchanges {
    underlying: "NSECM",
    options: "NFO",
    trading: "NSEFO",
};

const MCX: ScripExchanges = ScripExchanges {
    underlying: "MCX",
    options: "MCX",
    trading: "MCX",
};

impl Scrip {
    pub const ALL: [Scrip; 5] = [
        Scrip::Nifty,
        Scrip::BankNifty,
        Scrip::FinNifty,
        Scrip::CrudeOil,
        Scrip::NaturalGas,
    ];

    /// 종목 마스터의 심볼 이름.
    pub fn symbol(&self) -> &'static str {
        match self {
            Scrip::Nifty => "NIFTY",
            Scrip::BankNifty => "BANKNIFTY",
            Scrip::FinNifty => "FINNIFTY",
            Scrip::CrudeOil => "CRUDEOIL",
            Scrip::NaturalGas => "NATURALGAS",
        }
    }

    pub fn exchanges(&self) -> ScripExchanges {
        match self {
            Scrip::Nifty | Scrip::BankNifty | Scrip::FinNifty => NSE,
            Scrip::CrudeOil | Scrip::NaturalGas => MCX,
        }
    }

    /// ATM 계산에 쓰는 행사가 간격.
    pub fn strike_step(&self) -> Decimal {
        match self {
            Scrip::Nifty | Scrip::FinNifty | Scrip::CrudeOil => Decimal::from(50),
            Scrip::BankNifty => Decimal::from(100),
            Scrip::NaturalGas => Decimal::from(5),
        }
    }

    /// 가격 차이 × 수량에 곱하는 손익 승수.
    pub fn pnl_multiplier(&self) -> Decimal {
        match self {
            Scrip::Nifty | Scrip::BankNifty | Scrip::FinNifty => Decimal::ONE,
            Scrip::CrudeOil => Decimal::from(100),
            Scrip::NaturalGas => Decimal::from(1250),
        }
    }

    /// 기초 지수 이름. MCX 상품에는 지수가 없습니다.
    pub fn index_name(&self) -> Option<&'static str> {
        match self {
            Scrip::Nifty => Some("Nifty 50"),
            Scrip::BankNifty => Some("Nifty Bank"),
            Scrip::FinNifty => Some("Nifty Fin Service"),
            Scrip::CrudeOil | Scrip::NaturalGas => None,
        }
    }
}

impl fmt::Display for Scrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Scrip {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scrip::ALL
            .into_iter()
            .find(|scrip| scrip.symbol().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TraderError::InvalidInput(format!("알 수 없는 스크립: {}", s)))
    }
}

/// 포트의 기초자산 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScripType {
    /// 지수를 기초자산으로 사용
    Index,
    /// 최근월 선물을 기초자산으로 사용
    Fut,
}

impl fmt::Display for ScripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScripType::Index => write!(f, "INDEX"),
            ScripType::Fut => write!(f, "FUT"),
        }
    }
}

impl FromStr for ScripType {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INDEX" => Ok(ScripType::Index),
            "FUT" => Ok(ScripType::Fut),
            _ => Err(TraderError::InvalidInput(format!("알 수 없는 스크립 유형: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scrip_table() {
        assert_eq!(Scrip::BankNifty.strike_step(), dec!(100));
        assert_eq!(Scrip::NaturalGas.strike_step(), dec!(5));
        assert_eq!(Scrip::CrudeOil.pnl_multiplier(), dec!(100));
        assert_eq!(Scrip::NaturalGas.pnl_multiplier(), dec!(1250));
        assert_eq!(Scrip::FinNifty.pnl_multiplier(), dec!(1));
        assert_eq!(Scrip::Nifty.index_name(), Some("Nifty 50"));
        assert_eq!(Scrip::CrudeOil.index_name(), None);
    }

    #[test]
    fn test_exchanges() {
        let nse = Scrip::Nifty.exchanges();
        assert_eq!(nse.underlying, "NSECM");
        assert_eq!(nse.options, "NFO");
        assert_eq!(nse.trading, "NSEFO");
        assert_eq!(Scrip::NaturalGas.exchanges().trading, "MCX");
    }

    #[test]
    fn test_parse() {
        assert_eq!("BANKNIFTY".parse::<Scrip>().unwrap(), Scrip::BankNifty);
        assert_eq!("crudeoil".parse::<Scrip>().unwrap(), Scrip::CrudeOil);
        assert!("SENSEX".parse::<Scrip>().is_err());
        assert_eq!("FUT".parse::<ScripType>().unwrap(), ScripType::Fut);
        assert_eq!(Scrip::FinNifty.to_string(), "FINNIFTY");
    }
}
