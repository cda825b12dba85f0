//! 종목 마스터(contract master)와 종목 조회.
//!
//! 브로커가 내려주는 헤더 없는 CSV를 파싱하고, 스크립/만기/행사가로
//! 거래 가능한 종목을 정확히 하나 찾습니다. 0건이나 2건 이상은 에러입니다.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;
use trader_core::{InstrumentType, Scrip, ScripType};

use crate::traits::ExchangeResult;
use crate::ExchangeError;

/// 엔진이 사용하는 거래소.
pub const CONTRACT_EXCHANGES: [&str; 3] = ["NSEFO", "NSECM", "MCX"];

/// 엔진이 사용하는 종목 유형.
pub const CONTRACT_INSTRUMENT_TYPES: [&str; 5] = ["INDEX", "FUTIDX", "FUTCOM", "OPTIDX", "OPTFUT"];

/// 만기일 형식 후보 (브로커가 형식을 섞어서 내려줌).
const EXPIRY_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d-%b-%Y",
    "%d%b%Y",
    "%Y%m%d",
];

const EXPIRY_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%d %H:%M:%S", "%d-%m-%Y %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// 종목 마스터 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRow {
    /// 종목 토큰 (시세/주문 키)
    pub sec_id: String,
    pub sec_id_2: String,
    pub symbol: String,
    /// 종목 설명 (주문 기록에 사용)
    pub description: String,
    pub prev_close: Decimal,
    pub expiry: Option<NaiveDate>,
    pub strike: Decimal,
    pub tick_size: Decimal,
    pub lot_size: i64,
    /// CE / PE / FUT / (지수는 빈 값)
    pub option_type: String,
    /// INDEX / FUTIDX / FUTCOM / OPTIDX / OPTFUT ...
    pub instrument_type: String,
    pub exchange: String,
}

/// CSV 원본 행 (컬럼 순서 고정).
#[derive(Debug, Deserialize)]
struct RawContractRow(
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value.trim()).unwrap_or_default()
}

/// 여러 형식의 만기일을 파싱합니다. 실패하면 `None`.
pub fn parse_expiry(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    EXPIRY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            EXPIRY_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

impl From<RawContractRow> for ContractRow {
    fn from(raw: RawContractRow) -> Self {
        Self {
            sec_id: raw.0.trim().to_string(),
            sec_id_2: raw.1.trim().to_string(),
            symbol: raw.2.trim().to_string(),
            description: raw.3.trim().to_string(),
            prev_close: parse_decimal(&raw.4),
            expiry: parse_expiry(&raw.5),
            strike: parse_decimal(&raw.6),
            tick_size: parse_decimal(&raw.7),
            lot_size: parse_decimal(&raw.8).trunc().try_into().unwrap_or(0),
            option_type: raw.9.trim().to_string(),
            instrument_type: raw.10.trim().to_string(),
            exchange: raw.11.trim().to_string(),
        }
    }
}

/// 헤더 없는 종목 마스터 CSV를 파싱합니다.
///
/// 컬럼 수가 맞지 않는 행은 건너뜁니다.
pub fn parse_master_csv(text: &str) -> ExchangeResult<Vec<ContractRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        if record.len() != 12 {
            skipped += 1;
            continue;
        }
        let raw: RawContractRow = record.deserialize(None)?;
        rows.push(ContractRow::from(raw));
    }

    debug!(rows = rows.len(), skipped, "Parsed master contract");
    Ok(rows)
}

/// 선택된 거래 대상 종목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstrument {
    /// 종목 설명
    pub description: String,
    /// 종목 토큰
    pub token: String,
    /// 행사가 (선물은 0)
    pub strike: Decimal,
}

/// 필터링된 종목 마스터.
#[derive(Debug, Clone, Default)]
pub struct ContractMaster {
    rows: Vec<ContractRow>,
}

impl ContractMaster {
    /// 엔진이 쓰는 거래소/유형만 남겨 생성합니다.
    pub fn from_rows(rows: Vec<ContractRow>) -> Self {
        let rows = rows
            .into_iter()
            .filter(|row| CONTRACT_EXCHANGES.contains(&row.exchange.as_str()))
            .filter(|row| CONTRACT_INSTRUMENT_TYPES.contains(&row.instrument_type.as_str()))
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn unique<'a>(
        query: String,
        mut matches: impl Iterator<Item = &'a ContractRow>,
    ) -> ExchangeResult<&'a ContractRow> {
        let first = matches
            .next()
            .ok_or_else(|| ExchangeError::InstrumentNotFound(query.clone()))?;
        let extra = matches.count();
        if extra > 0 {
            return Err(ExchangeError::AmbiguousInstrument {
                query,
                matches: extra + 1,
            });
        }
        Ok(first)
    }

    fn futures_of<'a>(&'a self, scrip: Scrip) -> impl Iterator<Item = &'a ContractRow> + 'a {
        let exchange = scrip.exchanges().trading;
        self.rows.iter().filter(move |row| {
            row.symbol == scrip.symbol() && row.exchange == exchange && row.option_type == "FUT"
        })
    }

    /// 만기가 일치하는 선물.
    pub fn future(&self, scrip: Scrip, expiry: NaiveDate) -> ExchangeResult<&ContractRow> {
        Self::unique(
            format!("{} FUT {}", scrip, expiry),
            self.futures_of(scrip).filter(|row| row.expiry == Some(expiry)),
        )
    }

    /// 만기와 행사가가 일치하는 옵션.
    pub fn option(
        &self,
        scrip: Scrip,
        instrument_type: InstrumentType,
        expiry: NaiveDate,
        strike: Decimal,
    ) -> ExchangeResult<&ContractRow> {
        let exchange = scrip.exchanges().trading;
        let option_type = instrument_type.as_str();
        Self::unique(
            format!("{} {} {} {}", scrip, option_type, strike, expiry),
            self.rows.iter().filter(|row| {
                row.symbol == scrip.symbol()
                    && row.exchange == exchange
                    && row.option_type == option_type
                    && row.expiry == Some(expiry)
                    && row.strike == strike
            }),
        )
    }

    /// 기초 지수 종목.
    pub fn index(&self, scrip: Scrip) -> ExchangeResult<&ContractRow> {
        let name = scrip.index_name().ok_or_else(|| {
            ExchangeError::InstrumentNotFound(format!("{} has no underlying index", scrip))
        })?;
        let exchange = scrip.exchanges().underlying;
        Self::unique(
            format!("INDEX {}", name),
            self.rows.iter().filter(|row| {
                row.symbol == name && row.instrument_type == "INDEX" && row.exchange == exchange
            }),
        )
    }

    /// 가장 가까운 만기의 선물.
    pub fn nearest_future(&self, scrip: Scrip) -> ExchangeResult<&ContractRow> {
        let expiry = self
            .futures_of(scrip)
            .filter_map(|row| row.expiry)
            .min()
            .ok_or_else(|| ExchangeError::InstrumentNotFound(format!("{} FUT (any expiry)", scrip)))?;
        self.future(scrip, expiry)
    }

    /// 포트 유형에 맞는 기초자산 종목 토큰.
    pub fn underlying_token(&self, scrip: Scrip, scrip_type: ScripType) -> ExchangeResult<String> {
        let row = match scrip_type {
            ScripType::Index => self.index(scrip)?,
            ScripType::Fut => self.nearest_future(scrip)?,
        };
        Ok(row.sec_id.clone())
    }

    /// 스크립의 로트 크기 (CE 행 기준, CE/PE 동일).
    pub fn lot_size(&self, scrip: Scrip) -> ExchangeResult<i64> {
        self.rows
            .iter()
            .find(|row| row.symbol == scrip.symbol() && row.option_type == "CE")
            .map(|row| row.lot_size)
            .ok_or_else(|| ExchangeError::InstrumentNotFound(format!("{} lot size", scrip)))
    }
}
