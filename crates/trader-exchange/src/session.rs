//! 계좌 세션.
//!
//! 로그인된 계좌 하나의 REST 클라이언트, 시세 스트림, 시세 캐시, 종목 마스터를 묶습니다.
//! 세션은 시세 스트림 핸드셰이크 이후에만 정상(`is_healthy`)입니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trader_core::{option_strike, Account, InstrumentType, OrderSnapshot, Scrip, ScripType, SessionConfig};

use crate::contract::{ContractMaster, ResolvedInstrument};
use crate::tick_cache::{tick_key, TickCache};
use crate::traits::{BrokerApi, BrokerHandles, BrokerOrder, CancelAck, ExchangeResult, MarketFeed, OrderAck};
use crate::ExchangeError;

/// 로그인된 계좌 세션.
pub struct Session {
    account_id: i64,
    account_name: String,
    api: Arc<dyn BrokerApi>,
    feed: Arc<dyn MarketFeed>,
    ticks: TickCache,
    contracts: ContractMaster,
    config: SessionConfig,
}

impl Session {
    /// 로그인 절차를 수행합니다.
    ///
    /// 1. 요청 토큰 발급
    /// 2. 세션 토큰 발급
    /// 3. 시세 스트림 시작
    /// 4. 종목 마스터 조회 (설정된 횟수만큼 재시도)
    ///
    /// 실패하면 시작한 스트림을 종료하고 에러를 반환합니다.
    pub async fn login(
        account: &Account,
        handles: BrokerHandles,
        config: &SessionConfig,
    ) -> ExchangeResult<Self> {
        let BrokerHandles { api, feed } = handles;
        info!(account = %account.name, broker = api.name(), "Logging in");

        let request_token = api.login().await?;
        api.create_session(&request_token).await?;

        let ticks = TickCache::new();
        feed.start(ticks.clone()).await?;

        let contracts = match Self::load_contracts(api.as_ref(), &account.name, config).await {
            Ok(contracts) => contracts,
            Err(e) => {
                feed.shutdown();
                return Err(e);
            }
        };

        info!(
            account = %account.name,
            contracts = contracts.len(),
            "Session established"
        );

        Ok(Self {
            account_id: account.id,
            account_name: account.name.clone(),
            api,
            feed,
            ticks,
            contracts,
            config: config.clone(),
        })
    }

    async fn load_contracts(
        api: &dyn BrokerApi,
        account_name: &str,
        config: &SessionConfig,
    ) -> ExchangeResult<ContractMaster> {
        let attempts = config.master_contract_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match api.master_contract().await {
                Ok(rows) => return Ok(ContractMaster::from_rows(rows)),
                Err(e) => {
                    error!(
                        account = %account_name,
                        attempt,
                        attempts,
                        error = %e,
                        "Failed to fetch master contract"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ExchangeError::Unknown("master contract not fetched".to_string())
        }))
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// 시세 스트림이 핸드셰이크를 마쳤는지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        self.ticks.is_connected()
    }

    pub fn contracts(&self) -> &ContractMaster {
        &self.contracts
    }

    /// 최근 체결가.
    ///
    /// 처음 조회하는 종목은 구독 후 값이 들어올 때까지 폴링합니다.
    /// 시도 횟수를 넘기면 0을 반환합니다.
    pub async fn ltp(&self, exchange: &str, token: &str) -> ExchangeResult<Decimal> {
        if self.ticks.seed(exchange, token).await {
            if let Err(e) = self.feed.subscribe(exchange, token).await {
                self.ticks.forget(exchange, token).await;
                return Err(e);
            }
            info!(
                account = %self.account_name,
                key = %tick_key(exchange, token),
                "Subscribed to price stream"
            );
        }

        let interval = self.config.price_poll_interval();
        for attempt in 0..self.config.price_poll_attempts {
            match self.ticks.get(exchange, token).await {
                Some(price) if !price.is_zero() => return Ok(price),
                _ => {
                    if attempt + 1 < self.config.price_poll_attempts {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        }

        warn!(
            account = %self.account_name,
            key = %tick_key(exchange, token),
            "No price received, using zero"
        );
        Ok(Decimal::ZERO)
    }

    /// 포트 유형에 맞는 기초자산 토큰.
    pub fn underlying_token(&self, scrip: Scrip, scrip_type: ScripType) -> ExchangeResult<String> {
        self.contracts.underlying_token(scrip, scrip_type)
    }

    /// 기초자산 현재가.
    pub async fn underlying_ltp(&self, scrip: Scrip, scrip_type: ScripType) -> ExchangeResult<Decimal> {
        let token = self.underlying_token(scrip, scrip_type)?;
        self.ltp(scrip.exchanges().underlying, &token).await
    }

    /// 스크립의 로트 크기.
    pub fn lot_size(&self, scrip: Scrip) -> ExchangeResult<i64> {
        self.contracts.lot_size(scrip)
    }

    /// 레그 설정으로 거래할 종목을 고릅니다.
    ///
    /// 선물은 만기로, 옵션은 기초자산 ATM ± 거리 행사가와 만기로 찾습니다.
    pub async fn resolve_instrument(
        &self,
        scrip: Scrip,
        scrip_type: ScripType,
        instrument_type: InstrumentType,
        strike_distance: i64,
        expiry: NaiveDate,
    ) -> ExchangeResult<ResolvedInstrument> {
        match instrument_type {
            InstrumentType::Fut => {
                let row = self.contracts.future(scrip, expiry)?;
                Ok(ResolvedInstrument {
                    description: row.description.clone(),
                    token: row.sec_id.clone(),
                    strike: Decimal::ZERO,
                })
            }
            InstrumentType::Ce | InstrumentType::Pe => {
                let underlying = self.underlying_ltp(scrip, scrip_type).await?;
                let strike = option_strike(
                    underlying,
                    scrip.strike_step(),
                    strike_distance,
                    instrument_type,
                );
                let row = self.contracts.option(scrip, instrument_type, expiry, strike)?;
                debug!(
                    scrip = %scrip,
                    underlying = %underlying,
                    strike = %strike,
                    token = %row.sec_id,
                    "Resolved option"
                );
                Ok(ResolvedInstrument {
                    description: row.description.clone(),
                    token: row.sec_id.clone(),
                    strike,
                })
            }
        }
    }

    pub async fn order_book(&self) -> ExchangeResult<Vec<OrderSnapshot>> {
        self.api.order_book().await
    }

    pub async fn submit_order(&self, order: &BrokerOrder) -> ExchangeResult<OrderAck> {
        self.api.place_order(order).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelAck> {
        self.api.cancel_order(order_id).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.feed.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("account_name", &self.account_name)
            .field("healthy", &self.is_healthy())
            .field("contracts", &self.contracts.len())
            .finish()
    }
}
