//! Multitrade REST 클라이언트.
//!
//! 처리 기능:
//! - 로그인 (POST connect/login) 및 세션 토큰 (GET session/token)
//! - 주문장 (GET orders)
//! - 주문 제출/취소 (POST/DELETE orders/regular)
//! - 종목 마스터 CSV (GET instruments)

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use trader_core::{is_success_status, OrderKind, OrderSnapshot};

use super::config::{MultitradeConfig, API_VERSION};
use super::types::{Envelope, LoginData, PlaceOrderData, SessionData, WireOrder};
use crate::contract::{parse_master_csv, ContractRow};
use crate::traits::{BrokerApi, BrokerOrder, CancelAck, ExchangeResult, OrderAck};
use crate::ExchangeError;

mod paths {
    pub const LOGIN: &str = "connect/login";
    pub const SESSION_TOKEN: &str = "session/token";
    pub const ORDERS: &str = "orders";
    pub const REGULAR_ORDERS: &str = "orders/regular";
    pub const MASTER_CONTRACT: &str = "instruments";
}

/// Multitrade REST 클라이언트.
pub struct MultitradeClient {
    config: MultitradeConfig,
    client: Client,
    access_token: Arc<RwLock<Option<SecretString>>>,
}

impl MultitradeClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: MultitradeConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            config,
            client,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &MultitradeConfig {
        &self.config
    }

    /// 세션 토큰이 발급되었는지 확인.
    pub async fn has_session(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    fn authorization(&self, token: &str) -> String {
        format!("{}:{}", self.config.api_key, token)
    }

    async fn session_header(&self) -> ExchangeResult<String> {
        let guard = self.access_token.read().await;
        match guard.as_ref() {
            Some(token) => Ok(self.authorization(token.expose_secret())),
            None => Err(ExchangeError::Unauthorized(format!(
                "no session token for account {}",
                self.config.account_name
            ))),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.config.endpoint(path))
            .header("Api-Version", API_VERSION)
    }

    async fn send(request: RequestBuilder) -> ExchangeResult<(reqwest::StatusCode, String)> {
        let response: Response = request.send().await.map_err(ExchangeError::from)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        Ok((status, body))
    }

    /// 상태 코드를 확인하고 JSON 봉투의 `data`를 꺼냅니다.
    async fn fetch_data<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> ExchangeResult<T> {
        let (status, body) = Self::send(request).await?;

        if !status.is_success() {
            error!(status = %status, body = %body, "{} request failed", what);
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::ParseError(format!("{} response: {}", what, e)))?;

        envelope.data.ok_or_else(|| ExchangeError::ApiError {
            code: status.as_u16() as i32,
            message: envelope
                .message
                .or(envelope.status)
                .unwrap_or_else(|| format!("{} response without data", what)),
        })
    }
}

#[async_trait]
impl BrokerApi for MultitradeClient {
    fn name(&self) -> &str {
        "multitrade"
    }

    async fn login(&self) -> ExchangeResult<String> {
        info!(account = %self.config.account_name, "Requesting Multitrade request token");

        let request = self
            .client
            .post(self.config.endpoint(paths::LOGIN))
            .header("Api-Version", API_VERSION)
            .form(&[
                ("api_key", self.config.api_key.as_str()),
                ("api_secrets", self.config.api_secret.expose_secret()),
            ]);

        let data: LoginData = Self::fetch_data(request, "login")
            .await
            .map_err(|e| match e {
                ExchangeError::ApiError { code: 401 | 403, message } => {
                    ExchangeError::Unauthorized(message)
                }
                other => other,
            })?;

        Ok(data.request_token)
    }

    async fn create_session(&self, request_token: &str) -> ExchangeResult<()> {
        let request = self
            .get(paths::SESSION_TOKEN)
            .header("Authorization", self.authorization(request_token));

        let data: SessionData = Self::fetch_data(request, "session token").await?;
        *self.access_token.write().await = Some(SecretString::from(data.access_token));

        info!(account = %self.config.account_name, "Multitrade session token issued");
        Ok(())
    }

    async fn order_book(&self) -> ExchangeResult<Vec<OrderSnapshot>> {
        let request = self
            .get(paths::ORDERS)
            .header("Authorization", self.session_header().await?);

        let orders: Vec<WireOrder> = Self::fetch_data(request, "order book").await?;
        let orders: Vec<OrderSnapshot> = orders
            .into_iter()
            .map(OrderSnapshot::from)
            .collect();

        debug!(count = orders.len(), "Fetched order book");
        Ok(orders)
    }

    async fn place_order(&self, order: &BrokerOrder) -> ExchangeResult<OrderAck> {
        let price = match order.order_type {
            OrderKind::Limit => order.price.to_string(),
            OrderKind::Market => "0".to_string(),
        };
        let quantity = order.quantity.to_string();
        let side = order.side.to_string();
        let order_type = order.order_type.to_string();

        let request = self
            .client
            .post(self.config.endpoint(paths::REGULAR_ORDERS))
            .header("Api-Version", API_VERSION)
            .header("Authorization", self.session_header().await?)
            .form(&[
                ("tradingsecurity", order.token.as_str()),
                ("exchange", order.exchange.as_str()),
                ("transaction_type", side.as_str()),
                ("order_type", order_type.as_str()),
                ("quantity", quantity.as_str()),
                ("validity", "DAY"),
                ("price", price.as_str()),
                ("product", "CNC"),
                ("userid", "OWN"),
            ]);

        let (status, body) = Self::send(request).await?;

        // 거부 응답도 JSON 본문이면 메시지로 돌려줍니다.
        let reply: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) if status.is_success() => {
                return Err(ExchangeError::ParseError(format!("order response: {}", e)))
            }
            Err(_) => {
                return Err(ExchangeError::ApiError {
                    code: status.as_u16() as i32,
                    message: body,
                })
            }
        };

        let order_id = reply
            .get("data")
            .cloned()
            .and_then(|data| serde_json::from_value::<PlaceOrderData>(data).ok())
            .map(|data| data.orderid)
            .unwrap_or_else(|| "0".to_string());

        let reply_status = reply.get("status").and_then(Value::as_str).unwrap_or_default();
        let message = if is_success_status(reply_status) {
            reply_status.to_string()
        } else {
            warn!(body = %body, "Order not accepted");
            body
        };

        Ok(OrderAck { order_id, message })
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelAck> {
        let path = format!("{}/{}", paths::REGULAR_ORDERS, order_id);
        let request = self
            .client
            .delete(self.config.endpoint(&path))
            .header("Api-Version", API_VERSION)
            .header("Authorization", self.session_header().await?);

        let (status, body) = Self::send(request).await?;
        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ExchangeError::ParseError(format!("cancel response: {}", e))
            } else {
                ExchangeError::ApiError {
                    code: status.as_u16() as i32,
                    message: body.clone(),
                }
            }
        })?;

        let ack_status = raw
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(CancelAck {
            status: ack_status,
            raw,
        })
    }

    async fn master_contract(&self) -> ExchangeResult<Vec<ContractRow>> {
        let (status, body) = Self::send(self.get(paths::MASTER_CONTRACT)).await?;
        if !status.is_success() {
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: format!("master contract download failed ({} bytes)", body.len()),
            });
        }
        parse_master_csv(&body)
    }
}
