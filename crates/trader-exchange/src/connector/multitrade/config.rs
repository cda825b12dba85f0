//! Multitrade API 설정.
//!
//! 계좌 레코드의 API 키/시크릿과 REST/WebSocket 주소로 구성합니다.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use trader_core::{Account, SessionConfig};

/// 모든 요청에 붙는 API 버전 헤더 값.
pub const API_VERSION: &str = "3";

/// Multitrade 연결 설정.
#[derive(Debug, Clone)]
pub struct MultitradeConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// REST 기본 URL (끝의 `/` 제외)
    pub root_url: String,
    /// WebSocket URL
    pub ws_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 인증서 검증 생략 여부
    pub accept_invalid_certs: bool,
    /// 로그용 계좌 이름
    pub account_name: String,
}

impl MultitradeConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        root_url: impl Into<String>,
        ws_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            root_url: root_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into(),
            timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
            account_name: String::new(),
        }
    }

    /// 계좌 레코드와 세션 설정에서 생성.
    pub fn from_account(account: &Account, session: &SessionConfig) -> Self {
        Self::new(
            account.api_key.clone(),
            account.api_secret.expose_secret().to_string(),
            account.root_url.clone(),
            account.ws_root_url.clone(),
        )
        .with_timeout(session.request_timeout())
        .with_accept_invalid_certs(session.accept_invalid_certs)
        .with_account_name(account.name.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }

    /// REST 엔드포인트 전체 URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.root_url, path.trim_start_matches('/'))
    }
}
