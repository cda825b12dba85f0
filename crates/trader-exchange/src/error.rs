//! 브로커 에러 타입.

use thiserror::Error;

/// 브로커 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 시세 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 상태 또는 브로커 에러 응답
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 종목 마스터에서 종목을 찾지 못함
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// 종목 마스터에서 종목이 여러 개 일치함
    #[error("Ambiguous instrument ({matches} matches): {query}")]
    AmbiguousInstrument { query: String, matches: usize },

    /// 로그인된 세션 없음
    #[error("Not logged in: account #{0}")]
    NotLoggedIn(i64),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::WebSocket(_)
        ) || matches!(self, ExchangeError::ApiError { code, .. } if *code >= 500)
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Disconnected(_) => Some(1000),
            ExchangeError::Timeout(_) => Some(500),
            ExchangeError::WebSocket(_) => Some(1000),
            ExchangeError::ApiError { code, .. } if *code >= 500 => Some(1000),
            _ => None,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_) | ExchangeError::ApiError { code: 401 | 403, .. }
        )
    }

    /// 같은 입력으로 재시도해도 소용없는 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_)
                | ExchangeError::InstrumentNotFound(_)
                | ExchangeError::AmbiguousInstrument { .. }
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<csv::Error> for ExchangeError {
    fn from(err: csv::Error) -> Self {
        ExchangeError::ParseError(format!("master contract: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExchangeError::Timeout("orders".into()).is_retryable());
        assert!(ExchangeError::ApiError {
            code: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
        assert!(!ExchangeError::ApiError {
            code: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!ExchangeError::InstrumentNotFound("NIFTY".into()).is_retryable());
    }

    #[test]
    fn test_fatal_and_auth() {
        assert!(ExchangeError::AmbiguousInstrument {
            query: "NIFTY FUT".into(),
            matches: 2
        }
        .is_fatal());
        assert!(ExchangeError::ApiError {
            code: 401,
            message: String::new()
        }
        .is_auth_error());
        assert_eq!(ExchangeError::Timeout("x".into()).retry_delay_ms(), Some(500));
        assert_eq!(ExchangeError::NotLoggedIn(3).retry_delay_ms(), None);
    }
}
