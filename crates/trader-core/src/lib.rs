//! # Trader Core
//!
//! 파생상품 실행 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! - 계좌, 전략, 포트, 레그(명시적 상태 머신), 알림
//! - 브로커 주문장 스냅샷과 주문 장부
//! - 지정가, ATM 행사가, 손익 계산
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
