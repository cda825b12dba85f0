//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 엔진 실행 (상시 / 한 사이클)
//! - 설정 점검
//! - 데이터베이스 마이그레이션

pub mod commands;

pub use commands::*;
