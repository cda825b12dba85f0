//! 엔진 영속성.
//!
//! 이 crate는 다음을 제공합니다:
//! - [`EngineStore`] 저장소 경계
//! - PostgreSQL 구현 ([`PgStore`])과 마이그레이션
//! - 테스트/드라이런용 메모리 구현 ([`MemoryStore`])

pub mod error;
pub mod storage;
pub mod store;

pub use error::{DataError, Result};
pub use store::{EngineStore, LogLevel, LogRecord, OrderRecord};

pub use storage::memory::MemoryStore;
pub use storage::postgres::{Database, PgStore};
pub use storage::records::{
    AccountRecord, AlertRecord, LegRecord, PortRecord, StrategyRecord, UserRecord,
};
