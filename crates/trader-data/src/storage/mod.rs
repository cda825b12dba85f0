//! 저장소 구현.

pub mod memory;
pub mod postgres;
pub mod records;
