//! CLI 명령어 구현 모듈.

pub mod check_config;
pub mod migrate;
pub mod run;

pub use check_config::check_config;
pub use migrate::migrate;
pub use run::{build_context, run_forever, run_once};
