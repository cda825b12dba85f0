//! 설정 점검 명령어.
//!
//! 설정을 검증하고 실제로 적용될 값을 요약합니다. 데이터베이스 비밀번호는 가립니다.
//!
//! ```bash
//! trader --config config/engine.toml check-config
//! ```

use anyhow::Result;
use std::fmt::Write;
use trader_core::EngineConfig;

/// 설정을 검증하고 요약 문자열을 반환합니다.
pub fn check_config(config: &EngineConfig) -> Result<String> {
    config.validate()?;

    let scheduler = &config.scheduler;
    let session = &config.session;
    let mut report = String::new();
    writeln!(report, "database      : {}", config.database.redacted_url())?;
    writeln!(
        report,
        "connections   : {} (acquire timeout {}s)",
        config.database.max_connections, config.database.acquire_timeout_secs
    )?;
    writeln!(
        report,
        "window        : {} ~ {} ({})",
        scheduler.window_start, scheduler.window_end, scheduler.timezone
    )?;
    writeln!(
        report,
        "workers       : {} strategies / {} ports",
        scheduler.strategy_workers, scheduler.port_workers
    )?;
    writeln!(
        report,
        "price polling : {} x {:?}",
        session.price_poll_attempts,
        session.price_poll_interval()
    )?;
    writeln!(report, "log level     : {}", config.logging.level)?;
    Ok(report)
}
