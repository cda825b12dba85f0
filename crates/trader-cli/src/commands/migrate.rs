//! 데이터베이스 마이그레이션 명령어.

use anyhow::Result;
use tracing::info;
use trader_core::EngineConfig;
use trader_data::Database;

/// 설정된 데이터베이스에 스키마 마이그레이션을 적용합니다.
pub async fn migrate(config: &EngineConfig) -> Result<()> {
    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    db.health_check().await?;
    info!(url = %config.database.redacted_url(), "Schema is up to date");
    Ok(())
}
