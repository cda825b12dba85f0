//! PostgreSQL 저장소 구현.
//!
//! 운영 웹앱과 같은 `backend_*` 테이블을 읽고 씁니다.
//! 풀 크기 기본값은 1이라 모든 쿼리가 직렬화됩니다.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use trader_core::{Account, Alert, DatabaseConfig, Leg, Port, PortFlagUpdate, Strategy, User};
use tracing::{debug, info, instrument};

use super::records::{
    AccountRecord, AlertRecord, LegRecord, PortRecord, StrategyRecord, UserRecord,
};
use crate::error::{DataError, Result};
use crate::store::{EngineStore, LogRecord, OrderRecord};

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(url = %config.redacted_url(), "Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 스키마 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(true)
    }
}

const PORT_COLUMNS: &str = "id, name, strategy_id, scrip, scrip_type, start_time, stop_time, \
     squareoff_time, combined_sl, combined_target, to_re_execute, trading_mode, \
     lots_multiplier_set, is_re_executed_port, execute_button, execute_button_lots, \
     squareoff_button, stop_button, combined_exit_done";

const LEG_CONFIG_COLUMNS: &str = "name, lots, ins_type, strike_distance, expiry, trade_type, \
     order_type, limit_pct, num_modifications, modification_wait_time, sl_on, sl, target";

/// [`EngineStore`]의 PostgreSQL 구현.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl EngineStore for PgStore {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<User> {
        let record: Option<UserRecord> =
            sqlx::query_as("SELECT id, username FROM backend_user WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        record
            .map(User::from)
            .ok_or_else(|| DataError::NotFound(format!("user #{}", user_id)))
    }

    #[instrument(skip(self))]
    async fn get_strategies(&self) -> Result<Vec<Strategy>> {
        let records: Vec<StrategyRecord> = sqlx::query_as(
            "SELECT id, name, user_id, account_id, lots_multiplier FROM backend_strategy ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(records.into_iter().map(Strategy::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_strategy(&self, strategy_id: i64) -> Result<Option<Strategy>> {
        let record: Option<StrategyRecord> = sqlx::query_as(
            "SELECT id, name, user_id, account_id, lots_multiplier FROM backend_strategy WHERE id = $1",
        )
        .bind(strategy_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(record.map(Strategy::from))
    }

    #[instrument(skip(self))]
    async fn get_accounts(&self) -> Result<Vec<Account>> {
        let records: Vec<AccountRecord> = sqlx::query_as(
            "SELECT id, name, api_key, api_secret, root_url, ws_root_url, lots_multiplier \
             FROM backend_account ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(records.into_iter().map(Account::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_account(&self, account_id: i64) -> Result<Account> {
        let record: Option<AccountRecord> = sqlx::query_as(
            "SELECT id, name, api_key, api_secret, root_url, ws_root_url, lots_multiplier \
             FROM backend_account WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(self.db.pool())
        .await?;

        record
            .map(Account::from)
            .ok_or_else(|| DataError::NotFound(format!("account #{}", account_id)))
    }

    #[instrument(skip(self))]
    async fn get_ports(&self, strategy_id: i64) -> Result<Vec<Port>> {
        let records: Vec<PortRecord> = sqlx::query_as(&format!(
            "SELECT {} FROM backend_port WHERE strategy_id = $1 ORDER BY id",
            PORT_COLUMNS
        ))
        .bind(strategy_id)
        .fetch_all(self.db.pool())
        .await?;

        records.into_iter().map(Port::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn update_port_flags(&self, port_id: i64, update: PortFlagUpdate) -> Result<()> {
        let statement = match update {
            PortFlagUpdate::ClearExecuteButton => {
                "UPDATE backend_port SET execute_button = FALSE, execute_button_lots = 0 WHERE id = $1"
            }
            PortFlagUpdate::ClearSquareoffButton => {
                "UPDATE backend_port SET squareoff_button = FALSE WHERE id = $1"
            }
            PortFlagUpdate::MarkCombinedExitDone => {
                "UPDATE backend_port SET combined_exit_done = TRUE WHERE id = $1"
            }
            PortFlagUpdate::ClearReExecuted => {
                "UPDATE backend_port SET is_re_executed_port = FALSE WHERE id = $1"
            }
        };

        sqlx::query(statement)
            .bind(port_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    #[instrument(skip(self, port), fields(port_id = port.id))]
    async fn clone_port(&self, new_name: &str, port: &Port, strategy_id: i64) -> Result<i64> {
        let mut tx = self.db.pool().begin().await?;

        let (new_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO backend_port
                (name, strategy_id, scrip, scrip_type, start_time, stop_time, squareoff_time,
                 combined_sl, combined_target, to_re_execute, trading_mode, lots_multiplier_set,
                 is_re_executed_port, execute_button, execute_button_lots,
                 squareoff_button, stop_button, combined_exit_done)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    TRUE, FALSE, 0, FALSE, FALSE, FALSE)
            RETURNING id
            "#,
        )
        .bind(new_name)
        .bind(strategy_id)
        .bind(port.scrip.to_string())
        .bind(port.scrip_type.to_string())
        .bind(port.schedule.start)
        .bind(port.schedule.stop)
        .bind(port.schedule.squareoff)
        .bind(port.combined_sl)
        .bind(port.combined_target)
        .bind(port.to_re_execute)
        .bind(port.trading_mode.to_string())
        .bind(port.lots_multiplier_set)
        .fetch_one(&mut *tx)
        .await?;

        // 실행 상태 컬럼은 기본값(포지션 없음)으로 시작합니다.
        let copied = sqlx::query(&format!(
            "INSERT INTO backend_leg (port_id, {cols}) \
             SELECT $1, {cols} FROM backend_leg WHERE port_id = $2 ORDER BY id",
            cols = LEG_CONFIG_COLUMNS
        ))
        .bind(new_id)
        .bind(port.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            new_port_id = new_id,
            legs = copied.rows_affected(),
            "Port cloned"
        );
        Ok(new_id)
    }

    #[instrument(skip(self))]
    async fn get_legs(&self, port_id: i64) -> Result<Vec<Leg>> {
        let records: Vec<LegRecord> =
            sqlx::query_as("SELECT * FROM backend_leg WHERE port_id = $1 ORDER BY id")
                .bind(port_id)
                .fetch_all(self.db.pool())
                .await?;

        records.into_iter().map(Leg::try_from).collect()
    }

    #[instrument(skip(self, leg), fields(leg_id = leg.id, status = leg.state.name()))]
    async fn save_leg(&self, leg: &Leg) -> Result<()> {
        let r = LegRecord::from(leg);

        let result = sqlx::query(
            r#"
            UPDATE backend_leg SET
                status = $2,
                entered_ins = $3,
                entered_token = $4,
                entered_strike = $5,
                entered_underlying_price = $6,
                ltp = $7,
                running_pnl = $8,
                booked_pnl = $9,
                entry_order_id = $10,
                exit_order_id = $11,
                entry_order_type = $12,
                exit_order_type = $13,
                entry_order_message = $14,
                exit_order_message = $15,
                entry_order_status = $16,
                exit_order_status = $17,
                entry_num_modifications_done = $18,
                exit_num_modifications_done = $19,
                entry_filled_qty = $20,
                exit_filled_qty = $21,
                entry_executed_price = $22,
                exit_executed_price = $23,
                lots_multiplier_set = $24
            WHERE id = $1
            "#,
        )
        .bind(r.id)
        .bind(&r.status)
        .bind(&r.entered_ins)
        .bind(&r.entered_token)
        .bind(r.entered_strike)
        .bind(r.entered_underlying_price)
        .bind(r.ltp)
        .bind(r.running_pnl)
        .bind(r.booked_pnl)
        .bind(&r.entry_order_id)
        .bind(&r.exit_order_id)
        .bind(&r.entry_order_type)
        .bind(&r.exit_order_type)
        .bind(&r.entry_order_message)
        .bind(&r.exit_order_message)
        .bind(&r.entry_order_status)
        .bind(&r.exit_order_status)
        .bind(r.entry_num_modifications_done)
        .bind(r.exit_num_modifications_done)
        .bind(r.entry_filled_qty)
        .bind(r.exit_filled_qty)
        .bind(r.entry_executed_price)
        .bind(r.exit_executed_price)
        .bind(r.lots_multiplier_set)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("leg #{}", leg.id)));
        }
        Ok(())
    }

    async fn add_order(&self, order: OrderRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO backend_order (timestamp, instrument, trade, qty, order_type, price, port_id, account_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.timestamp)
        .bind(&order.instrument)
        .bind(order.side.to_string())
        .bind(order.quantity)
        .bind(order.order_type.to_string())
        .bind(order.price)
        .bind(order.port_id)
        .bind(order.account_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn add_log(&self, log: LogRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO backend_log (timestamp, text, level, port_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(log.timestamp)
        .bind(&log.text)
        .bind(log.level.as_str())
        .bind(log.port_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pending_alerts(&self, port_id: i64) -> Result<Vec<Alert>> {
        let records: Vec<AlertRecord> = sqlx::query_as(
            r#"SELECT id, port_id, type, "TYPE", "STRIKE", "EXPIRY", lots, status
               FROM backend_tradingviewalert
               WHERE port_id = $1 AND status = 'pending'
               ORDER BY id"#,
        )
        .bind(port_id)
        .fetch_all(self.db.pool())
        .await?;

        records.into_iter().map(Alert::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn complete_alert(&self, alert_id: i64) -> Result<()> {
        sqlx::query("UPDATE backend_tradingviewalert SET status = 'complete' WHERE id = $1")
            .bind(alert_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
