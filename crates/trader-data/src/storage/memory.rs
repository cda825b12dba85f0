//! 메모리 기반 저장소.
//!
//! 통합 테스트와 페이퍼 드라이런에서 PostgreSQL 대신 사용합니다.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use trader_core::{Account, Alert, Leg, Port, PortFlagUpdate, Strategy, User};

use super::records::{cloned_leg, cloned_port, AccountRecord};
use crate::error::{DataError, Result};
use crate::store::{EngineStore, LogRecord, OrderRecord};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    accounts: BTreeMap<i64, AccountRecord>,
    strategies: BTreeMap<i64, Strategy>,
    ports: BTreeMap<i64, Port>,
    legs: BTreeMap<i64, Leg>,
    /// (알림, 소비 완료 여부)
    alerts: BTreeMap<i64, (Alert, bool)>,
    orders: Vec<OrderRecord>,
    logs: Vec<LogRecord>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// [`EngineStore`]의 메모리 구현. 복제본은 같은 상태를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 시드 ====================

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn add_account(&self, account: &Account) {
        self.state
            .write()
            .await
            .accounts
            .insert(account.id, AccountRecord::from(account));
    }

    pub async fn add_strategy(&self, strategy: Strategy) {
        self.state
            .write()
            .await
            .strategies
            .insert(strategy.id, strategy);
    }

    /// 전략 삭제 (운영 중 삭제 시나리오).
    pub async fn remove_strategy(&self, strategy_id: i64) {
        let mut state = self.state.write().await;
        state.strategies.remove(&strategy_id);
        let port_ids: Vec<i64> = state
            .ports
            .values()
            .filter(|p| p.strategy_id == strategy_id)
            .map(|p| p.id)
            .collect();
        state.ports.retain(|_, p| p.strategy_id != strategy_id);
        state.legs.retain(|_, l| !port_ids.contains(&l.port_id));
    }

    pub async fn add_port(&self, port: Port) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(port.id);
        state.ports.insert(port.id, port);
    }

    /// 포트를 덮어씁니다 (운영자 버튼 조작 재현).
    pub async fn update_port(&self, port: Port) {
        self.add_port(port).await;
    }

    pub async fn add_leg(&self, leg: Leg) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(leg.id);
        state.legs.insert(leg.id, leg);
    }

    pub async fn add_alert(&self, alert: Alert) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(alert.id);
        state.alerts.insert(alert.id, (alert, false));
    }

    // ==================== 조회 ====================

    pub async fn orders(&self) -> Vec<OrderRecord> {
        self.state.read().await.orders.clone()
    }

    pub async fn logs(&self) -> Vec<LogRecord> {
        self.state.read().await.logs.clone()
    }

    pub async fn port(&self, port_id: i64) -> Option<Port> {
        self.state.read().await.ports.get(&port_id).cloned()
    }

    /// 전략의 모든 포트 (ID 순).
    pub async fn ports(&self, strategy_id: i64) -> Vec<Port> {
        self.state
            .read()
            .await
            .ports
            .values()
            .filter(|p| p.strategy_id == strategy_id)
            .cloned()
            .collect()
    }

    pub async fn leg(&self, leg_id: i64) -> Option<Leg> {
        self.state.read().await.legs.get(&leg_id).cloned()
    }

    /// 알림 소비 여부. 없는 알림이면 `None`.
    pub async fn alert_completed(&self, alert_id: i64) -> Option<bool> {
        self.state
            .read()
            .await
            .alerts
            .get(&alert_id)
            .map(|(_, done)| *done)
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn get_user(&self, user_id: i64) -> Result<User> {
        self.state
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("user #{}", user_id)))
    }

    async fn get_strategies(&self) -> Result<Vec<Strategy>> {
        Ok(self.state.read().await.strategies.values().cloned().collect())
    }

    async fn get_strategy(&self, strategy_id: i64) -> Result<Option<Strategy>> {
        Ok(self.state.read().await.strategies.get(&strategy_id).cloned())
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        Ok(self
            .state
            .read()
            .await
            .accounts
            .values()
            .cloned()
            .map(Account::from)
            .collect())
    }

    async fn get_account(&self, account_id: i64) -> Result<Account> {
        self.state
            .read()
            .await
            .accounts
            .get(&account_id)
            .cloned()
            .map(Account::from)
            .ok_or_else(|| DataError::NotFound(format!("account #{}", account_id)))
    }

    async fn get_ports(&self, strategy_id: i64) -> Result<Vec<Port>> {
        Ok(self.ports(strategy_id).await)
    }

    async fn update_port_flags(&self, port_id: i64, update: PortFlagUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        let port = state
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| DataError::NotFound(format!("port #{}", port_id)))?;

        match update {
            PortFlagUpdate::ClearExecuteButton => {
                port.controls.execute_button = false;
                port.controls.execute_button_lots = rust_decimal::Decimal::ZERO;
            }
            PortFlagUpdate::ClearSquareoffButton => port.controls.squareoff_button = false,
            PortFlagUpdate::MarkCombinedExitDone => port.combined_exit_done = true,
            PortFlagUpdate::ClearReExecuted => port.is_re_executed_port = false,
        }
        Ok(())
    }

    async fn clone_port(&self, new_name: &str, port: &Port, strategy_id: i64) -> Result<i64> {
        let mut state = self.state.write().await;

        let new_id = state.allocate_id();
        let mut clone = cloned_port(port, new_name, strategy_id);
        clone.id = new_id;
        state.ports.insert(new_id, clone);

        let sources: Vec<Leg> = state
            .legs
            .values()
            .filter(|l| l.port_id == port.id)
            .cloned()
            .collect();
        for source in sources {
            let mut leg = cloned_leg(&source, new_id);
            leg.id = state.allocate_id();
            state.legs.insert(leg.id, leg);
        }

        Ok(new_id)
    }

    async fn get_legs(&self, port_id: i64) -> Result<Vec<Leg>> {
        Ok(self
            .state
            .read()
            .await
            .legs
            .values()
            .filter(|l| l.port_id == port_id)
            .cloned()
            .collect())
    }

    async fn save_leg(&self, leg: &Leg) -> Result<()> {
        let mut state = self.state.write().await;
        match state.legs.get_mut(&leg.id) {
            Some(stored) => {
                // 설정은 외부 소유이므로 실행 상태만 덮어씁니다.
                let config = stored.config.clone();
                *stored = Leg {
                    config,
                    ..leg.clone()
                };
                Ok(())
            }
            None => Err(DataError::NotFound(format!("leg #{}", leg.id))),
        }
    }

    async fn add_order(&self, order: OrderRecord) -> Result<()> {
        self.state.write().await.orders.push(order);
        Ok(())
    }

    async fn add_log(&self, log: LogRecord) -> Result<()> {
        self.state.write().await.logs.push(log);
        Ok(())
    }

    async fn get_pending_alerts(&self, port_id: i64) -> Result<Vec<Alert>> {
        Ok(self
            .state
            .read()
            .await
            .alerts
            .values()
            .filter(|(alert, done)| alert.port_id == port_id && !done)
            .map(|(alert, _)| alert.clone())
            .collect())
    }

    async fn complete_alert(&self, alert_id: i64) -> Result<()> {
        if let Some((_, done)) = self.state.write().await.alerts.get_mut(&alert_id) {
            *done = true;
        }
        Ok(())
    }
}
