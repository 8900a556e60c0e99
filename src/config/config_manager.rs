// ==========================================
// Roofline Ops - configuration manager
// ==========================================
// Storage: config_kv table (key-value, global scope). Every threshold has a
// built-in default; a missing key is not an error.
// ==========================================

use crate::config::ops_config_trait::OpsConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub mod keys {
    pub const APPROVAL_CHARGE_LIMIT: &str = "approval_charge_limit";
    pub const APPROVAL_MIN_MARKUP_PCT: &str = "approval_min_markup_pct";
    pub const APPROVAL_MAX_MARKUP_PCT: &str = "approval_max_markup_pct";
    pub const APPROVAL_LINE_QTY_LIMIT: &str = "approval_line_qty_limit";
    pub const BILLING_DEADLINE_DAYS: &str = "billing_deadline_days";
    pub const OVERDUE_CRITICAL_DAYS: &str = "overdue_critical_days";
    pub const SLA_CRITICAL_OVERAGE_DAYS: &str = "sla_critical_overage_days";
    pub const BOTTLENECK_WARNING_COUNT: &str = "bottleneck_warning_count";
    pub const BOTTLENECK_HIGH_COUNT: &str = "bottleneck_high_count";
}

pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Build from a shared connection. Re-applies the unified PRAGMA set
    /// (idempotent) so connection behavior stays uniform.
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> anyhow::Result<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("lock acquisition failed: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_config_value(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("lock acquisition failed: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_f64_or(&self, key: &str, default: f64) -> anyhow::Result<f64> {
        match self.get_config_value(key)? {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("config key {} is not a number: {}", key, e)),
            None => Ok(default),
        }
    }

    fn get_i64_or(&self, key: &str, default: i64) -> anyhow::Result<i64> {
        match self.get_config_value(key)? {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("config key {} is not an integer: {}", key, e)),
            None => Ok(default),
        }
    }

    /// Upsert a global-scope config value.
    pub fn set_config_value(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("lock acquisition failed: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl OpsConfigReader for ConfigManager {
    async fn approval_charge_limit(&self) -> anyhow::Result<f64> {
        self.get_f64_or(keys::APPROVAL_CHARGE_LIMIT, 5000.0)
    }

    async fn approval_min_markup_pct(&self) -> anyhow::Result<f64> {
        self.get_f64_or(keys::APPROVAL_MIN_MARKUP_PCT, 15.0)
    }

    async fn approval_max_markup_pct(&self) -> anyhow::Result<f64> {
        self.get_f64_or(keys::APPROVAL_MAX_MARKUP_PCT, 100.0)
    }

    async fn approval_line_qty_limit(&self) -> anyhow::Result<f64> {
        self.get_f64_or(keys::APPROVAL_LINE_QTY_LIMIT, 100.0)
    }

    async fn billing_deadline_days(&self) -> anyhow::Result<i64> {
        self.get_i64_or(keys::BILLING_DEADLINE_DAYS, 3)
    }

    async fn overdue_critical_days(&self) -> anyhow::Result<i64> {
        self.get_i64_or(keys::OVERDUE_CRITICAL_DAYS, 7)
    }

    async fn sla_critical_overage_days(&self) -> anyhow::Result<i64> {
        self.get_i64_or(keys::SLA_CRITICAL_OVERAGE_DAYS, 7)
    }

    async fn bottleneck_warning_count(&self) -> anyhow::Result<usize> {
        Ok(self.get_i64_or(keys::BOTTLENECK_WARNING_COUNT, 3)? as usize)
    }

    async fn bottleneck_high_count(&self) -> anyhow::Result<usize> {
        Ok(self.get_i64_or(keys::BOTTLENECK_HIGH_COUNT, 5)? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager_with_memory_db() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let manager = manager_with_memory_db();
        assert_eq!(manager.approval_charge_limit().await.unwrap(), 5000.0);
        assert_eq!(manager.billing_deadline_days().await.unwrap(), 3);
        assert_eq!(manager.bottleneck_high_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_override_and_read_back() {
        let manager = manager_with_memory_db();
        manager
            .set_config_value(keys::APPROVAL_CHARGE_LIMIT, "7500")
            .unwrap();
        assert_eq!(manager.approval_charge_limit().await.unwrap(), 7500.0);

        // Upsert path
        manager
            .set_config_value(keys::APPROVAL_CHARGE_LIMIT, "6000")
            .unwrap();
        assert_eq!(manager.approval_charge_limit().await.unwrap(), 6000.0);
    }
}
