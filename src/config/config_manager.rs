// ==========================================
// 包装 ERP - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("config lock poisoned: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("config lock poisoned: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("config lock poisoned: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式，键有序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("config lock poisoned: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置；缺失或格式错误时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        let raw = match self.get_global_value(key)? {
            Some(raw) => raw,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_persist_timeout_ms(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(
            config_keys::IMPORT_PERSIST_TIMEOUT_MS,
            defaults::PERSIST_TIMEOUT_MS,
        )
    }

    async fn get_reconcile_amount_tolerance(&self) -> ConfigResult<f64> {
        let value = self.get_parsed_or_default(
            config_keys::RECONCILE_AMOUNT_TOLERANCE,
            defaults::AMOUNT_TOLERANCE,
        )?;
        // 负容差无意义
        Ok(value.max(0.0))
    }

    async fn get_reconcile_date_window_days(&self) -> ConfigResult<i64> {
        let value = self.get_parsed_or_default(
            config_keys::RECONCILE_DATE_WINDOW_DAYS,
            defaults::DATE_WINDOW_DAYS,
        )?;
        Ok(value.max(0))
    }

    async fn get_invoice_tax_rate(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::INVOICE_TAX_RATE, defaults::TAX_RATE)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const IMPORT_PERSIST_TIMEOUT_MS: &str = "import.persist_timeout_ms";

    // 银行对账
    pub const RECONCILE_AMOUNT_TOLERANCE: &str = "reconcile.amount_tolerance";
    pub const RECONCILE_DATE_WINDOW_DAYS: &str = "reconcile.date_window_days";

    // 发票
    pub const INVOICE_TAX_RATE: &str = "invoice.tax_rate";
}

/// 配置默认值
pub mod defaults {
    pub const PERSIST_TIMEOUT_MS: u64 = 10_000;
    pub const AMOUNT_TOLERANCE: f64 = 0.01;
    pub const DATE_WINDOW_DAYS: i64 = 3;
    pub const TAX_RATE: f64 = 0.16;
}
