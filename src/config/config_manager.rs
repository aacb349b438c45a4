// ==========================================
// SKD 套件追踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::kit_config_trait::KitConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 天数类配置的合法范围
const LEAD_TIME_DAYS_RANGE: RangeInclusive<i64> = 0..=3650;

/// 月数类配置的合法范围
const MAX_AGE_MONTHS_RANGE: RangeInclusive<u32> = 0..=120;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

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

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        tracing::info!(config_key = key, config_value = value, "配置已更新");
        Ok(())
    }

    /// 读取数值型配置, 缺失、格式错误或超出范围时使用默认值
    fn get_parsed_or_default<T>(
        &self,
        key: &str,
        default: T,
        range: RangeInclusive<T>,
    ) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + PartialOrd + std::fmt::Display,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) if range.contains(&value) => Ok(value),
            Ok(value) => {
                tracing::warn!(
                    config_key = key,
                    value = %value,
                    min = %range.start(),
                    max = %range.end(),
                    default_value = %default,
                    "配置超出范围，使用默认值"
                );
                Ok(default)
            }
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default_value = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// KitConfigReader Trait 实现
// ==========================================
#[async_trait]
impl KitConfigReader for ConfigManager {
    async fn get_plan_build_lead_time_days(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::PLAN_BUILD_LEAD_TIME_DAYS, 10, LEAD_TIME_DAYS_RANGE)
    }

    async fn get_custom_received_lead_time_days(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::CUSTOM_RECEIVED_LEAD_TIME_DAYS, 0, LEAD_TIME_DAYS_RANGE)
    }

    async fn get_custom_received_max_age_months(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::CUSTOM_RECEIVED_MAX_AGE_MONTHS, 6, MAX_AGE_MONTHS_RANGE)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 状态机日期规则
    pub const PLAN_BUILD_LEAD_TIME_DAYS: &str = "plan_build_lead_time_days";
    pub const CUSTOM_RECEIVED_LEAD_TIME_DAYS: &str = "custom_received_lead_time_days";
    pub const CUSTOM_RECEIVED_MAX_AGE_MONTHS: &str = "custom_received_max_age_months";
}
