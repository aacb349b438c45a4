// ==========================================
// SKD 套件追踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储与 API 实例
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{ComponentStationApi, KitApi};
use crate::config::ConfigManager;
use crate::db::{configure_sqlite_connection, init_schema, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::domain::types::{ReferenceClock, SystemClock};
use crate::repository::{KitRepository, ReferenceDataRepository};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 套件 API
    pub kit_api: Arc<KitApi>,

    /// 组件-工位映射 API
    pub component_station_api: Arc<ComponentStationApi>,

    /// 套件仓储
    pub kit_repo: Arc<KitRepository>,

    /// 参考数据仓储（批次、车型、组件、工位、经销商）
    pub reference_repo: Arc<ReferenceDataRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 使用系统时钟创建 AppState
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_clock(db_path, Arc::new(SystemClock))
    }

    /// 使用指定参考时钟创建 AppState
    ///
    /// # 说明
    /// 1. 打开共享连接并建表（幂等）
    /// 2. 初始化仓储与配置管理器
    /// 3. 创建 API 实例
    pub fn with_clock(db_path: String, clock: Arc<dyn ReferenceClock>) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = Connection::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        configure_sqlite_connection(&conn).map_err(|e| format!("数据库配置失败: {}", e))?;
        init_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(v)) if v != CURRENT_SCHEMA_VERSION => tracing::warn!(
                schema_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 与当前代码不一致"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "读取 schema_version 失败"),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 仓储层
        // ==========================================
        let kit_repo = Arc::new(KitRepository::from_connection(conn.clone()));
        let reference_repo = Arc::new(ReferenceDataRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );

        // ==========================================
        // API 层
        // ==========================================
        let kit_api = Arc::new(KitApi::new(kit_repo.clone(), config_manager.clone(), clock));
        let component_station_api = Arc::new(ComponentStationApi::new(reference_repo.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            kit_api,
            component_station_api,
            kit_repo,
            reference_repo,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 SKD_KIT_TRACKER_DB_PATH, 否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SKD_KIT_TRACKER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./skd_kit_tracker.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("skd-kit-tracker");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("skd_kit_tracker.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
