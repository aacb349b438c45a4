// ==========================================
// SKD 套件追踪系统 - 配置层
// ==========================================
// 职责: 生命周期日期规则配置
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod kit_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use kit_config_trait::KitConfigReader;
