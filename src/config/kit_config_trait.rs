// ==========================================
// SKD 套件追踪系统 - 生命周期配置读取 Trait
// ==========================================
// 职责: 定义状态机所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::LifecycleSettings;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// KitConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait KitConfigReader: Send + Sync {
    /// PLAN_BUILD 日期距 CUSTOM_RECEIVED 日期的最小天数
    ///
    /// # 默认值
    /// - 10
    async fn get_plan_build_lead_time_days(&self) -> Result<i64, Box<dyn Error>>;

    /// CUSTOM_RECEIVED 日期需早于参考日期的最小天数
    ///
    /// # 默认值
    /// - 0（严格早于参考日期即可）
    async fn get_custom_received_lead_time_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 批次级 CUSTOM_RECEIVED 日期最多可回溯的月数
    ///
    /// # 默认值
    /// - 6
    async fn get_custom_received_max_age_months(&self) -> Result<u32, Box<dyn Error>>;

    /// 组装状态机配置
    async fn get_lifecycle_settings(&self) -> Result<LifecycleSettings, Box<dyn Error>> {
        let plan_build_lead_time_days = self.get_plan_build_lead_time_days().await?;
        let custom_received_lead_time_days = self.get_custom_received_lead_time_days().await?;
        let custom_received_max_age_months = self.get_custom_received_max_age_months().await?;

        Ok(LifecycleSettings {
            plan_build_lead_time_days,
            custom_received_lead_time_days,
            custom_received_max_age_months,
        })
    }
}
