// ==========================================
// SKD 套件追踪系统 - 领域类型定义
// ==========================================
// 职责: 生命周期状态码、软删除状态、生命周期配置、参考时钟
// 红线: 核心逻辑不读取系统时钟, 一律由调用方注入
// ==========================================

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// VIN 固定长度
pub const VIN_LEN: usize = 17;

// ==========================================
// 套件状态码 (Kit Status Code)
// ==========================================
// 顺序: CUSTOM_RECEIVED < PLAN_BUILD < BUILD_START < BUILD_COMPLETED < GATE_RELEASED < WHOLE_SALE
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitStatusCode {
    CustomReceived, // 报关单已接收
    PlanBuild,      // 计划装配
    BuildStart,     // 开始装配
    BuildCompleted, // 装配完成
    GateReleased,   // 出厂放行
    WholeSale,      // 批发交付
}

impl KitStatusCode {
    /// 按生命周期顺序排列的全部状态码
    pub const ALL: [KitStatusCode; 6] = [
        KitStatusCode::CustomReceived,
        KitStatusCode::PlanBuild,
        KitStatusCode::BuildStart,
        KitStatusCode::BuildCompleted,
        KitStatusCode::GateReleased,
        KitStatusCode::WholeSale,
    ];

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            KitStatusCode::CustomReceived => "CUSTOM_RECEIVED",
            KitStatusCode::PlanBuild => "PLAN_BUILD",
            KitStatusCode::BuildStart => "BUILD_START",
            KitStatusCode::BuildCompleted => "BUILD_COMPLETED",
            KitStatusCode::GateReleased => "GATE_RELEASED",
            KitStatusCode::WholeSale => "WHOLE_SALE",
        }
    }

    /// 从数据库字符串解析（未知值返回 None）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CUSTOM_RECEIVED" => Some(KitStatusCode::CustomReceived),
            "PLAN_BUILD" => Some(KitStatusCode::PlanBuild),
            "BUILD_START" => Some(KitStatusCode::BuildStart),
            "BUILD_COMPLETED" => Some(KitStatusCode::BuildCompleted),
            "GATE_RELEASED" => Some(KitStatusCode::GateReleased),
            "WHOLE_SALE" => Some(KitStatusCode::WholeSale),
            _ => None,
        }
    }

    /// 合作方状态码（回传状态用）
    pub fn partner_status_code(&self) -> &'static str {
        match self {
            KitStatusCode::CustomReceived => "FPCR",
            KitStatusCode::PlanBuild => "FPBP",
            KitStatusCode::BuildStart => "FPBS",
            KitStatusCode::BuildCompleted => "FPBC",
            KitStatusCode::GateReleased => "FPGR",
            KitStatusCode::WholeSale => "FPWS",
        }
    }

    /// 从合作方状态码反查
    pub fn from_partner_status_code(code: &str) -> Option<Self> {
        let code = code.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.partner_status_code() == code)
    }

    /// 默认描述
    pub fn default_description(&self) -> &'static str {
        match self {
            KitStatusCode::CustomReceived => "Custom Received",
            KitStatusCode::PlanBuild => "Plan Build",
            KitStatusCode::BuildStart => "Build Start",
            KitStatusCode::BuildCompleted => "Build Completed",
            KitStatusCode::GateReleased => "Gate Released",
            KitStatusCode::WholeSale => "Wholesale",
        }
    }
}

impl fmt::Display for KitStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 记录状态 (Record State)
// ==========================================
// 软删除即状态: 有效 / 已移除(带时间戳)
// 用于状态事件、VIN 记录、组件扫码记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    Active,
    Removed { removed_at: DateTime<Utc> },
}

impl RecordState {
    pub fn is_active(&self) -> bool {
        matches!(self, RecordState::Active)
    }

    pub fn removed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordState::Active => None,
            RecordState::Removed { removed_at } => Some(*removed_at),
        }
    }

    /// 从存储层的 removed_at 列还原
    pub fn from_removed_at(removed_at: Option<DateTime<Utc>>) -> Self {
        match removed_at {
            Some(removed_at) => RecordState::Removed { removed_at },
            None => RecordState::Active,
        }
    }
}

// ==========================================
// 生命周期配置 (Lifecycle Settings)
// ==========================================
/// 状态机日期校验所需的配置值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// PLAN_BUILD 日期距 CUSTOM_RECEIVED 日期的最小天数
    pub plan_build_lead_time_days: i64,
    /// CUSTOM_RECEIVED 日期需早于参考日期的最小天数（0 表示严格早于即可）
    pub custom_received_lead_time_days: i64,
    /// 批次级 CUSTOM_RECEIVED 日期最多可回溯的月数
    pub custom_received_max_age_months: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            plan_build_lead_time_days: 10,
            custom_received_lead_time_days: 0,
            custom_received_max_age_months: 6,
        }
    }
}

// ==========================================
// 参考时钟 (Reference Clock)
// ==========================================

/// "当前时间"提供者，由调用方注入
pub trait ReferenceClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ReferenceClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试/回放用）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ReferenceClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 单次操作的时间上下文
///
/// - reference_date: 业务参考日期（日期规则比较用）
/// - recorded_at: 审计时间戳（created_at / removed_at）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationClock {
    pub reference_date: NaiveDateTime,
    pub recorded_at: DateTime<Utc>,
}

impl OperationClock {
    pub fn new(reference_date: NaiveDateTime, recorded_at: DateTime<Utc>) -> Self {
        Self {
            reference_date,
            recorded_at,
        }
    }

    /// 以同一时刻作为参考日期与审计时间
    pub fn from_instant(now: DateTime<Utc>) -> Self {
        Self {
            reference_date: now.naive_utc(),
            recorded_at: now,
        }
    }
}
