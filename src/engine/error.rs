// ==========================================
// SKD 套件追踪系统 - 业务规则错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 规则按固定顺序校验, 首个失败即返回
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    SequenceViolation,
    DateConstraintViolation,
    MissingPrerequisiteData,
    FormatViolation,
    UniquenessViolation,
    ConfigurationError,
}

/// 业务规则违反
///
/// 每个变体携带可直接展示的原因说明
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KitRuleViolation {
    #[error("记录不存在: {0}")]
    NotFound(String),

    #[error("重复记录: {0}")]
    Duplicate(String),

    #[error("状态顺序违反: {0}")]
    SequenceViolation(String),

    #[error("日期约束违反: {0}")]
    DateConstraintViolation(String),

    #[error("缺少前置数据: {0}")]
    MissingPrerequisiteData(String),

    #[error("格式错误: {0}")]
    FormatViolation(String),

    #[error("唯一性冲突: {0}")]
    UniquenessViolation(String),

    #[error("配置错误: {0}")]
    ConfigurationError(String),
}

impl KitRuleViolation {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KitRuleViolation::NotFound(_) => ErrorKind::NotFound,
            KitRuleViolation::Duplicate(_) => ErrorKind::Duplicate,
            KitRuleViolation::SequenceViolation(_) => ErrorKind::SequenceViolation,
            KitRuleViolation::DateConstraintViolation(_) => ErrorKind::DateConstraintViolation,
            KitRuleViolation::MissingPrerequisiteData(_) => ErrorKind::MissingPrerequisiteData,
            KitRuleViolation::FormatViolation(_) => ErrorKind::FormatViolation,
            KitRuleViolation::UniquenessViolation(_) => ErrorKind::UniquenessViolation,
            KitRuleViolation::ConfigurationError(_) => ErrorKind::ConfigurationError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            KitRuleViolation::NotFound(msg)
            | KitRuleViolation::Duplicate(msg)
            | KitRuleViolation::SequenceViolation(msg)
            | KitRuleViolation::DateConstraintViolation(msg)
            | KitRuleViolation::MissingPrerequisiteData(msg)
            | KitRuleViolation::FormatViolation(msg)
            | KitRuleViolation::UniquenessViolation(msg)
            | KitRuleViolation::ConfigurationError(msg) => msg,
        }
    }
}

/// Result 类型别名
pub type RuleResult<T> = Result<T, KitRuleViolation>;
