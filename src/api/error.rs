// ==========================================
// SKD 套件追踪系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换规则错误/仓储错误为调用方可读的错误
// 约定: 所有错误信息包含显式原因
// ==========================================

use crate::engine::error::{ErrorKind, KitRuleViolation};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    /// 生命周期/组件/VIN 规则违反（首个失败的规则）
    #[error(transparent)]
    RuleViolation(#[from] KitRuleViolation),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 批量输入校验失败（累计全部违规项）
    #[error("输入校验失败: {reason}")]
    ValidationFailed {
        reason: String,
        violations: Vec<ValidationViolation>,
    },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 规则错误类别（非规则错误返回 None）
    pub fn rule_kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::RuleViolation(v) => Some(v.kind()),
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                kit_no,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "套件{}已被其他操作修改（期望revision={}，实际revision={}）",
                kit_no, expected, actual
            )),

            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 校验违规详情
// ==========================================

/// 校验违规详情
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationViolation {
    /// 违规类型（EMPTY_INPUT / BLANK_CODE / UNKNOWN_COMPONENT / UNKNOWN_STATION）
    pub violation_type: String,
    /// 违规原因
    pub reason: String,
}

impl ValidationViolation {
    pub fn new(violation_type: &str, reason: impl Into<String>) -> Self {
        Self {
            violation_type: violation_type.to_string(),
            reason: reason.into(),
        }
    }
}
