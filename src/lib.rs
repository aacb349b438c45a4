// ==========================================
// SKD 套件追踪系统 - 核心库
// ==========================================
// 职责: 套件生命周期状态机、批次事件、组件清单同步、VIN 分配
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 业务规则（纯内存）
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    FixedClock, KitStatusCode, LifecycleSettings, OperationClock, RecordState, ReferenceClock,
    SystemClock,
};

// 领域实体
pub use domain::{EventType, EventTypeCatalog, Kit, KitComponent, StatusEvent, VinRecord};

// 引擎
pub use engine::{
    ComponentAssignmentReconciler, ErrorKind, KitRuleViolation, KitStatusEventStateMachine,
    LotBatchEventApplier, VinAssignmentPolicy, VinIndex,
};

// API
pub use api::{ApiError, ApiResult, ComponentStationApi, KitApi};

// ==========================================
// 系统常量
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const SYSTEM_NAME: &str = "SKD 套件追踪系统";
