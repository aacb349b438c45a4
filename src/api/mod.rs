// ==========================================
// SKD 套件追踪系统 - API 层
// ==========================================
// 职责: 对外操作入口（加载聚合 → 规则引擎 → 保存）
// ==========================================

pub mod component_station_api;
pub mod error;
pub mod kit_api;

// 重导出核心类型
pub use component_station_api::ComponentStationApi;
pub use error::{ApiError, ApiResult, ValidationViolation};
pub use kit_api::{
    BuildStartGenerationResult, BulkReconcileResult, ChangeComponentStationInput,
    CreateKitStatusEventInput, CreateLotStatusEventInput, KitApi, LotStatusEventResult,
    SkippedKit,
};
