// ==========================================
// SKD 套件追踪系统 - 规则引擎层
// ==========================================
// 职责: 状态机、批次事件、组件清单同步、VIN 策略
// 红线: 纯内存计算, 不做 I/O, 不读系统时钟
// ==========================================

pub mod component_reconciler;
pub mod component_station;
pub mod error;
pub mod kit_status;
pub mod lot_status;
pub mod vin_policy;

// 重导出核心类型
pub use component_reconciler::{
    ComponentAssignmentReconciler, ComponentStationPair, ComponentSyncReport,
};
pub use component_station::{capture_serial, change_station, SerialCapture};
pub use error::{ErrorKind, KitRuleViolation, RuleResult};
pub use kit_status::{
    DealerDirectory, KitStatusEventStateMachine, StatusEventRequest, NO_FUTURE_DATE_AFTER,
    VIN_REQUIRED_AFTER,
};
pub use lot_status::{LotBatchEventApplier, LotStatusEventRequest};
pub use vin_policy::{VinAssignmentPolicy, VinIndex};
