// ==========================================
// SKD 套件追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、聚合
// 红线: 不含数据访问逻辑, 不含校验规则（规则在 engine 层）
// ==========================================

pub mod event_type;
pub mod kit;
pub mod reference;
pub mod types;

// 重导出核心类型
pub use event_type::{EventType, EventTypeCatalog};
pub use kit::{ComponentSerial, Kit, KitComponent, StatusEvent, VinRecord};
pub use reference::{
    Component, Dealer, Lot, ProductionStation, StationMappingEntry, StationMappingInput,
    VehicleProfile,
};
pub use types::{
    FixedClock, KitStatusCode, LifecycleSettings, OperationClock, RecordState, ReferenceClock,
    SystemClock, VIN_LEN,
};
