// ==========================================
// SKD 套件追踪系统 - 参考数据
// ==========================================
// 职责: 批次、车型配置(PCV)、组件、工位、组件-工位映射模板、经销商
// 红线: 只读输入, 核心逻辑不修改参考数据
// ==========================================

use serde::{Deserialize, Serialize};

/// 批次（同一发运/生产分组的套件集合）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_no: String,
    pub pcv_code: String,
}

/// 车型配置（PCV）: 规定套件所需组件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub code: String,
    pub description: String,
    pub required_component_codes: Vec<String>,
}

impl VehicleProfile {
    pub fn requires(&self, component_code: &str) -> bool {
        self.required_component_codes
            .iter()
            .any(|c| c == component_code)
    }
}

/// 组件（需采集序列号的零件类别）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub code: String,
    pub name: String,
}

/// 生产工位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStation {
    pub code: String,
    pub name: String,
    pub sequence: i32,
}

/// 组件-工位映射模板条目（全局，与具体套件无关）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationMappingEntry {
    pub component_code: String,
    pub station_code: String,
    pub station_sequence: i32,
}

/// 组件-工位映射维护输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationMappingInput {
    pub component_code: String,
    pub station_code: String,
}

/// 经销商
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dealer {
    pub code: String,
    pub name: String,
}
