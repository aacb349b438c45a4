// ==========================================
// SKD 套件追踪系统 - 组件清单同步
// ==========================================
// 职责: 按车型配置 + 组件-工位映射模板重算套件的 (组件, 工位) 清单
// 红线: 有扫码历史的组件永不移除
// 红线: 已匹配的组件保持原样（扫码、核验时间、手动改过的工位）
// ==========================================

use crate::domain::event_type::EventTypeCatalog;
use crate::domain::kit::{Kit, KitComponent};
use crate::domain::reference::{StationMappingEntry, VehicleProfile};
use crate::domain::types::KitStatusCode;
use crate::engine::error::{KitRuleViolation, RuleResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// (组件, 工位) 组合
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentStationPair {
    pub component_code: String,
    pub station_code: String,
}

impl From<&KitComponent> for ComponentStationPair {
    fn from(c: &KitComponent) -> Self {
        Self {
            component_code: c.component_code.clone(),
            station_code: c.station_code.clone(),
        }
    }
}

impl From<&StationMappingEntry> for ComponentStationPair {
    fn from(m: &StationMappingEntry) -> Self {
        Self {
            component_code: m.component_code.clone(),
            station_code: m.station_code.clone(),
        }
    }
}

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSyncReport {
    pub kit_no: String,
    pub added: Vec<ComponentStationPair>,
    pub removed: Vec<ComponentStationPair>,
    /// 不再需要但因有扫码历史而保留的组件
    pub retained_with_history: Vec<ComponentStationPair>,
}

impl ComponentSyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

// ==========================================
// ComponentAssignmentReconciler
// ==========================================
pub struct ComponentAssignmentReconciler;

impl ComponentAssignmentReconciler {
    /// 目标清单: 车型所需组件的映射条目, 按工位顺序稳定排序
    pub fn target_mappings(
        profile: &VehicleProfile,
        mappings: &[StationMappingEntry],
    ) -> RuleResult<Vec<StationMappingEntry>> {
        if profile.required_component_codes.is_empty() {
            return Err(KitRuleViolation::ConfigurationError(format!(
                "车型配置 {} 没有任何组件, 不能分配给套件",
                profile.code
            )));
        }

        let mut target: Vec<StationMappingEntry> = mappings
            .iter()
            .filter(|m| profile.requires(&m.component_code))
            .cloned()
            .collect();
        target.sort_by_key(|m| m.station_sequence);
        Ok(target)
    }

    /// 同步套件组件清单
    ///
    /// # 步骤
    /// 1. 计算目标清单
    /// 2. 移除组件代码不在目标中且无扫码历史的组件
    /// 3. 补充目标中缺失的 (组件, 工位)
    pub fn reconcile(
        kit: &mut Kit,
        profile: &VehicleProfile,
        mappings: &[StationMappingEntry],
    ) -> RuleResult<ComponentSyncReport> {
        let target = Self::target_mappings(profile, mappings)?;
        let target_codes: HashSet<&str> =
            target.iter().map(|m| m.component_code.as_str()).collect();

        let mut report = ComponentSyncReport {
            kit_no: kit.kit_no().to_string(),
            ..ComponentSyncReport::default()
        };

        report.retained_with_history = kit
            .components()
            .iter()
            .filter(|c| !target_codes.contains(c.component_code.as_str()) && c.has_serial_history())
            .map(ComponentStationPair::from)
            .collect();

        report.removed = kit
            .remove_components_where(|c| {
                !target_codes.contains(c.component_code.as_str()) && !c.has_serial_history()
            })
            .iter()
            .map(ComponentStationPair::from)
            .collect();

        for entry in &target {
            if kit
                .find_component(&entry.component_code, &entry.station_code)
                .is_none()
            {
                kit.push_component(KitComponent::new(&entry.component_code, &entry.station_code));
                report.added.push(ComponentStationPair::from(entry));
            }
        }

        Ok(report)
    }

    /// 批量同步资格: 当前状态早于 BUILD_COMPLETED
    pub fn is_eligible(kit: &Kit, catalog: &EventTypeCatalog) -> RuleResult<bool> {
        let threshold = catalog
            .sequence_of(KitStatusCode::BuildCompleted)
            .ok_or_else(|| {
                KitRuleViolation::ConfigurationError(format!(
                    "事件类型未配置: {}",
                    KitStatusCode::BuildCompleted
                ))
            })?;
        Ok(kit.current_status_sequence(catalog) < threshold)
    }
}
