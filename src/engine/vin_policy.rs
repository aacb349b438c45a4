// ==========================================
// SKD 套件追踪系统 - VIN 分配策略
// ==========================================
// 职责: 校验并应用 VIN 变更, 维护 VIN 历史
// 红线: 全局唯一性通过注入的 VinIndex 查询, 不直接访问存储
// ==========================================

use crate::domain::event_type::EventTypeCatalog;
use crate::domain::kit::{Kit, VinRecord};
use crate::domain::types::{KitStatusCode, OperationClock, VIN_LEN};
use crate::engine::error::{KitRuleViolation, RuleResult};
use std::collections::HashMap;

// ==========================================
// VinIndex - 全局有效 VIN 查询能力
// ==========================================
pub trait VinIndex {
    /// 当前持有该 VIN（有效记录）的套件号
    fn active_holder(&self, vin: &str) -> Option<String>;

    fn is_active(&self, vin: &str) -> bool {
        self.active_holder(vin).is_some()
    }
}

/// vin -> kit_no
impl VinIndex for HashMap<String, String> {
    fn active_holder(&self, vin: &str) -> Option<String> {
        self.get(vin).cloned()
    }
}

// ==========================================
// VinAssignmentPolicy
// ==========================================
pub struct VinAssignmentPolicy<'a> {
    catalog: &'a EventTypeCatalog,
}

impl<'a> VinAssignmentPolicy<'a> {
    pub fn new(catalog: &'a EventTypeCatalog) -> Self {
        Self { catalog }
    }

    /// 校验 VIN
    ///
    /// # 顺序
    /// 1. 不含空白字符
    /// 2. 长度等于 VIN_LEN
    /// 3. 与当前 VIN 不同
    /// 4. 未被其他套件占用
    /// 5. 当前状态为 PLAN_BUILD 或尚无状态事件
    pub fn validate(&self, kit: &Kit, vin: &str, index: &dyn VinIndex) -> RuleResult<()> {
        if vin.chars().any(char::is_whitespace) {
            return Err(KitRuleViolation::FormatViolation(
                "VIN 不能包含空白字符".to_string(),
            ));
        }

        let len = vin.chars().count();
        if len != VIN_LEN {
            return Err(KitRuleViolation::FormatViolation(format!(
                "VIN 长度必须为 {} 位, 实际 {} 位",
                VIN_LEN, len
            )));
        }

        if kit.vin() == Some(vin) {
            return Err(KitRuleViolation::Duplicate(format!(
                "套件 {} 的 VIN 已经是 {}",
                kit.kit_no(),
                vin
            )));
        }

        if let Some(holder) = index.active_holder(vin) {
            if holder != kit.kit_no() {
                return Err(KitRuleViolation::UniquenessViolation(format!(
                    "VIN {} 已被套件 {} 使用",
                    vin, holder
                )));
            }
        }

        match kit.current_status(self.catalog) {
            None | Some(KitStatusCode::PlanBuild) => Ok(()),
            Some(status) => Err(KitRuleViolation::SequenceViolation(format!(
                "套件 {} 当前状态为 {}, 只有 {} 状态可分配 VIN",
                kit.kit_no(),
                status,
                KitStatusCode::PlanBuild
            ))),
        }
    }

    /// 校验并分配 VIN, 返回新的 VIN 记录
    pub fn assign(
        &self,
        kit: &mut Kit,
        vin: &str,
        index: &dyn VinIndex,
        clock: &OperationClock,
    ) -> RuleResult<VinRecord> {
        self.validate(kit, vin, index)?;
        let record = VinRecord::new(vin, clock.recorded_at);
        kit.replace_vin(record.clone(), clock.recorded_at);
        Ok(record)
    }
}
