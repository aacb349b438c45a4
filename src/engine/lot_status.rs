// ==========================================
// SKD 套件追踪系统 - 批次状态事件
// ==========================================
// 职责: 对批次内全部套件原子地应用同一状态事件
// 红线: 只做批次级校验（重复 + CUSTOM_RECEIVED 日期）, 不逐套件重跑前置/后置/VIN/未来日期规则
// 红线: 批次校验失败时, 批次内任何套件都不变更
// ==========================================

use crate::domain::kit::{Kit, StatusEvent};
use crate::domain::reference::Lot;
use crate::domain::types::{KitStatusCode, LifecycleSettings, OperationClock};
use crate::engine::error::{KitRuleViolation, RuleResult};
use chrono::{Months, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// LotStatusEventRequest - 批次状态事件请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotStatusEventRequest {
    pub code: KitStatusCode,
    pub event_date: NaiveDateTime,
    pub note: String,
}

impl LotStatusEventRequest {
    pub fn new(code: KitStatusCode, event_date: NaiveDateTime, note: &str) -> Self {
        Self {
            code,
            event_date,
            note: note.to_string(),
        }
    }
}

// ==========================================
// LotBatchEventApplier
// ==========================================
pub struct LotBatchEventApplier<'a> {
    settings: &'a LifecycleSettings,
}

impl<'a> LotBatchEventApplier<'a> {
    pub fn new(settings: &'a LifecycleSettings) -> Self {
        Self { settings }
    }

    /// 批次级校验
    ///
    /// 1. 批次内任一套件已有相同 (code, event_date) 的有效事件
    /// 2. CUSTOM_RECEIVED: 须早于参考时刻, 且日期不早于 N 个月前
    pub fn validate(
        &self,
        lot: &Lot,
        kits: &[Kit],
        request: &LotStatusEventRequest,
        reference_date: NaiveDateTime,
    ) -> RuleResult<()> {
        let duplicate = kits.iter().find(|kit| {
            kit.active_status_events()
                .any(|e| e.code == request.code && e.event_date == request.event_date)
        });
        if let Some(kit) = duplicate {
            return Err(KitRuleViolation::Duplicate(format!(
                "批次 {} 的套件 {} 已存在 {} {} 事件",
                lot.lot_no,
                kit.kit_no(),
                request.code,
                request.event_date.date()
            )));
        }

        if request.code == KitStatusCode::CustomReceived {
            if request.event_date >= reference_date {
                return Err(KitRuleViolation::DateConstraintViolation(format!(
                    "报关接收日期 {} 必须早于当前时间 {}",
                    request.event_date, reference_date
                )));
            }

            let event_day = request.event_date.date();
            let reference_day = reference_date.date();

            let max_age = self.settings.custom_received_max_age_months;
            let oldest = reference_day.checked_sub_months(Months::new(max_age));
            if oldest.is_some_and(|oldest| event_day < oldest) {
                return Err(KitRuleViolation::DateConstraintViolation(format!(
                    "报关接收日期 {} 不能早于 {} 个月前",
                    event_day, max_age
                )));
            }
        }

        Ok(())
    }

    /// 校验后对全部套件执行软删除 + 追加
    ///
    /// 返回每个套件新增的事件（与 kits 顺序一致）
    pub fn apply(
        &self,
        lot: &Lot,
        kits: &mut [Kit],
        request: &LotStatusEventRequest,
        clock: &OperationClock,
    ) -> RuleResult<Vec<StatusEvent>> {
        self.validate(lot, kits, request, clock.reference_date)?;

        let events = kits
            .iter_mut()
            .map(|kit| {
                let event = StatusEvent::new(
                    request.code,
                    request.event_date,
                    &request.note,
                    clock.recorded_at,
                );
                kit.supersede_and_append_event(event.clone(), clock.recorded_at);
                event
            })
            .collect();

        Ok(events)
    }
}
