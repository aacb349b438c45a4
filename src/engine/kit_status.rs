// ==========================================
// SKD 套件追踪系统 - 套件状态事件状态机
// ==========================================
// 职责: 校验并应用单个套件的生命周期事件
// 红线: 无 I/O, 参考日期由调用方注入
// 红线: 校验按固定顺序执行, 首个失败即返回, 失败时零变更
// ==========================================

use crate::domain::event_type::{EventType, EventTypeCatalog};
use crate::domain::kit::{Kit, StatusEvent};
use crate::domain::reference::Dealer;
use crate::domain::types::{KitStatusCode, LifecycleSettings, OperationClock};
use crate::engine::error::{KitRuleViolation, RuleResult};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 该阶段之后的事件要求套件已有 VIN
pub const VIN_REQUIRED_AFTER: KitStatusCode = KitStatusCode::PlanBuild;

/// 该阶段之后的事件日期不得晚于参考日期
pub const NO_FUTURE_DATE_AFTER: KitStatusCode = KitStatusCode::BuildStart;

// ==========================================
// DealerDirectory - 经销商查询能力
// ==========================================
pub trait DealerDirectory {
    fn find_dealer(&self, code: &str) -> Option<Dealer>;
}

impl DealerDirectory for Vec<Dealer> {
    fn find_dealer(&self, code: &str) -> Option<Dealer> {
        self.iter().find(|d| d.code == code).cloned()
    }
}

impl DealerDirectory for HashMap<String, Dealer> {
    fn find_dealer(&self, code: &str) -> Option<Dealer> {
        self.get(code).cloned()
    }
}

// ==========================================
// StatusEventRequest - 状态事件请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEventRequest {
    pub code: KitStatusCode,
    pub event_date: NaiveDateTime,
    pub note: String,
    pub dealer_code: Option<String>,
}

impl StatusEventRequest {
    pub fn new(code: KitStatusCode, event_date: NaiveDateTime, note: &str) -> Self {
        Self {
            code,
            event_date,
            note: note.to_string(),
            dealer_code: None,
        }
    }

    pub fn with_dealer(mut self, dealer_code: &str) -> Self {
        self.dealer_code = Some(dealer_code.to_string());
        self
    }

    /// 非空白的经销商代码
    pub fn dealer_code(&self) -> Option<&str> {
        self.dealer_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

// ==========================================
// KitStatusEventStateMachine
// ==========================================
pub struct KitStatusEventStateMachine<'a> {
    catalog: &'a EventTypeCatalog,
    settings: &'a LifecycleSettings,
}

impl<'a> KitStatusEventStateMachine<'a> {
    pub fn new(catalog: &'a EventTypeCatalog, settings: &'a LifecycleSettings) -> Self {
        Self { catalog, settings }
    }

    /// 校验并应用状态事件（主入口）
    ///
    /// # 应用
    /// 1. 软删除同类型的有效事件
    /// 2. 追加新事件
    /// 3. WHOLE_SALE 且提供经销商代码时关联经销商
    ///
    /// # 返回
    /// - Ok(StatusEvent): 新创建的事件
    /// - Err(KitRuleViolation): 首个失败的规则, 套件未被修改
    pub fn create_event(
        &self,
        kit: &mut Kit,
        request: &StatusEventRequest,
        dealers: &dyn DealerDirectory,
        clock: &OperationClock,
    ) -> RuleResult<StatusEvent> {
        let dealer = self.validate(kit, request, dealers, clock.reference_date)?;

        let event = StatusEvent::new(
            request.code,
            request.event_date,
            &request.note,
            clock.recorded_at,
        );
        kit.supersede_and_append_event(event.clone(), clock.recorded_at);

        if let Some(dealer) = dealer {
            kit.set_dealer(&dealer.code);
        }

        Ok(event)
    }

    /// 校验状态事件
    ///
    /// # 顺序
    /// 1. 重复事件 (code, event_date, note)
    /// 2. 缺少前一阶段事件
    /// 3. 后一阶段事件已存在
    /// 4. 各类型专属规则
    /// 5. PLAN_BUILD 之后要求 VIN
    /// 6. BUILD_START 之后禁止未来日期
    ///
    /// # 返回
    /// - Ok(Some(Dealer)): WHOLE_SALE 请求解析出的经销商（需关联）
    /// - Ok(None): 校验通过, 无经销商变更
    pub fn validate(
        &self,
        kit: &Kit,
        request: &StatusEventRequest,
        dealers: &dyn DealerDirectory,
        reference_date: NaiveDateTime,
    ) -> RuleResult<Option<Dealer>> {
        // === 规则 1: 重复事件 ===
        let duplicate = kit.active_status_events().any(|e| {
            e.code == request.code && e.event_date == request.event_date && e.note == request.note
        });
        if duplicate {
            return Err(KitRuleViolation::Duplicate(format!(
                "套件 {} 已存在相同状态事件: {} {}",
                kit.kit_no(),
                request.code,
                request.event_date.date()
            )));
        }

        let target = self.event_type(request.code)?;

        // === 规则 2: 前一阶段必须存在 ===
        if let Some(prior) = self.catalog.prior_of(target) {
            if kit.active_event(prior.code).is_none() {
                return Err(KitRuleViolation::SequenceViolation(format!(
                    "缺少前置状态事件 {}",
                    prior.description
                )));
            }
        }

        // === 规则 3: 后一阶段已存在时不可回填 ===
        if let Some(next) = self.catalog.next_of(target) {
            if kit.active_event(next.code).is_some() {
                return Err(KitRuleViolation::SequenceViolation(format!(
                    "{} 已设置, 不能再设置 {}",
                    next.description, target.description
                )));
            }
        }

        // === 规则 4: 各类型专属规则 ===
        let dealer = self.validate_type_rules(kit, request, dealers, reference_date)?;

        // === 规则 5: VIN ===
        let vin_threshold = self.threshold_sequence(VIN_REQUIRED_AFTER)?;
        if target.sequence > vin_threshold && !kit.has_vin() {
            return Err(KitRuleViolation::MissingPrerequisiteData(format!(
                "套件 {} 没有 VIN, 不能保存 {} 事件",
                kit.kit_no(),
                request.code
            )));
        }

        // === 规则 6: 禁止未来日期 ===
        let future_threshold = self.threshold_sequence(NO_FUTURE_DATE_AFTER)?;
        if target.sequence > future_threshold
            && request.event_date.date() > reference_date.date()
        {
            return Err(KitRuleViolation::DateConstraintViolation(format!(
                "{} 事件日期 {} 不能晚于当前日期 {}",
                request.code,
                request.event_date.date(),
                reference_date.date()
            )));
        }

        Ok(dealer)
    }

    fn validate_type_rules(
        &self,
        kit: &Kit,
        request: &StatusEventRequest,
        dealers: &dyn DealerDirectory,
        reference_date: NaiveDateTime,
    ) -> RuleResult<Option<Dealer>> {
        match request.code {
            KitStatusCode::CustomReceived => {
                let window = self.settings.custom_received_lead_time_days;
                let shifted = add_days(request.event_date, window, "报关接收提前天数")?;
                if shifted >= reference_date {
                    return Err(KitRuleViolation::DateConstraintViolation(format!(
                        "报关接收日期必须早于当前日期至少 {} 天",
                        window
                    )));
                }
                Ok(None)
            }
            KitStatusCode::PlanBuild => {
                let custom_received = kit
                    .active_event(KitStatusCode::CustomReceived)
                    .ok_or_else(|| {
                        KitRuleViolation::SequenceViolation(format!(
                            "缺少前置状态事件 {}",
                            KitStatusCode::CustomReceived
                        ))
                    })?;
                let lead_time = self.settings.plan_build_lead_time_days;
                let earliest = add_days(custom_received.event_date, lead_time, "计划装配提前期天数")?;
                if earliest > request.event_date {
                    return Err(KitRuleViolation::DateConstraintViolation(format!(
                        "计划装配日期必须晚于报关接收日期至少 {} 天 (最早 {})",
                        lead_time,
                        earliest.date()
                    )));
                }
                Ok(None)
            }
            KitStatusCode::BuildStart => {
                if !kit.has_active_serial_scan() {
                    return Err(KitRuleViolation::MissingPrerequisiteData(
                        "开始装配状态要求至少一条组件序列号扫码".to_string(),
                    ));
                }
                Ok(None)
            }
            KitStatusCode::WholeSale => match request.dealer_code() {
                None => {
                    if kit.dealer_code().is_none() {
                        return Err(KitRuleViolation::MissingPrerequisiteData(format!(
                            "套件 {} 必须关联经销商",
                            kit.kit_no()
                        )));
                    }
                    Ok(None)
                }
                Some(code) => dealers.find_dealer(code).map(Some).ok_or_else(|| {
                    KitRuleViolation::NotFound(format!("经销商不存在: {}", code))
                }),
            },
            KitStatusCode::BuildCompleted | KitStatusCode::GateReleased => Ok(None),
        }
    }

    fn event_type(&self, code: KitStatusCode) -> RuleResult<&'a EventType> {
        self.catalog.get(code).ok_or_else(|| {
            KitRuleViolation::ConfigurationError(format!("事件类型未配置: {}", code))
        })
    }

    fn threshold_sequence(&self, code: KitStatusCode) -> RuleResult<i32> {
        self.event_type(code).map(|t| t.sequence)
    }

    // ==========================================
    // BUILD_START 自动生成
    // ==========================================

    /// 是否等待生成 BUILD_START: 当前状态为 PLAN_BUILD 且已有有效扫码
    pub fn is_build_start_pending(&self, kit: &Kit) -> bool {
        kit.current_status(self.catalog) == Some(KitStatusCode::PlanBuild)
            && kit.has_active_serial_scan()
    }

    /// 以最早一条有效扫码时间作为 BUILD_START 日期, 无扫码时返回 None
    pub fn build_start_request(kit: &Kit) -> Option<StatusEventRequest> {
        kit.earliest_active_scan_at()
            .map(|at| StatusEventRequest::new(KitStatusCode::BuildStart, at.naive_utc(), ""))
    }

    // ==========================================
    // 合作方回执
    // ==========================================

    /// 记录合作方已确认某状态
    pub fn acknowledge_partner_status(
        kit: &mut Kit,
        partner_status_code: &str,
        at: DateTime<Utc>,
    ) -> RuleResult<StatusEvent> {
        let code = KitStatusCode::from_partner_status_code(partner_status_code).ok_or_else(|| {
            KitRuleViolation::NotFound(format!("未知的合作方状态码: {}", partner_status_code))
        })?;
        let kit_no = kit.kit_no().to_string();
        let event = kit.active_event_mut(code).ok_or_else(|| {
            KitRuleViolation::NotFound(format!(
                "套件 {} 没有 {} 状态事件",
                kit_no, partner_status_code
            ))
        })?;
        event.partner_ack_at = Some(at);
        Ok(event.clone())
    }
}

/// 日期加天数; 天数为负或超出范围视为配置错误, 结果溢出视为日期约束错误
fn add_days(date: NaiveDateTime, days: i64, setting: &str) -> RuleResult<NaiveDateTime> {
    if days < 0 {
        return Err(KitRuleViolation::ConfigurationError(format!(
            "{} 不能为负数: {}",
            setting, days
        )));
    }
    let delta = TimeDelta::try_days(days).ok_or_else(|| {
        KitRuleViolation::ConfigurationError(format!("{} 超出范围: {}", setting, days))
    })?;
    date.checked_add_signed(delta).ok_or_else(|| {
        KitRuleViolation::DateConstraintViolation(format!(
            "日期 {} 加 {} 天超出可表示范围",
            date.date(),
            days
        ))
    })
}
