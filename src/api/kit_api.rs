// ==========================================
// SKD 套件追踪系统 - 套件 API
// ==========================================
// 职责: 状态事件（单套件/批次）、组件清单同步、VIN 分配、扫码、工位调整、合作方回执
// 红线: 每个操作在一个事务中完成（加载 → 规则 → 保存）, 规则失败时事务回滚
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::KitConfigReader;
use crate::domain::kit::{ComponentSerial, Kit, StatusEvent, VinRecord};
use crate::domain::reference::{Dealer, StationMappingEntry, VehicleProfile};
use crate::domain::types::{KitStatusCode, LifecycleSettings, OperationClock, ReferenceClock};
use crate::engine::component_reconciler::{ComponentAssignmentReconciler, ComponentSyncReport};
use crate::engine::component_station::{self, SerialCapture};
use crate::engine::error::KitRuleViolation;
use crate::engine::kit_status::{KitStatusEventStateMachine, StatusEventRequest};
use crate::engine::lot_status::{LotBatchEventApplier, LotStatusEventRequest};
use crate::engine::vin_policy::VinAssignmentPolicy;
use crate::repository::kit_repo::{KitRepository, KitStore};

// ==========================================
// 请求/响应结构
// ==========================================

/// 单套件状态事件请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKitStatusEventInput {
    pub kit_no: String,
    pub event_code: KitStatusCode,
    pub event_date: NaiveDateTime,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub dealer_code: Option<String>,
}

/// 批次状态事件请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLotStatusEventInput {
    pub lot_no: String,
    pub event_code: KitStatusCode,
    pub event_date: NaiveDateTime,
    #[serde(default)]
    pub note: String,
}

/// 批次状态事件结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotStatusEventResult {
    pub lot_no: String,
    pub event_code: KitStatusCode,
    pub kit_nos: Vec<String>,
}

/// 批量组件同步结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkReconcileResult {
    /// 参与同步的套件（状态早于 BUILD_COMPLETED）
    pub kit_nos: Vec<String>,
    /// 清单发生变化的套件数
    pub changed_count: usize,
    pub reports: Vec<ComponentSyncReport>,
}

/// 工位调整请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeComponentStationInput {
    pub kit_no: String,
    pub component_code: String,
    pub from_station_code: String,
    pub to_station_code: String,
}

/// 被跳过的套件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedKit {
    pub kit_no: String,
    pub reason: String,
}

/// BUILD_START 批量生成结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStartGenerationResult {
    pub created: Vec<String>,
    pub skipped: Vec<SkippedKit>,
}

// ==========================================
// KitApi - 套件 API
// ==========================================
pub struct KitApi {
    kit_repo: Arc<KitRepository>,
    config: Arc<dyn KitConfigReader>,
    clock: Arc<dyn ReferenceClock>,
}

impl KitApi {
    pub fn new(
        kit_repo: Arc<KitRepository>,
        config: Arc<dyn KitConfigReader>,
        clock: Arc<dyn ReferenceClock>,
    ) -> Self {
        Self {
            kit_repo,
            config,
            clock,
        }
    }

    fn operation_clock(&self) -> OperationClock {
        OperationClock::from_instant(self.clock.now())
    }

    async fn lifecycle_settings(&self) -> ApiResult<LifecycleSettings> {
        self.config
            .get_lifecycle_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 查询套件聚合
    pub fn get_kit(&self, kit_no: &str) -> ApiResult<Kit> {
        require_non_blank(kit_no, "套件号")?;
        let kit = self.kit_repo.find_kit(kit_no)?;
        kit.ok_or_else(|| KitRuleViolation::NotFound(format!("套件不存在: {}", kit_no)).into())
    }

    // ==========================================
    // 状态事件
    // ==========================================

    /// 创建单套件状态事件
    ///
    /// # 返回
    /// - Ok(StatusEvent): 新创建的事件
    /// - Err(ApiError::RuleViolation): 首个失败的规则
    pub async fn create_kit_status_event(
        &self,
        input: CreateKitStatusEventInput,
    ) -> ApiResult<StatusEvent> {
        require_non_blank(&input.kit_no, "套件号")?;
        let settings = self.lifecycle_settings().await?;
        let clock = self.operation_clock();

        let request = StatusEventRequest {
            code: input.event_code,
            event_date: input.event_date,
            note: input.note.clone(),
            dealer_code: input.dealer_code.clone(),
        };

        let result = self.kit_repo.transaction(|store| {
            let catalog = store.load_event_type_catalog()?;
            let mut kit = require_kit(store, &input.kit_no)?;
            let dealers = requested_dealer(store, &request)?;

            let machine = KitStatusEventStateMachine::new(&catalog, &settings);
            let event = machine.create_event(&mut kit, &request, &dealers, &clock)?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(event)
        });

        match &result {
            Ok(event) => tracing::info!(
                kit_no = %input.kit_no,
                event_code = %event.code,
                event_date = %event.event_date,
                "状态事件已创建"
            ),
            Err(e) => tracing::warn!(
                kit_no = %input.kit_no,
                event_code = %input.event_code,
                error = %e,
                "状态事件创建失败"
            ),
        }
        result
    }

    /// 以最早一条有效扫码时间创建 BUILD_START
    pub async fn create_build_start_event(&self, kit_no: &str) -> ApiResult<StatusEvent> {
        require_non_blank(kit_no, "套件号")?;
        let settings = self.lifecycle_settings().await?;
        let clock = self.operation_clock();

        let result = self.kit_repo.transaction(|store| {
            let catalog = store.load_event_type_catalog()?;
            let mut kit = require_kit(store, kit_no)?;

            let request = KitStatusEventStateMachine::build_start_request(&kit).ok_or_else(|| {
                KitRuleViolation::MissingPrerequisiteData(format!(
                    "套件 {} 没有组件序列号扫码, 无法确定开始装配日期",
                    kit_no
                ))
            })?;
            let machine = KitStatusEventStateMachine::new(&catalog, &settings);
            let event = machine.create_event(&mut kit, &request, &Vec::<Dealer>::new(), &clock)?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(event)
        });

        match &result {
            Ok(event) => tracing::info!(kit_no, event_date = %event.event_date, "BUILD_START 已创建"),
            Err(e) => tracing::warn!(kit_no, error = %e, "BUILD_START 创建失败"),
        }
        result
    }

    /// 为所有"PLAN_BUILD 且已扫码"的套件生成 BUILD_START
    ///
    /// 每个套件都经过完整状态机校验; 校验失败的套件记入 skipped, 其余在同一事务中提交
    pub async fn generate_build_start_events(&self) -> ApiResult<BuildStartGenerationResult> {
        let settings = self.lifecycle_settings().await?;
        let clock = self.operation_clock();

        let result = self.kit_repo.transaction(|store| {
            let catalog = store.load_event_type_catalog()?;
            let machine = KitStatusEventStateMachine::new(&catalog, &settings);
            let mut outcome = BuildStartGenerationResult::default();

            for mut kit in store.list_all_kits()? {
                if !machine.is_build_start_pending(&kit) {
                    continue;
                }
                let Some(request) = KitStatusEventStateMachine::build_start_request(&kit) else {
                    continue;
                };
                match machine.create_event(&mut kit, &request, &Vec::<Dealer>::new(), &clock) {
                    Ok(_) => {
                        store.save_kit(&mut kit)?;
                        outcome.created.push(kit.kit_no().to_string());
                    }
                    Err(violation) => outcome.skipped.push(SkippedKit {
                        kit_no: kit.kit_no().to_string(),
                        reason: violation.to_string(),
                    }),
                }
            }
            Ok::<_, ApiError>(outcome)
        })?;

        tracing::info!(
            created = result.created.len(),
            skipped = result.skipped.len(),
            "BUILD_START 批量生成完成"
        );
        for skipped in &result.skipped {
            tracing::debug!(kit_no = %skipped.kit_no, reason = %skipped.reason, "跳过套件");
        }
        Ok(result)
    }

    /// 对批次内全部套件原子地创建状态事件
    ///
    /// 只做批次级校验（重复 + CUSTOM_RECEIVED 日期）
    pub async fn create_lot_status_event(
        &self,
        input: CreateLotStatusEventInput,
    ) -> ApiResult<LotStatusEventResult> {
        require_non_blank(&input.lot_no, "批次号")?;
        let settings = self.lifecycle_settings().await?;
        let clock = self.operation_clock();
        let request = LotStatusEventRequest::new(input.event_code, input.event_date, &input.note);

        let result = self.kit_repo.transaction(|store| {
            let lot = store.find_lot(&input.lot_no)?.ok_or_else(|| {
                KitRuleViolation::NotFound(format!("批次不存在: {}", input.lot_no))
            })?;
            let mut kits = store.list_kits_in_lot(&lot.lot_no)?;

            let applier = LotBatchEventApplier::new(&settings);
            applier.apply(&lot, &mut kits, &request, &clock)?;
            for kit in &mut kits {
                store.save_kit(kit)?;
            }

            Ok::<_, ApiError>(LotStatusEventResult {
                lot_no: lot.lot_no,
                event_code: input.event_code,
                kit_nos: kits.iter().map(|k| k.kit_no().to_string()).collect(),
            })
        });

        match &result {
            Ok(r) => tracing::info!(
                lot_no = %r.lot_no,
                event_code = %r.event_code,
                kit_count = r.kit_nos.len(),
                "批次状态事件已创建"
            ),
            Err(e) => tracing::warn!(
                lot_no = %input.lot_no,
                event_code = %input.event_code,
                error = %e,
                "批次状态事件创建失败"
            ),
        }
        result
    }

    /// 记录合作方对某状态的回执
    pub fn acknowledge_partner_status(
        &self,
        kit_no: &str,
        partner_status_code: &str,
    ) -> ApiResult<StatusEvent> {
        require_non_blank(kit_no, "套件号")?;
        let clock = self.operation_clock();

        let event = self.kit_repo.transaction(|store| {
            let mut kit = require_kit(store, kit_no)?;
            let event = KitStatusEventStateMachine::acknowledge_partner_status(
                &mut kit,
                partner_status_code,
                clock.recorded_at,
            )?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(event)
        })?;

        tracing::info!(kit_no, partner_status_code, "合作方回执已记录");
        Ok(event)
    }

    // ==========================================
    // 组件清单
    // ==========================================

    /// 按车型配置同步单个套件的组件清单
    pub fn reconcile_kit_components(&self, kit_no: &str) -> ApiResult<ComponentSyncReport> {
        require_non_blank(kit_no, "套件号")?;

        let report = self.kit_repo.transaction(|store| {
            let mut kit = require_kit(store, kit_no)?;
            let profile = load_profile_for_kit(store, &kit)?;
            let mappings = store.list_station_mappings()?;
            reconcile_and_save(store, &mut kit, &profile, &mappings)
        })?;

        tracing::info!(
            kit_no,
            added = report.added.len(),
            removed = report.removed.len(),
            retained = report.retained_with_history.len(),
            "组件清单已同步"
        );
        Ok(report)
    }

    /// 同步所有状态早于 BUILD_COMPLETED 的套件
    ///
    /// 任一套件的车型配置错误都会使整批回滚
    pub fn reconcile_all_eligible_kits(&self) -> ApiResult<BulkReconcileResult> {
        let result = self.kit_repo.transaction(|store| {
            let catalog = store.load_event_type_catalog()?;
            let mappings = store.list_station_mappings()?;
            let mut profiles: HashMap<String, VehicleProfile> = HashMap::new();
            let mut result = BulkReconcileResult::default();

            for mut kit in store.list_all_kits()? {
                if !ComponentAssignmentReconciler::is_eligible(&kit, &catalog)? {
                    continue;
                }

                let lot = store.find_lot(kit.lot_no())?.ok_or_else(|| {
                    KitRuleViolation::NotFound(format!("批次不存在: {}", kit.lot_no()))
                })?;
                if !profiles.contains_key(&lot.pcv_code) {
                    let profile = require_profile(store, &lot.pcv_code)?;
                    profiles.insert(lot.pcv_code.clone(), profile);
                }
                let profile = &profiles[&lot.pcv_code];

                let report = reconcile_and_save(store, &mut kit, profile, &mappings)?;
                if !report.is_unchanged() {
                    result.changed_count += 1;
                }
                result.kit_nos.push(kit.kit_no().to_string());
                result.reports.push(report);
            }
            Ok::<_, ApiError>(result)
        });

        match &result {
            Ok(r) => tracing::info!(
                kit_count = r.kit_nos.len(),
                changed = r.changed_count,
                "批量组件清单同步完成"
            ),
            Err(e) => tracing::warn!(error = %e, "批量组件清单同步失败"),
        }
        result
    }

    // ==========================================
    // VIN
    // ==========================================

    /// 分配 VIN
    pub fn assign_kit_vin(&self, kit_no: &str, vin: &str) -> ApiResult<VinRecord> {
        require_non_blank(kit_no, "套件号")?;
        let clock = self.operation_clock();

        let result = self.kit_repo.transaction(|store| {
            let catalog = store.load_event_type_catalog()?;
            let holders = store.active_vin_holders()?;
            let mut kit = require_kit(store, kit_no)?;

            let record = VinAssignmentPolicy::new(&catalog).assign(&mut kit, vin, &holders, &clock)?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(record)
        });

        match &result {
            Ok(record) => tracing::info!(kit_no, vin = %record.vin, "VIN 已分配"),
            Err(e) => tracing::warn!(kit_no, vin, error = %e, "VIN 分配失败"),
        }
        result
    }

    // ==========================================
    // 扫码与工位
    // ==========================================

    /// 记录组件序列号扫码
    pub fn capture_component_serial(
        &self,
        kit_no: &str,
        capture: SerialCapture,
    ) -> ApiResult<ComponentSerial> {
        require_non_blank(kit_no, "套件号")?;
        let clock = self.operation_clock();

        let serial = self.kit_repo.transaction(|store| {
            let mut kit = require_kit(store, kit_no)?;
            let serial = component_station::capture_serial(&mut kit, &capture, clock.recorded_at)?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(serial)
        })?;

        tracing::info!(
            kit_no,
            component_code = %capture.component_code,
            station_code = %capture.station_code,
            serial1 = %serial.serial1,
            "组件扫码已记录"
        );
        Ok(serial)
    }

    /// 手动调整套件组件的工位
    pub fn change_kit_component_station(&self, input: ChangeComponentStationInput) -> ApiResult<()> {
        require_non_blank(&input.kit_no, "套件号")?;
        require_non_blank(&input.component_code, "组件代码")?;

        self.kit_repo.transaction(|store| {
            let mut kit = require_kit(store, &input.kit_no)?;
            let station = store.find_production_station(&input.to_station_code)?;
            component_station::change_station(
                &mut kit,
                &input.component_code,
                &input.from_station_code,
                &input.to_station_code,
                station.as_ref(),
            )?;
            store.save_kit(&mut kit)?;
            Ok::<_, ApiError>(())
        })?;

        tracing::info!(
            kit_no = %input.kit_no,
            component_code = %input.component_code,
            from = %input.from_station_code,
            to = %input.to_station_code,
            "组件工位已调整"
        );
        Ok(())
    }
}

// ==========================================
// 事务内辅助函数
// ==========================================

fn require_non_blank(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

fn require_kit(store: &KitStore<'_>, kit_no: &str) -> ApiResult<Kit> {
    let kit = store.find_kit(kit_no)?;
    kit.ok_or_else(|| KitRuleViolation::NotFound(format!("套件不存在: {}", kit_no)).into())
}

/// 只有 WHOLE_SALE 会查询经销商, 且只查询请求中的那一个
fn requested_dealer(store: &KitStore<'_>, request: &StatusEventRequest) -> ApiResult<Vec<Dealer>> {
    match request.dealer_code() {
        Some(code) if request.code == KitStatusCode::WholeSale => {
            Ok(store.find_dealer(code)?.into_iter().collect())
        }
        _ => Ok(Vec::new()),
    }
}

fn require_profile(store: &KitStore<'_>, pcv_code: &str) -> ApiResult<VehicleProfile> {
    let profile = store.find_vehicle_profile(pcv_code)?;
    profile.ok_or_else(|| KitRuleViolation::NotFound(format!("车型配置不存在: {}", pcv_code)).into())
}

fn load_profile_for_kit(store: &KitStore<'_>, kit: &Kit) -> ApiResult<VehicleProfile> {
    let lot = store
        .find_lot(kit.lot_no())?
        .ok_or_else(|| KitRuleViolation::NotFound(format!("批次不存在: {}", kit.lot_no())))?;
    require_profile(store, &lot.pcv_code)
}

/// 同步并在清单变化时保存
fn reconcile_and_save(
    store: &KitStore<'_>,
    kit: &mut Kit,
    profile: &VehicleProfile,
    mappings: &[StationMappingEntry],
) -> ApiResult<ComponentSyncReport> {
    let report = ComponentAssignmentReconciler::reconcile(kit, profile, mappings)?;
    if !report.is_unchanged() {
        store.save_kit(kit)?;
    }
    Ok(report)
}
