// ==========================================
// SKD 套件追踪系统 - 套件聚合
// ==========================================
// 职责: 套件的状态事件、组件清单、VIN 历史、经销商关联
// 红线: 列表只能通过聚合方法修改（变更入口为 engine 层）
// 红线: 状态事件/VIN 记录只做软删除, 不做物理删除
// ==========================================

use crate::domain::event_type::EventTypeCatalog;
use crate::domain::types::{KitStatusCode, RecordState};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// StatusEvent - 生命周期状态事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub event_id: String,
    pub code: KitStatusCode,
    pub event_date: NaiveDateTime,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub state: RecordState,
    pub partner_ack_at: Option<DateTime<Utc>>, // 合作方回执时间
}

impl StatusEvent {
    pub(crate) fn new(
        code: KitStatusCode,
        event_date: NaiveDateTime,
        note: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            code,
            event_date,
            note: note.to_string(),
            created_at,
            state: RecordState::Active,
            partner_ack_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

// ==========================================
// ComponentSerial - 组件序列号扫码记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSerial {
    pub serial_id: String,
    pub serial1: String,
    pub serial2: String,
    pub created_at: DateTime<Utc>,
    pub state: RecordState,
}

impl ComponentSerial {
    pub(crate) fn new(serial1: &str, serial2: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            serial_id: Uuid::new_v4().to_string(),
            serial1: serial1.to_string(),
            serial2: serial2.to_string(),
            created_at,
            state: RecordState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

// ==========================================
// KitComponent - 套件组件（组件 × 工位）
// ==========================================
// 唯一性: (kit_no, component_code, station_code)
// 红线: 存在扫码记录的组件永不移除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitComponent {
    pub kit_component_id: String,
    pub component_code: String,
    pub station_code: String,
    pub serials: Vec<ComponentSerial>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl KitComponent {
    pub(crate) fn new(component_code: &str, station_code: &str) -> Self {
        Self {
            kit_component_id: Uuid::new_v4().to_string(),
            component_code: component_code.to_string(),
            station_code: station_code.to_string(),
            serials: Vec::new(),
            verified_at: None,
        }
    }

    /// 是否有任何扫码历史（含已移除的扫码）
    pub fn has_serial_history(&self) -> bool {
        !self.serials.is_empty()
    }

    pub fn active_serials(&self) -> impl Iterator<Item = &ComponentSerial> {
        self.serials.iter().filter(|s| s.is_active())
    }

    pub fn matches(&self, component_code: &str, station_code: &str) -> bool {
        self.component_code == component_code && self.station_code == station_code
    }
}

// ==========================================
// VinRecord - VIN 历史记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VinRecord {
    pub record_id: String,
    pub vin: String,
    pub created_at: DateTime<Utc>,
    pub state: RecordState,
}

impl VinRecord {
    pub(crate) fn new(vin: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            vin: vin.to_string(),
            created_at,
            state: RecordState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

// ==========================================
// KitHeader - 套件主记录（存储层还原用）
// ==========================================
#[derive(Debug, Clone)]
pub(crate) struct KitHeader {
    pub kit_no: String,
    pub lot_no: String,
    pub vin: Option<String>,
    pub dealer_code: Option<String>,
    pub revision: i64,
}

// ==========================================
// Kit - 套件聚合根
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    kit_no: String,
    lot_no: String,
    vin: Option<String>,
    dealer_code: Option<String>,
    components: Vec<KitComponent>,
    status_events: Vec<StatusEvent>,
    vin_history: Vec<VinRecord>,
    revision: i64, // 乐观锁版本
}

impl Kit {
    /// 创建新套件（无事件、无组件）
    pub fn new(kit_no: &str, lot_no: &str) -> Self {
        Self {
            kit_no: kit_no.to_string(),
            lot_no: lot_no.to_string(),
            vin: None,
            dealer_code: None,
            components: Vec::new(),
            status_events: Vec::new(),
            vin_history: Vec::new(),
            revision: 0,
        }
    }

    /// 从存储层还原
    pub(crate) fn restore(
        header: KitHeader,
        components: Vec<KitComponent>,
        status_events: Vec<StatusEvent>,
        vin_history: Vec<VinRecord>,
    ) -> Self {
        Self {
            kit_no: header.kit_no,
            lot_no: header.lot_no,
            vin: header.vin,
            dealer_code: header.dealer_code,
            components,
            status_events,
            vin_history,
            revision: header.revision,
        }
    }

    // ===== 只读访问 =====

    pub fn kit_no(&self) -> &str {
        &self.kit_no
    }

    pub fn lot_no(&self) -> &str {
        &self.lot_no
    }

    pub fn vin(&self) -> Option<&str> {
        self.vin.as_deref()
    }

    /// 是否已有非空 VIN
    pub fn has_vin(&self) -> bool {
        self.vin.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    pub fn dealer_code(&self) -> Option<&str> {
        self.dealer_code.as_deref()
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn components(&self) -> &[KitComponent] {
        &self.components
    }

    pub fn status_events(&self) -> &[StatusEvent] {
        &self.status_events
    }

    pub fn vin_history(&self) -> &[VinRecord] {
        &self.vin_history
    }

    pub fn active_status_events(&self) -> impl Iterator<Item = &StatusEvent> {
        self.status_events.iter().filter(|e| e.is_active())
    }

    pub fn active_event(&self, code: KitStatusCode) -> Option<&StatusEvent> {
        self.active_status_events().find(|e| e.code == code)
    }

    pub fn active_vin_record(&self) -> Option<&VinRecord> {
        self.vin_history.iter().find(|r| r.is_active())
    }

    pub fn find_component(&self, component_code: &str, station_code: &str) -> Option<&KitComponent> {
        self.components
            .iter()
            .find(|c| c.matches(component_code, station_code))
    }

    /// 当前状态: sequence 最大的有效事件
    ///
    /// 目录中不存在的事件类型不参与比较
    pub fn current_status(&self, catalog: &EventTypeCatalog) -> Option<KitStatusCode> {
        self.active_status_events()
            .filter_map(|e| catalog.sequence_of(e.code).map(|seq| (seq, e.code)))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, code)| code)
    }

    /// 当前状态的 sequence（无事件时为 0）
    pub fn current_status_sequence(&self, catalog: &EventTypeCatalog) -> i32 {
        self.current_status(catalog)
            .and_then(|code| catalog.sequence_of(code))
            .unwrap_or(0)
    }

    /// 是否存在至少一条有效扫码
    pub fn has_active_serial_scan(&self) -> bool {
        self.components
            .iter()
            .any(|c| c.active_serials().next().is_some())
    }

    /// 最早一条有效扫码时间
    pub fn earliest_active_scan_at(&self) -> Option<DateTime<Utc>> {
        self.components
            .iter()
            .flat_map(|c| c.active_serials())
            .map(|s| s.created_at)
            .min()
    }

    // ===== 变更入口（crate 内部） =====

    /// 软删除同类型的有效事件并追加新事件
    pub(crate) fn supersede_and_append_event(&mut self, event: StatusEvent, at: DateTime<Utc>) {
        for existing in self
            .status_events
            .iter_mut()
            .filter(|e| e.code == event.code && e.is_active())
        {
            existing.state = RecordState::Removed { removed_at: at };
        }
        self.status_events.push(event);
    }

    pub(crate) fn set_dealer(&mut self, dealer_code: &str) {
        self.dealer_code = Some(dealer_code.to_string());
    }

    /// 软删除当前有效 VIN 记录并追加新记录
    pub(crate) fn replace_vin(&mut self, record: VinRecord, at: DateTime<Utc>) {
        for existing in self.vin_history.iter_mut().filter(|r| r.is_active()) {
            existing.state = RecordState::Removed { removed_at: at };
        }
        self.vin = Some(record.vin.clone());
        self.vin_history.push(record);
    }

    /// 移除满足条件的组件，返回被移除的组件
    pub(crate) fn remove_components_where<F>(&mut self, mut predicate: F) -> Vec<KitComponent>
    where
        F: FnMut(&KitComponent) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.components.drain(..).partition(|c| predicate(c));
        self.components = kept;
        removed
    }

    pub(crate) fn push_component(&mut self, component: KitComponent) {
        self.components.push(component);
    }

    pub(crate) fn component_mut(
        &mut self,
        component_code: &str,
        station_code: &str,
    ) -> Option<&mut KitComponent> {
        self.components
            .iter_mut()
            .find(|c| c.matches(component_code, station_code))
    }

    pub(crate) fn active_event_mut(&mut self, code: KitStatusCode) -> Option<&mut StatusEvent> {
        self.status_events
            .iter_mut()
            .find(|e| e.code == code && e.is_active())
    }

    /// 持久化成功后推进版本号
    pub(crate) fn mark_saved(&mut self) {
        self.revision += 1;
    }
}
