// ==========================================
// SKD 套件追踪系统 - 生命周期事件类型目录
// ==========================================
// 职责: 事件类型参考数据，按 sequence 定义全序
// 存储: kit_status_event_type 表（由调用方加载）
// ==========================================

use crate::domain::types::KitStatusCode;
use serde::{Deserialize, Serialize};

// ==========================================
// EventType - 事件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub code: KitStatusCode,
    pub sequence: i32,
    pub description: String,
}

impl EventType {
    pub fn new(code: KitStatusCode, sequence: i32, description: &str) -> Self {
        Self {
            code,
            sequence,
            description: description.to_string(),
        }
    }

    /// 合作方状态码
    pub fn partner_status_code(&self) -> &'static str {
        self.code.partner_status_code()
    }
}

// ==========================================
// EventTypeCatalog - 事件类型目录
// ==========================================
/// 有序的事件类型列表（按 sequence 升序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeCatalog {
    types: Vec<EventType>,
}

impl EventTypeCatalog {
    pub fn new(mut types: Vec<EventType>) -> Self {
        types.sort_by_key(|t| t.sequence);
        Self { types }
    }

    /// 标准目录: 六个生命周期阶段, sequence 1..=6
    pub fn standard() -> Self {
        let types = KitStatusCode::ALL
            .into_iter()
            .enumerate()
            .map(|(idx, code)| EventType::new(code, idx as i32 + 1, code.default_description()))
            .collect();
        Self::new(types)
    }

    pub fn get(&self, code: KitStatusCode) -> Option<&EventType> {
        self.types.iter().find(|t| t.code == code)
    }

    pub fn sequence_of(&self, code: KitStatusCode) -> Option<i32> {
        self.get(code).map(|t| t.sequence)
    }

    pub fn at_sequence(&self, sequence: i32) -> Option<&EventType> {
        self.types.iter().find(|t| t.sequence == sequence)
    }

    /// 前一阶段（sequence - 1）
    pub fn prior_of(&self, event_type: &EventType) -> Option<&EventType> {
        self.at_sequence(event_type.sequence - 1)
    }

    /// 后一阶段（sequence + 1）
    pub fn next_of(&self, event_type: &EventType) -> Option<&EventType> {
        self.at_sequence(event_type.sequence + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
