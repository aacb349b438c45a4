// ==========================================
// SKD 套件追踪系统 - 组件-工位映射 API
// ==========================================
// 职责: 维护全局组件-工位映射模板
// 约定: 输入校验累计全部违规项后一次性返回
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult, ValidationViolation};
use crate::domain::reference::{StationMappingEntry, StationMappingInput};
use crate::repository::reference_repo::ReferenceDataRepository;

pub struct ComponentStationApi {
    reference_repo: Arc<ReferenceDataRepository>,
}

impl ComponentStationApi {
    pub fn new(reference_repo: Arc<ReferenceDataRepository>) -> Self {
        Self { reference_repo }
    }

    pub fn list_component_station_mappings(&self) -> ApiResult<Vec<StationMappingEntry>> {
        Ok(self.reference_repo.list_station_mappings()?)
    }

    /// 替换输入中各组件的映射
    ///
    /// # 校验（累计）
    /// - 输入为空
    /// - 组件/工位代码为空
    /// - 组件代码不存在
    /// - 工位代码不存在
    ///
    /// # 返回
    /// - Ok(usize): 写入的映射条数
    pub fn set_component_station_mappings(
        &self,
        mappings: Vec<StationMappingInput>,
    ) -> ApiResult<usize> {
        let violations = self.validate_mappings(&mappings)?;
        if !violations.is_empty() {
            tracing::warn!(violation_count = violations.len(), "组件-工位映射校验失败");
            return Err(ApiError::ValidationFailed {
                reason: format!("组件-工位映射存在 {} 处错误", violations.len()),
                violations,
            });
        }

        let written = self.reference_repo.replace_station_mappings(&mappings)?;
        tracing::info!(written, "组件-工位映射已更新");
        Ok(written)
    }

    /// 删除全部映射, 返回删除条数
    pub fn remove_all_component_station_mappings(&self) -> ApiResult<usize> {
        let removed = self.reference_repo.remove_all_station_mappings()?;
        tracing::info!(removed, "组件-工位映射已全部删除");
        Ok(removed)
    }

    fn validate_mappings(
        &self,
        mappings: &[StationMappingInput],
    ) -> ApiResult<Vec<ValidationViolation>> {
        let mut violations = Vec::new();

        if mappings.is_empty() {
            violations.push(ValidationViolation::new("EMPTY_INPUT", "映射列表不能为空"));
            return Ok(violations);
        }

        for (idx, m) in mappings.iter().enumerate() {
            if m.component_code.trim().is_empty() {
                violations.push(ValidationViolation::new(
                    "BLANK_CODE",
                    format!("第 {} 行组件代码为空", idx + 1),
                ));
            }
            if m.station_code.trim().is_empty() {
                violations.push(ValidationViolation::new(
                    "BLANK_CODE",
                    format!("第 {} 行工位代码为空", idx + 1),
                ));
            }
        }

        let component_codes: Vec<String> = mappings
            .iter()
            .map(|m| m.component_code.clone())
            .filter(|c| !c.trim().is_empty())
            .collect();
        for code in self.reference_repo.find_missing_component_codes(&component_codes)? {
            violations.push(ValidationViolation::new(
                "UNKNOWN_COMPONENT",
                format!("组件不存在: {}", code),
            ));
        }

        let station_codes: Vec<String> = mappings
            .iter()
            .map(|m| m.station_code.clone())
            .filter(|c| !c.trim().is_empty())
            .collect();
        for code in self.reference_repo.find_missing_station_codes(&station_codes)? {
            violations.push(ValidationViolation::new(
                "UNKNOWN_STATION",
                format!("工位不存在: {}", code),
            ));
        }

        Ok(violations)
    }
}
