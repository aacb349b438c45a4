// ==========================================
// SKD 套件追踪系统 - 套件组件操作
// ==========================================
// 职责: 组件序列号扫码、组件工位手动调整
// ==========================================

use crate::domain::kit::{ComponentSerial, Kit};
use crate::domain::reference::ProductionStation;
use crate::engine::error::{KitRuleViolation, RuleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 扫码请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialCapture {
    pub component_code: String,
    pub station_code: String,
    pub serial1: String,
    #[serde(default)]
    pub serial2: String,
}

/// 记录组件扫码
pub fn capture_serial(
    kit: &mut Kit,
    capture: &SerialCapture,
    at: DateTime<Utc>,
) -> RuleResult<ComponentSerial> {
    let serial1 = capture.serial1.trim();
    let serial2 = capture.serial2.trim();
    if serial1.is_empty() {
        return Err(KitRuleViolation::FormatViolation(
            "序列号不能为空".to_string(),
        ));
    }

    let kit_no = kit.kit_no().to_string();
    let component = kit
        .component_mut(&capture.component_code, &capture.station_code)
        .ok_or_else(|| {
            KitRuleViolation::NotFound(format!(
                "套件 {} 没有组件 {} @ {}",
                kit_no, capture.component_code, capture.station_code
            ))
        })?;

    let repeated = component
        .active_serials()
        .any(|s| s.serial1 == serial1 && s.serial2 == serial2);
    if repeated {
        return Err(KitRuleViolation::Duplicate(format!(
            "组件 {} 已记录序列号 {}",
            capture.component_code, serial1
        )));
    }

    let serial = ComponentSerial::new(serial1, serial2, at);
    component.serials.push(serial.clone());
    Ok(serial)
}

/// 手动调整组件工位
///
/// `station` 为目标工位（调用方已按代码查询, None 表示不存在）
pub fn change_station(
    kit: &mut Kit,
    component_code: &str,
    from_station: &str,
    to_station_code: &str,
    station: Option<&ProductionStation>,
) -> RuleResult<()> {
    if kit.find_component(component_code, from_station).is_none() {
        return Err(KitRuleViolation::NotFound(format!(
            "套件 {} 没有组件 {} @ {}",
            kit.kit_no(),
            component_code,
            from_station
        )));
    }

    let station = station.ok_or_else(|| {
        KitRuleViolation::NotFound(format!("工位不存在: {}", to_station_code))
    })?;

    if station.code == from_station {
        return Err(KitRuleViolation::Duplicate(format!(
            "组件 {} 已在工位 {}",
            component_code, station.code
        )));
    }

    if kit.find_component(component_code, &station.code).is_some() {
        return Err(KitRuleViolation::Duplicate(format!(
            "套件 {} 已存在组件 {} @ {}",
            kit.kit_no(),
            component_code,
            station.code
        )));
    }

    if let Some(component) = kit.component_mut(component_code, from_station) {
        component.station_code = station.code.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kit::KitComponent;
    use crate::engine::error::ErrorKind;

    fn kit_with(pairs: &[(&str, &str)]) -> Kit {
        let mut kit = Kit::new("KIT001", "LOT001");
        for (component, station) in pairs {
            kit.push_component(KitComponent::new(component, station));
        }
        kit
    }

    fn capture(component: &str, station: &str, serial1: &str) -> SerialCapture {
        SerialCapture {
            component_code: component.to_string(),
            station_code: station.to_string(),
            serial1: serial1.to_string(),
            serial2: String::new(),
        }
    }

    fn station(code: &str) -> ProductionStation {
        ProductionStation {
            code: code.to_string(),
            name: code.to_string(),
            sequence: 1,
        }
    }

    #[test]
    fn test_capture_serial() {
        let mut kit = kit_with(&[("EN", "S1")]);
        let at = Utc::now();
        capture_serial(&mut kit, &capture("EN", "S1", " SN001 "), at).unwrap();
        assert!(kit.has_active_serial_scan());
        assert_eq!(kit.find_component("EN", "S1").unwrap().serials[0].serial1, "SN001");

        let err = capture_serial(&mut kit, &capture("EN", "S1", "SN001"), at).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let err = capture_serial(&mut kit, &capture("TR", "S1", "SN002"), at).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = capture_serial(&mut kit, &capture("EN", "S1", "  "), at).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatViolation);
    }

    #[test]
    fn test_change_station() {
        let mut kit = kit_with(&[("EN", "S1"), ("TR", "S1"), ("TR", "S2")]);

        change_station(&mut kit, "EN", "S1", "S3", Some(&station("S3"))).unwrap();
        assert!(kit.find_component("EN", "S3").is_some());
        assert!(kit.find_component("EN", "S1").is_none());

        let err = change_station(&mut kit, "EN", "S1", "S2", Some(&station("S2"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = change_station(&mut kit, "EN", "S3", "S9", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = change_station(&mut kit, "EN", "S3", "S3", Some(&station("S3"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let err = change_station(&mut kit, "TR", "S1", "S2", Some(&station("S2"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
    }
}
