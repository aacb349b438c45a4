// ==========================================
// 组件-工位映射 API 集成测试
// ==========================================
// 测试目标: 累计校验、按组件替换、全部删除
// ==========================================


use skd_kit_tracker::api::ApiError;
use test_helpers::{create_test_state, mapping, seed_reference_data};

#[tokio::test]
async fn test_list_mappings_sorted_by_station() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);

    let mappings = state
        .component_station_api
        .list_component_station_mappings()
        .unwrap();
    let codes: Vec<_> = mappings
        .iter()
        .map(|m| (m.component_code.as_str(), m.station_code.as_str()))
        .collect();
    assert_eq!(codes, vec![("EN", "S1"), ("TR", "S2"), ("AB", "S3")]);
}

#[tokio::test]
async fn test_set_mappings_collects_every_violation() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);

    let err = state
        .component_station_api
        .set_component_station_mappings(vec![
            mapping("EN", "S9"),
            mapping("XX", "S1"),
            mapping(" ", "S2"),
        ])
        .unwrap_err();

    match err {
        ApiError::ValidationFailed { violations, .. } => {
            let types: Vec<_> = violations.iter().map(|v| v.violation_type.as_str()).collect();
            assert_eq!(types, vec!["BLANK_CODE", "UNKNOWN_COMPONENT", "UNKNOWN_STATION"]);
        }
        other => panic!("应返回 ValidationFailed, 实际: {}", other),
    }

    // 校验失败时不写入
    assert_eq!(
        state
            .component_station_api
            .list_component_station_mappings()
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_set_mappings_rejects_empty_input() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);

    let err = state
        .component_station_api
        .set_component_station_mappings(Vec::new())
        .unwrap_err();
    match err {
        ApiError::ValidationFailed { violations, .. } => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].violation_type, "EMPTY_INPUT");
        }
        other => panic!("应返回 ValidationFailed, 实际: {}", other),
    }
}

#[tokio::test]
async fn test_set_mappings_replaces_per_component() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    let api = &state.component_station_api;

    let written = api
        .set_component_station_mappings(vec![mapping("EN", "S2"), mapping("EN", "S3")])
        .unwrap();
    assert_eq!(written, 2);

    let mappings = api.list_component_station_mappings().unwrap();
    let engine: Vec<_> = mappings
        .iter()
        .filter(|m| m.component_code == "EN")
        .map(|m| m.station_code.as_str())
        .collect();
    assert_eq!(engine, vec!["S2", "S3"]);
    assert_eq!(mappings.len(), 4, "其他组件映射不受影响");

    assert_eq!(api.remove_all_component_station_mappings().unwrap(), 4);
    assert!(api.list_component_station_mappings().unwrap().is_empty());
}
