// ==========================================
// 组件清单同步 / 扫码 / 工位调整 集成测试
// ==========================================


use skd_kit_tracker::api::{ApiError, ChangeComponentStationInput, CreateLotStatusEventInput};
use skd_kit_tracker::engine::component_station::SerialCapture;
use skd_kit_tracker::engine::ComponentStationPair;
use skd_kit_tracker::{ErrorKind, KitStatusCode};
use test_helpers::{create_kits, create_test_state, date, mapping, seed_reference_data};

fn pair(component_code: &str, station_code: &str) -> ComponentStationPair {
    ComponentStationPair {
        component_code: component_code.to_string(),
        station_code: station_code.to_string(),
    }
}

fn pairs_of(kit: &skd_kit_tracker::Kit) -> Vec<ComponentStationPair> {
    kit.components().iter().map(ComponentStationPair::from).collect()
}

fn capture(component_code: &str, station_code: &str, serial1: &str) -> SerialCapture {
    SerialCapture {
        component_code: component_code.to_string(),
        station_code: station_code.to_string(),
        serial1: serial1.to_string(),
        serial2: String::new(),
    }
}

#[tokio::test]
async fn test_reconcile_adds_required_components() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);

    let report = state.kit_api.reconcile_kit_components("K001").unwrap();
    assert_eq!(report.added, vec![pair("EN", "S1"), pair("TR", "S2")]);
    assert!(report.removed.is_empty());

    let kit = state.kit_api.get_kit("K001").unwrap();
    assert_eq!(pairs_of(&kit), vec![pair("EN", "S1"), pair("TR", "S2")]);

    // 幂等
    let again = state.kit_api.reconcile_kit_components("K001").unwrap();
    assert!(again.is_unchanged());
    assert_eq!(state.kit_api.get_kit("K001").unwrap().revision(), kit.revision());
}

#[tokio::test]
async fn test_reconcile_keeps_scanned_components() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    api.reconcile_kit_components("K001").unwrap();
    api.capture_component_serial("K001", capture("EN", "S1", "EN-0001"))
        .unwrap();

    // 映射模板只剩 AB: PCV01 的目标清单为空
    assert_eq!(
        state
            .component_station_api
            .remove_all_component_station_mappings()
            .unwrap(),
        3
    );
    state
        .component_station_api
        .set_component_station_mappings(vec![mapping("AB", "S3")])
        .unwrap();

    let report = api.reconcile_kit_components("K001").unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.removed, vec![pair("TR", "S2")]);
    assert_eq!(report.retained_with_history, vec![pair("EN", "S1")]);

    let kit = api.get_kit("K001").unwrap();
    assert_eq!(pairs_of(&kit), vec![pair("EN", "S1")]);
    let engine = kit.find_component("EN", "S1").unwrap();
    assert_eq!(engine.active_serials().count(), 1, "扫码记录应保留");
}

#[tokio::test]
async fn test_reconcile_keeps_component_at_previous_station() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;
    api.reconcile_kit_components("K001").unwrap();

    // TR 改到 S3: 原 S2 位置组件代码仍在目标中, 保留
    state
        .component_station_api
        .set_component_station_mappings(vec![mapping("TR", "S3")])
        .unwrap();
    let report = api.reconcile_kit_components("K001").unwrap();
    assert_eq!(report.added, vec![pair("TR", "S3")]);
    assert!(report.removed.is_empty());

    let kit = api.get_kit("K001").unwrap();
    assert_eq!(
        pairs_of(&kit),
        vec![pair("EN", "S1"), pair("TR", "S2"), pair("TR", "S3")]
    );
}

#[tokio::test]
async fn test_reconcile_all_skips_completed_kits() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    state.kit_repo.create_kit("K900", "LOT_EMPTY").unwrap();
    let api = &state.kit_api;

    // K900 在批次路径上推进到 BUILD_COMPLETED
    for (code, d) in [
        (KitStatusCode::CustomReceived, date(2024, 1, 2)),
        (KitStatusCode::PlanBuild, date(2024, 1, 20)),
        (KitStatusCode::BuildStart, date(2024, 2, 1)),
        (KitStatusCode::BuildCompleted, date(2024, 2, 5)),
    ] {
        api.create_lot_status_event(CreateLotStatusEventInput {
            lot_no: "LOT_EMPTY".to_string(),
            event_code: code,
            event_date: d,
            note: String::new(),
        })
        .await
        .unwrap();
    }

    // PCV_EMPTY 无组件: 若 K900 参与同步会导致整批失败
    let result = api.reconcile_all_eligible_kits().unwrap();
    assert_eq!(result.kit_nos, vec!["K001".to_string()]);
    assert_eq!(result.changed_count, 1);

    let again = api.reconcile_all_eligible_kits().unwrap();
    assert_eq!(again.changed_count, 0);
}

#[tokio::test]
async fn test_reconcile_profile_without_components_fails() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    state.kit_repo.create_kit("K900", "LOT_EMPTY").unwrap();

    let err = state.kit_api.reconcile_kit_components("K900").unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::ConfigurationError));
}

#[tokio::test]
async fn test_capture_serial_rules() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;
    api.reconcile_kit_components("K001").unwrap();

    let serial = api
        .capture_component_serial("K001", capture("EN", "S1", " EN-0001 "))
        .unwrap();
    assert_eq!(serial.serial1, "EN-0001");

    let err = api
        .capture_component_serial("K001", capture("EN", "S1", "EN-0001"))
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::Duplicate));

    let err = api
        .capture_component_serial("K001", capture("EN", "S1", "   "))
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::FormatViolation));

    let err = api
        .capture_component_serial("K001", capture("AB", "S3", "AB-0001"))
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::NotFound));

    let kit = api.get_kit("K001").unwrap();
    assert!(kit.has_active_serial_scan());
}

#[tokio::test]
async fn test_change_component_station() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;
    api.reconcile_kit_components("K001").unwrap();

    let input = |to: &str| ChangeComponentStationInput {
        kit_no: "K001".to_string(),
        component_code: "EN".to_string(),
        from_station_code: "S1".to_string(),
        to_station_code: to.to_string(),
    };

    let err = api.change_kit_component_station(input("S9")).unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::NotFound));

    api.change_kit_component_station(input("S3")).unwrap();
    let kit = api.get_kit("K001").unwrap();
    assert!(kit.find_component("EN", "S3").is_some());
    assert!(kit.find_component("EN", "S1").is_none());

    // 手动调整的工位在同步后保留, 映射位置重新补齐
    let report = api.reconcile_kit_components("K001").unwrap();
    assert_eq!(report.added, vec![pair("EN", "S1")]);
    assert!(report.removed.is_empty());

    let err = api
        .change_kit_component_station(ChangeComponentStationInput {
            component_code: " ".to_string(),
            ..input("S2")
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
