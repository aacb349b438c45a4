// ==========================================
// VIN 分配集成测试
// ==========================================
// 测试目标: 全局唯一性、VIN 历史、状态限制
// ==========================================


use skd_kit_tracker::api::CreateLotStatusEventInput;
use skd_kit_tracker::{ErrorKind, KitStatusCode};
use test_helpers::{create_kits, create_test_state, date, seed_reference_data, vin};

#[tokio::test]
async fn test_vin_is_unique_across_kits() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001", "K002"]);
    let api = &state.kit_api;

    api.assign_kit_vin("K001", &vin(1)).expect("首次分配应成功");

    let err = api.assign_kit_vin("K002", &vin(1)).unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::UniquenessViolation));

    // 同一套件重复分配相同 VIN
    let err = api.assign_kit_vin("K001", &vin(1)).unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::Duplicate));

    // K001 换成新 VIN 后, 旧 VIN 释放
    api.assign_kit_vin("K001", &vin(2)).unwrap();
    api.assign_kit_vin("K002", &vin(1))
        .expect("已释放的 VIN 可以被其他套件使用");

    let k1 = api.get_kit("K001").unwrap();
    assert_eq!(k1.vin(), Some(vin(2).as_str()));
    assert_eq!(k1.vin_history().len(), 2);
    assert_eq!(k1.vin_history().iter().filter(|r| r.is_active()).count(), 1);
    assert!(!k1.vin_history()[0].is_active());

    let k2 = api.get_kit("K002").unwrap();
    assert_eq!(k2.vin(), Some(vin(1).as_str()));
}

#[tokio::test]
async fn test_vin_format_rules() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    let err = api.assign_kit_vin("K001", "SHORTVIN").unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::FormatViolation));

    let err = api.assign_kit_vin("K001", "LSGAA5448PF 00001").unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::FormatViolation));

    assert!(api.get_kit("K001").unwrap().vin().is_none());
}

#[tokio::test]
async fn test_vin_only_assignable_before_build_start() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    // CUSTOM_RECEIVED 状态不可分配
    api.create_lot_status_event(CreateLotStatusEventInput {
        lot_no: "LOT001".to_string(),
        event_code: KitStatusCode::CustomReceived,
        event_date: date(2024, 1, 2),
        note: String::new(),
    })
    .await
    .unwrap();
    let err = api.assign_kit_vin("K001", &vin(1)).unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::SequenceViolation));

    api.create_lot_status_event(CreateLotStatusEventInput {
        lot_no: "LOT001".to_string(),
        event_code: KitStatusCode::PlanBuild,
        event_date: date(2024, 1, 20),
        note: String::new(),
    })
    .await
    .unwrap();
    api.assign_kit_vin("K001", &vin(1))
        .expect("PLAN_BUILD 状态可分配 VIN");
}
