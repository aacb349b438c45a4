// ==========================================
// 批次状态事件 API 集成测试
// ==========================================
// 测试目标: 批次内全部套件原子更新、批次级校验
// ==========================================


use skd_kit_tracker::api::{CreateKitStatusEventInput, CreateLotStatusEventInput};
use skd_kit_tracker::{ErrorKind, KitStatusCode};
use test_helpers::{create_kits, create_test_state, date, reference_instant, seed_reference_data};

fn lot_input(
    lot_no: &str,
    code: KitStatusCode,
    event_date: chrono::NaiveDateTime,
) -> CreateLotStatusEventInput {
    CreateLotStatusEventInput {
        lot_no: lot_no.to_string(),
        event_code: code,
        event_date,
        note: String::new(),
    }
}

#[tokio::test]
async fn test_lot_event_applies_to_every_kit() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001", "K002", "K003"]);

    let result = state
        .kit_api
        .create_lot_status_event(lot_input("LOT001", KitStatusCode::CustomReceived, date(2024, 2, 1)))
        .await
        .expect("批次事件应成功");

    assert_eq!(result.kit_nos, vec!["K001", "K002", "K003"]);
    for kit_no in &result.kit_nos {
        let kit = state.kit_api.get_kit(kit_no).unwrap();
        let event = kit
            .active_event(KitStatusCode::CustomReceived)
            .expect("每个套件都应有 CUSTOM_RECEIVED");
        assert_eq!(event.event_date, date(2024, 2, 1));
    }
}

#[tokio::test]
async fn test_lot_duplicate_in_one_kit_blocks_whole_lot() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001", "K002"]);

    // K002 已单独记录相同日期的事件
    state
        .kit_api
        .create_kit_status_event(CreateKitStatusEventInput {
            kit_no: "K002".to_string(),
            event_code: KitStatusCode::CustomReceived,
            event_date: date(2024, 2, 1),
            note: "manual".to_string(),
            dealer_code: None,
        })
        .await
        .unwrap();

    let err = state
        .kit_api
        .create_lot_status_event(lot_input("LOT001", KitStatusCode::CustomReceived, date(2024, 2, 1)))
        .await
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::Duplicate));

    let k1 = state.kit_api.get_kit("K001").unwrap();
    assert!(
        k1.status_events().is_empty(),
        "批次校验失败时其他套件不应变更"
    );
}

#[tokio::test]
async fn test_lot_custom_received_date_window() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    // 参考时刻本身
    let err = api
        .create_lot_status_event(lot_input(
            "LOT001",
            KitStatusCode::CustomReceived,
            reference_instant().naive_utc(),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::DateConstraintViolation));

    // 超过 6 个月
    let err = api
        .create_lot_status_event(lot_input("LOT001", KitStatusCode::CustomReceived, date(2023, 8, 31)))
        .await
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::DateConstraintViolation));

    // 恰好 6 个月
    api.create_lot_status_event(lot_input("LOT001", KitStatusCode::CustomReceived, date(2023, 9, 1)))
        .await
        .expect("边界日期应通过");
}

#[tokio::test]
async fn test_lot_and_single_kit_agree_on_same_day_custom_received() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    state.kit_repo.create_kit("K900", "LOT_EMPTY").unwrap();
    let api = &state.kit_api;

    // 参考时刻 08:00, 事件为当天 00:00
    api.create_kit_status_event(CreateKitStatusEventInput {
        kit_no: "K900".to_string(),
        event_code: KitStatusCode::CustomReceived,
        event_date: date(2024, 3, 1),
        note: String::new(),
        dealer_code: None,
    })
    .await
    .expect("单套件路径应通过");

    let result = api
        .create_lot_status_event(lot_input("LOT001", KitStatusCode::CustomReceived, date(2024, 3, 1)))
        .await
        .expect("批次路径应与单套件路径一致");
    assert_eq!(result.kit_nos, vec!["K001".to_string()]);
}

#[tokio::test]
async fn test_lot_path_skips_per_kit_sequence_rules() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);

    // 没有 CUSTOM_RECEIVED 也能在批次级写入 PLAN_BUILD
    state
        .kit_api
        .create_lot_status_event(lot_input("LOT001", KitStatusCode::PlanBuild, date(2024, 2, 15)))
        .await
        .expect("批次路径不校验前置状态");

    let kit = state.kit_api.get_kit("K001").unwrap();
    assert!(kit.active_event(KitStatusCode::PlanBuild).is_some());
}

#[tokio::test]
async fn test_lot_not_found() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);

    let err = state
        .kit_api
        .create_lot_status_event(lot_input("LOT404", KitStatusCode::CustomReceived, date(2024, 2, 1)))
        .await
        .unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::NotFound));
}
