// ==========================================
// 套件状态事件 API 集成测试
// ==========================================
// 测试目标: 单套件生命周期、规则失败回滚、BUILD_START 生成、合作方回执
// ==========================================


use skd_kit_tracker::api::{ApiError, CreateKitStatusEventInput};
use skd_kit_tracker::app::AppState;
use skd_kit_tracker::engine::component_station::SerialCapture;
use skd_kit_tracker::{ErrorKind, KitStatusCode};
use test_helpers::{create_kits, create_test_state, date, seed_reference_data, vin};

fn event_input(kit_no: &str, code: KitStatusCode, event_date: chrono::NaiveDateTime) -> CreateKitStatusEventInput {
    CreateKitStatusEventInput {
        kit_no: kit_no.to_string(),
        event_code: code,
        event_date,
        note: String::new(),
        dealer_code: None,
    }
}

fn engine_capture(serial1: &str) -> SerialCapture {
    SerialCapture {
        component_code: "EN".to_string(),
        station_code: "S1".to_string(),
        serial1: serial1.to_string(),
        serial2: String::new(),
    }
}

/// 推进到 PLAN_BUILD 并完成 VIN 与组件准备
async fn advance_to_plan_build(state: &AppState, kit_no: &str, vin_no: u32) {
    let api = &state.kit_api;
    api.create_kit_status_event(event_input(kit_no, KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .expect("CUSTOM_RECEIVED 应成功");
    api.create_kit_status_event(event_input(kit_no, KitStatusCode::PlanBuild, date(2024, 1, 20)))
        .await
        .expect("PLAN_BUILD 应成功");
    api.assign_kit_vin(kit_no, &vin(vin_no)).expect("VIN 分配应成功");
    api.reconcile_kit_components(kit_no).expect("组件同步应成功");
}

fn assert_rule_kind<T: std::fmt::Debug>(result: Result<T, ApiError>, expected: ErrorKind) {
    let err = result.expect_err("应返回规则错误");
    assert_eq!(err.rule_kind(), Some(expected), "错误类别不符: {}", err);
}

#[tokio::test]
async fn test_full_lifecycle_through_api() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    advance_to_plan_build(&state, "K001", 1).await;

    // 无扫码时 BUILD_START 被拒绝
    assert_rule_kind(
        api.create_build_start_event("K001").await,
        ErrorKind::MissingPrerequisiteData,
    );

    api.capture_component_serial("K001", engine_capture("EN-0001"))
        .expect("扫码应成功");
    let build_start = api
        .create_build_start_event("K001")
        .await
        .expect("BUILD_START 应成功");
    assert_eq!(build_start.event_date, date(2024, 3, 1) + chrono::Duration::hours(8));

    // BUILD_START 之后禁止未来日期
    assert_rule_kind(
        api.create_kit_status_event(event_input("K001", KitStatusCode::BuildCompleted, date(2024, 3, 2)))
            .await,
        ErrorKind::DateConstraintViolation,
    );
    api.create_kit_status_event(event_input("K001", KitStatusCode::BuildCompleted, date(2024, 3, 1)))
        .await
        .expect("BUILD_COMPLETED 应成功");
    api.create_kit_status_event(event_input("K001", KitStatusCode::GateReleased, date(2024, 3, 1)))
        .await
        .expect("GATE_RELEASED 应成功");

    // WHOLE_SALE 必须关联存在的经销商
    assert_rule_kind(
        api.create_kit_status_event(event_input("K001", KitStatusCode::WholeSale, date(2024, 3, 1)))
            .await,
        ErrorKind::MissingPrerequisiteData,
    );
    let mut unknown_dealer = event_input("K001", KitStatusCode::WholeSale, date(2024, 3, 1));
    unknown_dealer.dealer_code = Some("D999".to_string());
    assert_rule_kind(
        api.create_kit_status_event(unknown_dealer).await,
        ErrorKind::NotFound,
    );

    let mut whole_sale = event_input("K001", KitStatusCode::WholeSale, date(2024, 3, 1));
    whole_sale.dealer_code = Some("D001".to_string());
    api.create_kit_status_event(whole_sale)
        .await
        .expect("WHOLE_SALE 应成功");

    let kit = api.get_kit("K001").unwrap();
    assert_eq!(kit.dealer_code(), Some("D001"));
    assert_eq!(kit.vin(), Some(vin(1).as_str()));
    assert_eq!(kit.active_status_events().count(), 6);
    let catalog = state.reference_repo.load_event_type_catalog().unwrap();
    assert_eq!(kit.current_status(&catalog), Some(KitStatusCode::WholeSale));
}

#[tokio::test]
async fn test_build_start_without_scan_leaves_kit_unchanged() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    advance_to_plan_build(&state, "K001", 1).await;
    let before = api.get_kit("K001").unwrap();

    let err = api.create_build_start_event("K001").await.unwrap_err();
    assert_eq!(err.rule_kind(), Some(ErrorKind::MissingPrerequisiteData));
    assert!(err.to_string().contains("扫码"), "错误信息: {}", err);

    let after = api.get_kit("K001").unwrap();
    assert!(after.active_event(KitStatusCode::BuildStart).is_none());
    assert_eq!(after.revision(), before.revision());
}

#[tokio::test]
async fn test_dealer_resolved_only_for_whole_sale() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;
    let dealers = state.reference_repo.list_dealers().unwrap();
    assert_eq!(dealers.iter().map(|d| d.code.as_str()).collect::<Vec<_>>(), vec!["D001"]);

    // 非 WHOLE_SALE 事件携带未知经销商代码: 不查询, 不关联
    let mut custom_received = event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10));
    custom_received.dealer_code = Some("D999".to_string());
    api.create_kit_status_event(custom_received)
        .await
        .expect("经销商代码应被忽略");
    assert_eq!(api.get_kit("K001").unwrap().dealer_code(), None);

    api.create_kit_status_event(event_input("K001", KitStatusCode::PlanBuild, date(2024, 1, 20)))
        .await
        .unwrap();
    api.assign_kit_vin("K001", &vin(1)).unwrap();
    api.reconcile_kit_components("K001").unwrap();
    api.capture_component_serial("K001", engine_capture("EN-0001")).unwrap();
    api.create_build_start_event("K001").await.unwrap();
    for code in [KitStatusCode::BuildCompleted, KitStatusCode::GateReleased] {
        api.create_kit_status_event(event_input("K001", code, date(2024, 3, 1)))
            .await
            .unwrap();
    }

    // 带空白的代码按修剪后查询
    let mut whole_sale = event_input("K001", KitStatusCode::WholeSale, date(2024, 3, 1));
    whole_sale.dealer_code = Some(" D001 ".to_string());
    api.create_kit_status_event(whole_sale)
        .await
        .expect("WHOLE_SALE 应成功");
    assert_eq!(api.get_kit("K001").unwrap().dealer_code(), Some("D001"));
}

#[tokio::test]
async fn test_plan_build_lead_time_is_enforced() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap();

    assert_rule_kind(
        api.create_kit_status_event(event_input("K001", KitStatusCode::PlanBuild, date(2024, 1, 19)))
            .await,
        ErrorKind::DateConstraintViolation,
    );

    // 恰好满足提前期
    api.create_kit_status_event(event_input("K001", KitStatusCode::PlanBuild, date(2024, 1, 20)))
        .await
        .expect("边界日期应通过");
}

#[tokio::test]
async fn test_custom_received_must_be_before_reference_date() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);

    assert_rule_kind(
        state
            .kit_api
            .create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 3, 2)))
            .await,
        ErrorKind::DateConstraintViolation,
    );
}

#[tokio::test]
async fn test_failed_rule_leaves_kit_unchanged() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap();
    let before = api.get_kit("K001").unwrap();

    // 跳过 PLAN_BUILD
    assert_rule_kind(
        api.create_kit_status_event(event_input("K001", KitStatusCode::BuildStart, date(2024, 2, 1)))
            .await,
        ErrorKind::SequenceViolation,
    );

    let after = api.get_kit("K001").unwrap();
    assert_eq!(before, after, "规则失败不应修改套件");
}

#[tokio::test]
async fn test_duplicate_and_supersede() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap();
    assert_rule_kind(
        api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10)))
            .await,
        ErrorKind::Duplicate,
    );

    // 不同日期: 替换旧事件
    api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 12)))
        .await
        .unwrap();

    let kit = api.get_kit("K001").unwrap();
    assert_eq!(kit.status_events().len(), 2, "旧事件应保留为已移除记录");
    let active: Vec<_> = kit.active_status_events().collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].event_date, date(2024, 1, 12));
}

#[tokio::test]
async fn test_kit_not_found_and_blank_input() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);

    assert_rule_kind(
        state
            .kit_api
            .create_kit_status_event(event_input("NOPE", KitStatusCode::CustomReceived, date(2024, 1, 10)))
            .await,
        ErrorKind::NotFound,
    );

    let err = state
        .kit_api
        .create_kit_status_event(event_input("  ", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)), "空白套件号应为输入错误: {}", err);
}

#[tokio::test]
async fn test_generate_build_start_events() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001", "K002", "K003"]);
    let api = &state.kit_api;

    // K001: PLAN_BUILD + 扫码 → 生成
    advance_to_plan_build(&state, "K001", 1).await;
    api.capture_component_serial("K001", engine_capture("EN-0001")).unwrap();

    // K002: PLAN_BUILD, 未扫码 → 不在候选内
    advance_to_plan_build(&state, "K002", 2).await;

    // K003: 仅 CUSTOM_RECEIVED → 不在候选内
    api.create_kit_status_event(event_input("K003", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap();

    let result = api.generate_build_start_events().await.unwrap();
    assert_eq!(result.created, vec!["K001".to_string()]);
    assert!(result.skipped.is_empty());

    let kit = api.get_kit("K001").unwrap();
    assert!(kit.active_event(KitStatusCode::BuildStart).is_some());

    // 再次执行不会重复生成
    let again = api.generate_build_start_events().await.unwrap();
    assert!(again.created.is_empty());
}

#[tokio::test]
async fn test_acknowledge_partner_status() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    create_kits(&state, &["K001"]);
    let api = &state.kit_api;

    api.create_kit_status_event(event_input("K001", KitStatusCode::CustomReceived, date(2024, 1, 10)))
        .await
        .unwrap();

    let partner_code = KitStatusCode::CustomReceived.partner_status_code();
    let event = api.acknowledge_partner_status("K001", partner_code).unwrap();
    assert!(event.partner_ack_at.is_some());

    let kit = api.get_kit("K001").unwrap();
    let stored = kit.active_event(KitStatusCode::CustomReceived).unwrap();
    assert_eq!(stored.partner_ack_at, event.partner_ack_at);

    // 未创建的状态无法回执
    assert_rule_kind(
        api.acknowledge_partner_status("K001", KitStatusCode::PlanBuild.partner_status_code()),
        ErrorKind::NotFound,
    );
    assert_rule_kind(
        api.acknowledge_partner_status("K001", "NO_SUCH_CODE"),
        ErrorKind::NotFound,
    );
}
