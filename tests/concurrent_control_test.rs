// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证套件 revision 乐观锁与 VIN 全局唯一在并发下成立
// ==========================================


use skd_kit_tracker::app::AppState;
use skd_kit_tracker::repository::RepositoryError;
use skd_kit_tracker::{ErrorKind, FixedClock};
use std::sync::Arc;
use std::thread;
use test_helpers::{create_kits, create_test_state, reference_instant, seed_reference_data, vin};

#[test]
fn test_stale_kit_save_is_rejected() {
    let (_temp_file, state_a) = create_test_state();
    seed_reference_data(&state_a);
    create_kits(&state_a, &["K001"]);

    // 第二个进程视角: 独立连接
    let state_b = AppState::with_clock(
        state_a.db_path.clone(),
        Arc::new(FixedClock(reference_instant())),
    )
    .expect("Failed to create second AppState");

    let mut stale = state_a.kit_repo.find_kit("K001").unwrap().unwrap();
    assert_eq!(stale.revision(), 0);

    state_b.kit_api.assign_kit_vin("K001", &vin(1)).unwrap();

    let result = state_a
        .kit_repo
        .transaction(|store| store.save_kit(&mut stale));
    match result {
        Err(RepositoryError::OptimisticLockFailure {
            kit_no,
            expected,
            actual,
        }) => {
            assert_eq!(kit_no, "K001");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("应返回乐观锁冲突, 实际: {:?}", other),
    }

    let kit = state_a.kit_api.get_kit("K001").unwrap();
    assert_eq!(kit.vin(), Some(vin(1).as_str()), "并发写入的结果不应被覆盖");
}

#[test]
fn test_concurrent_vin_assignment_single_winner() {
    let (_temp_file, state) = create_test_state();
    seed_reference_data(&state);
    let kit_nos = ["K001", "K002", "K003", "K004"];
    create_kits(&state, &kit_nos);

    let handles: Vec<_> = kit_nos
        .iter()
        .map(|kit_no| {
            let api = state.kit_api.clone();
            let kit_no = kit_no.to_string();
            thread::spawn(move || api.assign_kit_vin(&kit_no, &vin(42)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "同一 VIN 只能分配给一个套件");

    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(result.rule_kind(), Some(ErrorKind::UniquenessViolation));
    }
}
