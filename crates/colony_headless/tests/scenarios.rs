//! Bundled scenario files load, play cleanly and replay identically.

use std::path::PathBuf;

use colony_headless::{run_scenario, Scenario, ScenarioRunner};
use colony_test_utils::determinism::verify_determinism;

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn bundled_hamlet_matches_builtin() {
    let loaded = Scenario::load(scenario_path("hamlet.ron")).unwrap();
    let builtin = Scenario::hamlet();

    let a = run_scenario(loaded, Some(100)).unwrap();
    let b = run_scenario(builtin, Some(100)).unwrap();
    assert_eq!(a.final_state_hash, b.final_state_hash);
}

#[test]
fn flaky_porters_recover_from_failures() {
    let scenario = Scenario::load(scenario_path("flaky_porters.ron")).unwrap();
    let total = scenario.build_colony().total_held();
    let mut runner = ScenarioRunner::new(scenario).unwrap();
    for _ in 0..300 {
        runner.step().unwrap();
    }
    assert_eq!(runner.colony().total_held(), total);

    let metrics = runner.finish();
    assert!(metrics.audit_passed);
    assert!(metrics.rollbacks > 0);
    assert!(metrics.units_delivered > 0);
}

#[test]
fn flaky_porters_are_deterministic() {
    let scenario = Scenario::load(scenario_path("flaky_porters.ron")).unwrap();
    let result = verify_determinism(
        4,
        120,
        || ScenarioRunner::new(scenario.clone()).unwrap(),
        |runner: &mut ScenarioRunner| runner.step().unwrap(),
        |runner: &ScenarioRunner| runner.colony().state_hash(),
    );
    result.assert_deterministic();
}
