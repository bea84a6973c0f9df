mod common;

use common::{square, ModelBuilder, WorldBuilder};
use msystem_core::snapshot::{DeltaState, ObjectKind};
use msystem_core::world::TileState;
use msystem_core::{SimEvent, SimState, Termination};
use msystem_data::Vector3;
use msystem_lib::app::SimulationController;
use std::time::Duration;

/// A membrane square whose single `s` shuttles in and out forever.
fn shuttle_model() -> ModelBuilder {
    ModelBuilder::new()
        .glue("g")
        .protein("p")
        .floating("s", 0.0)
        .floating("noise", 1.0)
        .membrane_tile("m", "g", "p")
        .uniport_in("import", "p", "s")
        .uniport_out("export", "p", "s")
        .seed_tile("m", Vector3::ZERO)
        .seed_floating("s", 1, Vector3::new(0.5, 0.5, 1.0))
        .seed_floating("noise", 5, Vector3::new(10.0, 10.0, 10.0))
}

fn pool_positions(sim: &msystem_core::Simulator) -> Vec<(String, Vector3)> {
    sim.world()
        .pool
        .iter()
        .map(|o| (o.name().to_string(), o.position))
        .collect()
}

#[test]
fn test_no_applicable_rule_leaves_world_unchanged() {
    let model = ModelBuilder::new()
        .glue("g")
        .floating("a", 2.0)
        .tile(square("q", "g", "g"))
        .seed_tile("q", Vector3::ZERO)
        .seed_floating("a", 4, Vector3::new(3.0, 0.0, 0.0));
    let mut sim = WorldBuilder::new(model).build_simulator();
    let before = pool_positions(&sim);

    let outcome = sim.run_simulation(0).unwrap();

    assert_eq!(outcome.steps, 0);
    assert_eq!(outcome.termination, Termination::NoApplicableRule);
    assert_eq!(pool_positions(&sim), before);
    assert_tile_count!(sim.world(), 1);
    assert_eq!(sim.current_step(), 0);
}

#[test]
fn test_step_limit_reached() {
    let mut sim = WorldBuilder::new(shuttle_model()).build_simulator();
    let outcome = sim.run_simulation(7).unwrap();
    assert_eq!(outcome.steps, 7);
    assert_eq!(outcome.termination, Termination::StepLimitReached);
    assert_eq!(sim.current_step(), 7);
    assert_eq!(sim.metrics().counter("Metabolic"), 7);
}

#[test]
fn test_shuttle_alternates_sides() {
    let mut sim = WorldBuilder::new(shuttle_model()).build_simulator();
    sim.step().unwrap();
    let z = |sim: &msystem_core::Simulator| {
        sim.world()
            .pool
            .iter()
            .find(|o| o.name() == "s")
            .map(|o| o.position.z)
            .unwrap()
    };
    assert!(z(&sim) < 0.0);
    sim.step().unwrap();
    assert!(z(&sim) > 0.0);
}

#[test]
fn test_restart_replays_identically() {
    let mut sim = WorldBuilder::new(shuttle_model()).with_seed(9).build_simulator();
    sim.run_simulation(20).unwrap();
    let first = pool_positions(&sim);

    sim.restart();
    assert_eq!(sim.current_step(), 0);
    sim.run_simulation(20).unwrap();
    assert_eq!(pool_positions(&sim), first);

    let mut other = WorldBuilder::new(shuttle_model()).with_seed(9).build_simulator();
    other.run_simulation(20).unwrap();
    assert_eq!(pool_positions(&other), first);
}

#[test]
fn test_numbered_kills_are_reported() {
    let model = ModelBuilder::new()
        .glue("g")
        .bond("g", "g", &[])
        .tile(square("q", "g", "g"))
        .seed_tile("q", Vector3::ZERO)
        .seed_tile("q", Vector3::X)
        .seed_tile("q", Vector3::new(2.0, 0.0, 0.0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sim = WorldBuilder::new(model).build_simulator().with_events(tx);

    let outcome = sim.run_with_kills(10, "q", 2, false).unwrap();
    assert_eq!(outcome.steps, 1);
    assert_tile_count!(sim.world(), 1);
    assert!(sim.world().tiles().all(|t| t.bonds().count() == 0));

    let mut destroyed = 0;
    let mut killed_message = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            SimEvent::Snapshot(s) if s.step == 1 => {
                destroyed = s.count(ObjectKind::Tile, DeltaState::Destroy);
            }
            SimEvent::Notification(n) => killed_message |= n.message.contains("killed"),
            _ => {}
        }
    }
    assert_eq!(destroyed, 2);
    assert!(killed_message);
}

#[test]
fn test_certain_kill_probability_clears_tiles() {
    let model = ModelBuilder::new()
        .glue("g")
        .tile(square("q", "g", "g"))
        .seed_tile("q", Vector3::ZERO)
        .seed_tile("q", Vector3::new(3.0, 0.0, 0.0));
    let mut sim = WorldBuilder::new(model).build_simulator();
    let outcome = sim.run_with_kill_probability(10, "q", 1.0).unwrap();
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.termination, Termination::NoApplicableRule);
    assert_tile_count!(sim.world(), 0);
}

#[test]
fn test_stop_mid_run_leaves_consistent_world() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sim = WorldBuilder::new(shuttle_model()).build_simulator().with_events(tx);
    let controller = SimulationController::spawn(sim);

    controller.start(0).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    controller.stop();
    let sim = controller.shutdown().unwrap();

    assert_eq!(sim.state(), SimState::Idle);
    assert!(sim
        .world()
        .all_tiles()
        .all(|t| matches!(t.state, TileState::Unchanged | TileState::Destroy)));

    drop(sim);
    let mut finished = None;
    while let Some(event) = rx.blocking_recv() {
        if let SimEvent::Finished(outcome) = event {
            finished = Some(outcome);
        }
    }
    assert_eq!(finished.map(|o| o.termination), Some(Termination::Stop));
}

#[test]
fn test_controller_step_and_restart() {
    let sim = WorldBuilder::new(shuttle_model()).build_simulator();
    let controller = SimulationController::spawn(sim);
    controller.step().unwrap();
    controller.step().unwrap();
    controller.restart().unwrap();
    controller.step().unwrap();
    let sim = controller.shutdown().unwrap();
    assert_eq!(sim.current_step(), 1);
}
