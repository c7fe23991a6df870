//! Tests for the simulator adapter, driven by the in-memory fake.

mod common;

use common::{balanced_layout, environment, unbalanced_layout, world};
use mix_dqn::environment::Action;
use mix_dqn::state::StateCode;
use mix_dqn::MixError;

#[test]
fn test_reset_runs_the_drop_handshake() {
    let world = world(balanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();

    let w = world.borrow();
    assert_eq!(w.connects, 1);
    assert_eq!(w.script_calls.len(), 1);
    let (function, ints, floats, strings) = &w.script_calls[0];
    assert_eq!(function, "setNumberOfBlocks");
    assert_eq!(ints, &vec![8]);
    assert_eq!(floats, &vec![14.375e-3, 0.016, 0.06, 0.8]);
    assert_eq!(strings, &vec!["cylinder".to_string()]);

    // one tick before the spawn call, four until the sentinel, twenty to settle
    assert_eq!(w.ticks, 1 + 4 + 20);

    let start = w.events.iter().position(|e| e == "start").unwrap();
    let call = w
        .events
        .iter()
        .position(|e| e == "call setNumberOfBlocks")
        .unwrap();
    let first_object = w.events.iter().position(|e| e == "handle Cylinder0").unwrap();
    assert!(start < call && call < first_object);
    assert!(w.events.iter().any(|e| e == "handle Cylinder7"));
}

#[test]
fn test_handshake_waits_for_the_sentinel() {
    let world = world(balanced_layout());
    world.borrow_mut().drop_ticks = 40;
    let mut env = environment(&world);
    env.reset().unwrap();
    assert_eq!(world.borrow().ticks, 1 + 41 + 20);
}

#[test]
fn test_each_action_is_a_ten_tick_round_trip() {
    let world = world(balanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();

    for (action, axis, sign) in [
        (Action::Up, 1, 1.0),
        (Action::Down, 1, -1.0),
        (Action::Right, 0, 1.0),
        (Action::Left, 0, -1.0),
    ] {
        let ticks_before = world.borrow().ticks;
        world.borrow_mut().box_moves.clear();
        let start = env.box_position().unwrap();

        env.apply(action).unwrap();

        let w = world.borrow();
        assert_eq!(w.ticks - ticks_before, 10, "{action}");
        assert_eq!(w.box_moves.len(), 10);
        let peak = w.box_moves[4][axis] - start[axis];
        assert!((peak - sign * 0.02).abs() < 1e-12, "{action}: peak {peak}");
        let other = 1 - axis;
        assert!(w.box_moves.iter().all(|p| p[other] == start[other]));
        let end = w.box_moves[9];
        assert!((end[axis] - start[axis]).abs() < 1e-12);
        assert_eq!(end[2], 0.5);
    }
}

#[test]
fn test_invalid_action_name_is_a_no_op() {
    let world = world(balanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();
    let ticks = world.borrow().ticks;

    assert_eq!(env.apply_named("Sideways").unwrap(), None);
    assert_eq!(world.borrow().ticks, ticks);
    assert!(world.borrow().box_moves.is_empty());

    assert_eq!(env.apply_named("Left").unwrap(), Some(Action::Left));
    assert_eq!(world.borrow().ticks, ticks + 10);
}

#[test]
fn test_observe_reads_the_scene() {
    let world = world(unbalanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();

    assert_eq!(env.object_positions().unwrap().len(), 8);
    let obs = env.observe().unwrap();
    assert_eq!(obs.state, StateCode::new(0b0110).unwrap());
    assert_eq!(obs.reward, 0.0);

    let world = common::world(balanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();
    let obs = env.observe().unwrap();
    assert!(obs.state.is_goal());
    assert_eq!(obs.reward, 4.0);
}

#[test]
fn test_operations_need_a_session() {
    let world = world(balanced_layout());
    let mut env = environment(&world);
    assert!(!env.is_running());
    assert!(matches!(env.apply(Action::Up), Err(MixError::NoSession)));
    assert!(matches!(env.observe(), Err(MixError::NoSession)));
    // stopping without a session is fine
    env.stop().unwrap();
    assert_eq!(world.borrow().stops, 0);
}

#[test]
fn test_reset_replaces_the_session() {
    let world = world(balanced_layout());
    let mut env = environment(&world);
    env.reset().unwrap();
    env.apply(Action::Right).unwrap();
    env.reset().unwrap();

    let w = world.borrow();
    assert_eq!(w.connects, 2);
    assert_eq!(w.stops, 1);
    drop(w);

    env.stop().unwrap();
    assert!(!env.is_running());
    assert_eq!(world.borrow().stops, 2);
}

#[test]
fn test_simulator_failure_propagates() {
    let world = world(balanced_layout());
    world.borrow_mut().fail_on_tick = Some(30);
    let mut env = environment(&world);
    env.reset().unwrap();
    assert!(matches!(
        env.apply(Action::Down),
        Err(MixError::Simulator(msg)) if msg == "connection lost"
    ));
}
