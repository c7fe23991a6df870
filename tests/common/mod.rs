//! In-memory stand-in for the remote simulator.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mix_dqn::config::SimulatorConfig;
use mix_dqn::environment::{Handle, ShakeEnvironment, Simulator};
use mix_dqn::{MixError, Result};

pub const TABLE: Handle = 1;
pub const BOX: Handle = 2;
pub const SCRIPT: Handle = 3;
pub const FIRST_OBJECT: Handle = 100;

/// Everything the fake sessions share with the test that created them.
#[derive(Debug, Default)]
pub struct World {
    /// XY positions of the objects each new session drops.
    pub layout: Vec<[f64; 2]>,
    /// Ticks after the spawn call before the scene raises the sentinel.
    pub drop_ticks: usize,
    pub connects: usize,
    pub stops: usize,
    pub ticks: usize,
    pub script_calls: Vec<(String, Vec<i64>, Vec<f64>, Vec<String>)>,
    /// Every position written to the container, in order.
    pub box_moves: Vec<[f64; 3]>,
    pub events: Vec<String>,
    /// Fail the n-th tick (1-based, counted across sessions).
    pub fail_on_tick: Option<usize>,
}

pub type SharedWorld = Rc<RefCell<World>>;

pub struct FakeSimulator {
    world: SharedWorld,
    positions: HashMap<Handle, [f64; 3]>,
    running: bool,
    spawned_at: Option<usize>,
    signal: Option<f64>,
}

impl FakeSimulator {
    pub fn new(world: SharedWorld) -> Self {
        world.borrow_mut().connects += 1;
        let mut positions = HashMap::new();
        positions.insert(BOX, [0.0, 0.0, 0.5]);
        Self {
            world,
            positions,
            running: false,
            spawned_at: None,
            signal: None,
        }
    }

    fn log(&self, event: impl Into<String>) {
        self.world.borrow_mut().events.push(event.into());
    }
}

impl Simulator for FakeSimulator {
    fn object_handle(&mut self, name: &str) -> Result<Handle> {
        self.log(format!("handle {name}"));
        match name {
            "/Table" => Ok(TABLE),
            "/Table/Box" => Ok(BOX),
            other => other
                .strip_prefix("Cylinder")
                .and_then(|i| i.parse::<i64>().ok())
                .filter(|i| self.positions.contains_key(&(FIRST_OBJECT + i)))
                .map(|i| FIRST_OBJECT + i)
                .ok_or_else(|| MixError::Simulator(format!("no object named {other}"))),
        }
    }

    fn child_script(&mut self, object: Handle) -> Result<Handle> {
        if object != TABLE {
            return Err(MixError::Simulator(format!("object {object} has no script")));
        }
        Ok(SCRIPT)
    }

    fn start_simulation(&mut self) -> Result<()> {
        self.log("start");
        self.running = true;
        Ok(())
    }

    fn stop_simulation(&mut self) -> Result<()> {
        self.log("stop");
        self.running = false;
        self.world.borrow_mut().stops += 1;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let tick = {
            let mut world = self.world.borrow_mut();
            world.ticks += 1;
            if world.fail_on_tick == Some(world.ticks) {
                return Err(MixError::Simulator("connection lost".to_string()));
            }
            world.ticks
        };
        if let Some(spawned) = self.spawned_at {
            if tick - spawned > self.world.borrow().drop_ticks {
                self.signal = Some(99.0);
            }
        }
        Ok(())
    }

    fn object_position(&mut self, object: Handle) -> Result<[f64; 3]> {
        self.positions
            .get(&object)
            .copied()
            .ok_or_else(|| MixError::Simulator(format!("unknown handle {object}")))
    }

    fn set_object_position(&mut self, object: Handle, position: [f64; 3]) -> Result<()> {
        if object == BOX {
            self.world.borrow_mut().box_moves.push(position);
        }
        self.positions.insert(object, position);
        Ok(())
    }

    fn call_script_function(
        &mut self,
        function: &str,
        script: Handle,
        ints: &[i64],
        floats: &[f64],
        strings: &[&str],
    ) -> Result<()> {
        if script != SCRIPT {
            return Err(MixError::Simulator(format!("unknown script {script}")));
        }
        self.log(format!("call {function}"));
        let layout = {
            let mut world = self.world.borrow_mut();
            world.script_calls.push((
                function.to_string(),
                ints.to_vec(),
                floats.to_vec(),
                strings.iter().map(|s| s.to_string()).collect(),
            ));
            world.layout.clone()
        };
        for (i, [x, y]) in layout.into_iter().enumerate() {
            self.positions.insert(FIRST_OBJECT + i as i64, [x, y, 0.1]);
        }
        self.spawned_at = Some(self.world.borrow().ticks);
        Ok(())
    }

    fn float_signal(&mut self, name: &str) -> Result<Option<f64>> {
        if name != "toPython" {
            return Ok(None);
        }
        Ok(self.signal)
    }

    fn set_float_signal(&mut self, name: &str, value: f64) -> Result<()> {
        if name == "toPython" {
            self.signal = Some(value);
        }
        Ok(())
    }
}

pub fn world(layout: Vec<[f64; 2]>) -> SharedWorld {
    Rc::new(RefCell::new(World {
        layout,
        drop_ticks: 3,
        ..Default::default()
    }))
}

/// Config for a scene with `blocks` objects.
pub fn sim_config(blocks: usize) -> SimulatorConfig {
    SimulatorConfig {
        blocks,
        ..Default::default()
    }
}

pub fn environment(
    world: &SharedWorld,
) -> ShakeEnvironment<FakeSimulator, impl FnMut() -> Result<FakeSimulator>> {
    let blocks = world.borrow().layout.len();
    let world = world.clone();
    ShakeEnvironment::new(sim_config(blocks), move || {
        Ok(FakeSimulator::new(world.clone()))
    })
}

/// Two objects per quadrant, one of each color: every quadrant balanced.
pub fn balanced_layout() -> Vec<[f64; 2]> {
    let corners = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];
    corners.iter().chain(corners.iter()).copied().collect()
}

/// Group one entirely in quadrant A, group two entirely in quadrant D.
pub fn unbalanced_layout() -> Vec<[f64; 2]> {
    let mut layout = vec![[-1.0, 1.0]; 4];
    layout.extend(vec![[1.0, -1.0]; 4]);
    layout
}
