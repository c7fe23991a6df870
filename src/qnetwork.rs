use std::path::Path;

use rand::Rng;
use tch::{
    nn::{self, Module, OptimizerConfig, VarStore},
    Device, Reduction, TchError, Tensor,
};
use tracing::debug;

use crate::config::TrainingConfig;
use crate::environment::Action;
use crate::error::Result;
use crate::replay_buffer::Transition;
use crate::state::{StateCode, QUADRANTS};

pub const HIDDEN: i64 = 128;
pub const INPUTS: i64 = QUADRANTS as i64;
pub const OUTPUTS: i64 = Action::ALL.len() as i64;

/// 4 → 128 → 128 → 4 action-value network.
#[derive(Debug)]
pub struct QNetwork {
    layer1: nn::Linear,
    layer2: nn::Linear,
    layer3: nn::Linear,
}

impl QNetwork {
    pub fn new(vs: &nn::Path) -> Self {
        Self {
            layer1: nn::linear(vs / "layer1", INPUTS, HIDDEN, Default::default()),
            layer2: nn::linear(vs / "layer2", HIDDEN, HIDDEN, Default::default()),
            layer3: nn::linear(vs / "layer3", HIDDEN, OUTPUTS, Default::default()),
        }
    }
}

impl nn::Module for QNetwork {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.layer1)
            .relu()
            .apply(&self.layer2)
            .relu()
            .apply(&self.layer3)
    }
}

/// Index of the largest value. Ties go to the lowest index, NaNs never win.
pub fn greedy_action(q_values: &[f32]) -> usize {
    q_values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_q), (i, &q)| {
            if q > best_q {
                (i, q)
            } else {
                (best, best_q)
            }
        })
        .0
}

/// `max(floor, exp(-rate * episode))`.
pub fn epsilon_for_episode(episode: usize, floor: f64, rate: f64) -> f64 {
    (-rate * episode as f64).exp().max(floor)
}

/// Bootstrapped regression targets, shape `[batch, 1]`:
/// `reward + gamma * (1 - done) * max_a next_q[a]`.
///
/// `rewards` and `dones` are `[batch, 1]` floats, `dones` holding 0 or 1.
pub fn td_targets(rewards: &Tensor, dones: &Tensor, next_q: &Tensor, gamma: f64) -> Tensor {
    let (max_next, _) = next_q.max_dim(1, true);
    let continuing = dones.neg() + 1.0;
    rewards + max_next * continuing * gamma
}

/// Online and target networks plus the optimizer that trains the former.
///
/// Each network lives in its own `VarStore`; syncing deep-copies the online
/// weights into the target store so the two never share storage.
pub struct DqnAgent {
    online: QNetwork,
    target: QNetwork,
    online_vs: VarStore,
    target_vs: VarStore,
    optimizer: nn::Optimizer,
    device: Device,
    gamma: f64,
}

impl DqnAgent {
    pub fn new(config: &TrainingConfig) -> Result<Self> {
        let device = Device::cuda_if_available();
        let online_vs = VarStore::new(device);
        let online = QNetwork::new(&online_vs.root());

        let mut target_vs = VarStore::new(device);
        let target = QNetwork::new(&target_vs.root());
        target_vs.copy(&online_vs)?;
        target_vs.freeze();

        let optimizer = nn::Adam::default().build(&online_vs, config.learning_rate)?;

        Ok(Self {
            online,
            target,
            online_vs,
            target_vs,
            optimizer,
            device,
            gamma: config.gamma,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn online_vars(&self) -> &VarStore {
        &self.online_vs
    }

    pub fn target_vars(&self) -> &VarStore {
        &self.target_vs
    }

    fn encode_states<'a>(&self, states: impl Iterator<Item = &'a StateCode>) -> Tensor {
        let flat: Vec<f32> = states.flat_map(|s| s.bits()).collect();
        Tensor::from_slice(&flat)
            .to(self.device)
            .view([-1, INPUTS])
    }

    /// Predicted action-values for one state, in [`Action::ALL`] order.
    pub fn q_values(&self, state: StateCode) -> Result<Vec<f32>> {
        let input = self.encode_states(std::iter::once(&state));
        let q = tch::no_grad(|| self.online.forward(&input));
        Ok(Vec::<f32>::try_from(&q.flatten(0, -1).to(Device::Cpu))?)
    }

    /// Greedy action for `state`.
    pub fn act(&self, state: StateCode) -> Result<Action> {
        let q = self.q_values(state)?;
        Ok(Action::ALL[greedy_action(&q)])
    }

    /// Uniformly random action with probability `epsilon`, greedy otherwise.
    pub fn select_action<R: Rng>(
        &self,
        state: StateCode,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<Action> {
        if rng.random::<f64>() < epsilon {
            Ok(Action::ALL[rng.random_range(0..Action::ALL.len())])
        } else {
            self.act(state)
        }
    }

    /// One gradient step on a batch. Returns the TD errors
    /// (target minus predicted value), one per transition.
    ///
    /// The predicted value of a transition is the online network's largest
    /// action-value for its state, whatever action was actually taken.
    pub fn learn(&mut self, batch: &[&Transition]) -> Result<Vec<f32>> {
        let states = self.encode_states(batch.iter().map(|t| &t.state));
        let next_states = self.encode_states(batch.iter().map(|t| &t.next_state));

        let rewards: Vec<f32> = batch.iter().map(|t| t.reward).collect();
        let rewards = Tensor::from_slice(&rewards).to(self.device).view([-1, 1]);

        let dones: Vec<f32> = batch
            .iter()
            .map(|t| if t.done { 1.0 } else { 0.0 })
            .collect();
        let dones = Tensor::from_slice(&dones).to(self.device).view([-1, 1]);

        let targets = tch::no_grad(|| {
            let next_q = self.target.forward(&next_states);
            td_targets(&rewards, &dones, &next_q, self.gamma)
        });

        let (predicted, _) = self.online.forward(&states).max_dim(1, true);
        let td_errors = (&targets - &predicted).detach();

        let loss = predicted.smooth_l1_loss(&targets, Reduction::Mean, 1.0);
        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.step();

        let td_errors = Vec::<f32>::try_from(&td_errors.flatten(0, -1).to(Device::Cpu))?;
        debug!(loss = loss.double_value(&[]), ?td_errors, "learning step");
        Ok(td_errors)
    }

    /// Overwrites the target weights with a copy of the online weights.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target_vs.copy(&self.online_vs)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.online_vs.save(path)?;
        Ok(())
    }

    /// Loads online weights saved by [`DqnAgent::save`] and syncs the target.
    /// Fails if the file is malformed or its shapes differ.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        check_checkpoint(&self.online_vs, &read_checkpoint(path)?)?;
        self.online_vs.load(path)?;
        self.sync_target()
    }
}

fn read_checkpoint(path: &Path) -> Result<Vec<(String, Tensor)>> {
    let named = match path.extension().and_then(|ext| ext.to_str()) {
        Some("npz") => Tensor::read_npz(path)?,
        Some("safetensors") => Tensor::read_safetensors(path)?,
        _ => Tensor::load_multi(path)?,
    };
    Ok(named)
}

/// `VarStore::load` broadcasts into existing variables, so names and sizes
/// are compared up front.
fn check_checkpoint(vs: &VarStore, saved: &[(String, Tensor)]) -> Result<()> {
    let expected = vs.variables();
    if saved.len() != expected.len() {
        return Err(TchError::Shape(format!(
            "checkpoint holds {} tensors, network has {}",
            saved.len(),
            expected.len()
        ))
        .into());
    }
    for (name, tensor) in saved {
        let want = expected
            .get(name)
            .ok_or_else(|| TchError::Shape(format!("unexpected tensor {name} in checkpoint")))?;
        if tensor.size() != want.size() {
            return Err(TchError::Shape(format!(
                "{name}: checkpoint has {:?}, network has {:?}",
                tensor.size(),
                want.size()
            ))
            .into());
        }
    }
    Ok(())
}
