//! Decision model: a small feed-forward classifier over the feature vector.
//!
//! Topology: 20 inputs → 16 ReLU units → 3 logits → softmax over
//! (BUY, SELL, HOLD). Forward inference is deterministic for fixed
//! parameters. Parameters live for the lifetime of the model and change
//! only through [`DecisionModel::online_update`].
//!
//! Online learning takes exactly one SGD step on cross-entropy per realized
//! outcome. Updates are serialized by an in-flight flag: a request that
//! arrives while another update holds the flag is dropped, not queued.

use crate::domain::Action;
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::rng::RngHierarchy;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

pub const HIDDEN_UNITS: usize = 16;
pub const OUTPUTS: usize = 3;
pub const LEARNING_RATE: f64 = 0.01;

/// Initial weight range (uniform ±INIT_SCALE).
const INIT_SCALE: f64 = 0.1;
/// Initial HOLD logit offset; an untrained model leans towards HOLD.
const HOLD_BIAS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("parameter shape mismatch: {0}")]
    Shape(String),

    #[error("model parameters are poisoned by a panicked writer")]
    Poisoned,

    #[error("model file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("model file format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw network parameters (row-major: one row per destination unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub hidden_weights: Vec<Vec<f64>>,
    pub hidden_bias: Vec<f64>,
    pub output_weights: Vec<Vec<f64>>,
    pub output_bias: Vec<f64>,
}

impl ModelParams {
    /// All-zero parameters. Every input maps to a uniform distribution.
    pub fn zeros() -> Self {
        Self {
            hidden_weights: vec![vec![0.0; FEATURE_COUNT]; HIDDEN_UNITS],
            hidden_bias: vec![0.0; HIDDEN_UNITS],
            output_weights: vec![vec![0.0; HIDDEN_UNITS]; OUTPUTS],
            output_bias: vec![0.0; OUTPUTS],
        }
    }

    /// Small uniform weights, zero hidden bias, HOLD-leaning output bias.
    pub fn initialize<R: Rng>(rng: &mut R) -> Self {
        let mut params = Self::zeros();
        for row in params
            .hidden_weights
            .iter_mut()
            .chain(params.output_weights.iter_mut())
        {
            for w in row.iter_mut() {
                *w = rng.gen_range(-INIT_SCALE..=INIT_SCALE);
            }
        }
        params.output_bias[Action::Hold.index()] = HOLD_BIAS;
        params
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let rows_ok = |rows: &[Vec<f64>], n: usize, width: usize| {
            rows.len() == n && rows.iter().all(|r| r.len() == width)
        };
        if !rows_ok(&self.hidden_weights, HIDDEN_UNITS, FEATURE_COUNT) {
            return Err(ModelError::Shape(format!(
                "hidden weights must be {HIDDEN_UNITS}x{FEATURE_COUNT}"
            )));
        }
        if !rows_ok(&self.output_weights, OUTPUTS, HIDDEN_UNITS) {
            return Err(ModelError::Shape(format!(
                "output weights must be {OUTPUTS}x{HIDDEN_UNITS}"
            )));
        }
        if self.hidden_bias.len() != HIDDEN_UNITS || self.output_bias.len() != OUTPUTS {
            return Err(ModelError::Shape("bias length".into()));
        }
        Ok(())
    }

    fn forward(&self, x: &[f64]) -> Activations {
        let pre: Vec<f64> = self
            .hidden_weights
            .iter()
            .zip(&self.hidden_bias)
            .map(|(row, b)| dot(row, x) + b)
            .collect();
        let hidden: Vec<f64> = pre.iter().map(|v| v.max(0.0)).collect();

        let mut logits = [0.0; OUTPUTS];
        for (k, logit) in logits.iter_mut().enumerate() {
            *logit = dot(&self.output_weights[k], &hidden) + self.output_bias[k];
        }

        Activations {
            pre,
            hidden,
            probs: softmax(logits),
        }
    }

    /// One gradient-descent step on cross-entropy toward `target`.
    fn sgd_step(&mut self, x: &[f64], target: [f64; OUTPUTS], learning_rate: f64) {
        let act = self.forward(x);
        let d_logits: Vec<f64> = (0..OUTPUTS).map(|k| act.probs[k] - target[k]).collect();

        // Backprop into the hidden layer before touching output weights.
        let d_hidden: Vec<f64> = (0..HIDDEN_UNITS)
            .map(|j| {
                if act.pre[j] <= 0.0 {
                    return 0.0;
                }
                (0..OUTPUTS)
                    .map(|k| self.output_weights[k][j] * d_logits[k])
                    .sum()
            })
            .collect();

        for k in 0..OUTPUTS {
            for j in 0..HIDDEN_UNITS {
                self.output_weights[k][j] -= learning_rate * d_logits[k] * act.hidden[j];
            }
            self.output_bias[k] -= learning_rate * d_logits[k];
        }

        for j in 0..HIDDEN_UNITS {
            if d_hidden[j] == 0.0 {
                continue;
            }
            for (w, xi) in self.hidden_weights[j].iter_mut().zip(x) {
                *w -= learning_rate * d_hidden[j] * xi;
            }
            self.hidden_bias[j] -= learning_rate * d_hidden[j];
        }
    }
}

struct Activations {
    pre: Vec<f64>,
    hidden: Vec<f64>,
    probs: [f64; OUTPUTS],
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softmax(logits: [f64; OUTPUTS]) -> [f64; OUTPUTS] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = logits.map(|l| (l - max).exp());
    let sum: f64 = exps.iter().sum();
    exps.map(|e| e / sum)
}

/// Probability distribution over (BUY, SELL, HOLD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionProbabilities(pub [f64; OUTPUTS]);

impl ActionProbabilities {
    pub fn get(&self, action: Action) -> f64 {
        self.0[action.index()]
    }

    /// Most likely action and its probability. Ties resolve in BUY, SELL, HOLD order.
    pub fn best(&self) -> (Action, f64) {
        let mut best = (Action::Buy, self.0[0]);
        for action in [Action::Sell, Action::Hold] {
            let p = self.get(action);
            if p > best.1 {
                best = (action, p);
            }
        }
        best
    }
}

/// Result of an online-update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// One optimization step was taken toward `target`.
    Applied { target: Action },
    /// Another update was in flight; this one was dropped.
    Skipped,
    /// The outcome yields no target (a losing HOLD); parameters untouched.
    NoTarget,
}

/// One-hot target for a realized outcome.
///
/// Profit reinforces the realized action. A loss (or break-even) reinforces
/// the opposite direction; HOLD has no opposite and is left alone.
pub fn learning_target(action: Action, profit: f64) -> Option<Action> {
    if profit > 0.0 {
        return Some(action);
    }
    action.side().map(|side| side.opposite().action())
}

/// Classifier with persistent parameters and serialized online learning.
#[derive(Debug)]
pub struct DecisionModel {
    params: RwLock<ModelParams>,
    learning: AtomicBool,
    learning_rate: f64,
}

impl DecisionModel {
    /// Fresh model with parameters drawn from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = RngHierarchy::new(seed).rng_for("model", 0);
        Self::with_params(ModelParams::initialize(&mut rng))
    }

    pub fn from_params(params: ModelParams) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(Self::with_params(params))
    }

    fn with_params(params: ModelParams) -> Self {
        Self {
            params: RwLock::new(params),
            learning: AtomicBool::new(false),
            learning_rate: LEARNING_RATE,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ModelParams>, ModelError> {
        self.params.read().map_err(|_| ModelError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ModelParams>, ModelError> {
        self.params.write().map_err(|_| ModelError::Poisoned)
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<ActionProbabilities, ModelError> {
        let params = self.read()?;
        Ok(ActionProbabilities(params.forward(features.as_slice()).probs))
    }

    /// Snapshot of the current parameters.
    pub fn params(&self) -> Result<ModelParams, ModelError> {
        Ok(self.read()?.clone())
    }

    pub fn is_learning(&self) -> bool {
        self.learning.load(Ordering::Acquire)
    }

    /// Claim the in-flight flag. `None` if an update is already running.
    pub fn try_begin_update(&self) -> Option<UpdateGuard<'_>> {
        self.learning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateGuard { model: self })
    }

    /// Apply one learning step for a past decision, unless one is in flight.
    pub fn online_update(
        &self,
        features: &FeatureVector,
        action: Action,
        profit: f64,
    ) -> Result<UpdateOutcome, ModelError> {
        match self.try_begin_update() {
            Some(guard) => guard.apply(features, action, profit),
            None => {
                debug!("online update for {action} dropped: another update is in flight");
                Ok(UpdateOutcome::Skipped)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let params = self.params()?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &params)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        let params: ModelParams = serde_json::from_reader(reader)?;
        Self::from_params(params)
    }
}

/// Holds the in-flight learning flag; released on drop.
pub struct UpdateGuard<'a> {
    model: &'a DecisionModel,
}

impl UpdateGuard<'_> {
    pub fn apply(
        self,
        features: &FeatureVector,
        action: Action,
        profit: f64,
    ) -> Result<UpdateOutcome, ModelError> {
        let Some(target) = learning_target(action, profit) else {
            return Ok(UpdateOutcome::NoTarget);
        };
        let mut one_hot = [0.0; OUTPUTS];
        one_hot[target.index()] = 1.0;

        let mut params = self.model.write()?;
        params.sgd_step(features.as_slice(), one_hot, self.model.learning_rate);
        debug!("online update: {action} with profit {profit:.2} reinforced {target}");
        Ok(UpdateOutcome::Applied { target })
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.model.learning.store(false, Ordering::Release);
    }
}
