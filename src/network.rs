use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DuelistError, Result};

/// Width of both hidden layers.
pub const HIDDEN_SIZE: usize = 128;

/// Damping applied to the error signal pushed into the second weight matrix.
const BACKPROP_DAMPING: f32 = 0.1;

const BIAS_INIT_RANGE: f32 = 0.005;

/// A fixed-topology Q-value approximator: two ReLU hidden layers of width
/// [`HIDDEN_SIZE`] and a linear output with one unit per action.
///
/// `Clone` produces a fully independent copy; the target network is kept in sync this way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetwork {
    pub weights1: Array2<f32>,
    pub bias1: Array1<f32>,
    pub weights2: Array2<f32>,
    pub bias2: Array1<f32>,
    pub weights3: Array2<f32>,
    pub bias3: Array1<f32>,
}

impl QNetwork {
    /// Create a network with He-uniform weights (`[-s, s]`, `s = sqrt(2 / fan_in)`) and
    /// biases drawn from a small range around zero.
    pub fn new<R: Rng + ?Sized>(state_size: usize, action_size: usize, rng: &mut R) -> Result<Self> {
        if state_size == 0 || action_size == 0 {
            return Err(DuelistError::invalid_parameter(
                "network",
                "state and action sizes must be > 0",
            ));
        }
        Ok(QNetwork {
            weights1: he_uniform(state_size, HIDDEN_SIZE, rng),
            bias1: small_bias(HIDDEN_SIZE, rng),
            weights2: he_uniform(HIDDEN_SIZE, HIDDEN_SIZE, rng),
            bias2: small_bias(HIDDEN_SIZE, rng),
            weights3: he_uniform(HIDDEN_SIZE, action_size, rng),
            bias3: small_bias(action_size, rng),
        })
    }

    pub fn state_size(&self) -> usize {
        self.weights1.nrows()
    }

    pub fn action_size(&self) -> usize {
        self.weights3.ncols()
    }

    /// Evaluate one Q-value per action for `state`.
    pub fn forward(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_input(state)?;
        let (_, h2) = self.hidden(state);
        Ok(h2.dot(&self.weights3) + &self.bias3)
    }

    /// One stochastic gradient step pulling `Q(state, action)` toward `target`.
    ///
    /// Only the output unit of `action` and the second weight matrix are adjusted; the
    /// first layer and the hidden biases stay fixed. Returns the prediction made before
    /// the step.
    pub fn update(
        &mut self,
        state: ArrayView1<f32>,
        action: usize,
        target: f32,
        learning_rate: f32,
    ) -> Result<f32> {
        if action >= self.action_size() {
            return Err(DuelistError::InvalidAction {
                action,
                max_actions: self.action_size(),
            });
        }
        self.check_input(state)?;

        let (h1, h2) = self.hidden(state);
        let predicted = h2.dot(&self.weights3.column(action)) + self.bias3[action];
        let step = learning_rate * (predicted - target);

        self.weights3.column_mut(action).scaled_add(-step, &h2);
        self.bias3[action] -= step;

        // Reads the output weight after its own update.
        for (i, &activation) in h2.iter().enumerate() {
            if activation > 0.0 {
                let signal = step * self.weights3[[i, action]] * BACKPROP_DAMPING;
                self.weights2.column_mut(i).scaled_add(-signal, &h1);
            }
        }
        Ok(predicted)
    }

    /// Check that all parameter shapes agree with each other and every value is finite.
    pub fn validate(&self) -> Result<()> {
        let hidden = self.weights1.ncols();
        let shapes = [
            ("bias1", vec![self.bias1.len()], vec![hidden]),
            ("weights2", self.weights2.shape().to_vec(), vec![hidden, hidden]),
            ("bias2", vec![self.bias2.len()], vec![hidden]),
            ("weights3 rows", vec![self.weights3.nrows()], vec![hidden]),
            ("bias3", vec![self.bias3.len()], vec![self.action_size()]),
        ];
        for (name, actual, expected) in shapes {
            if actual != expected {
                return Err(DuelistError::dimension_mismatch(
                    format!("{} of shape {:?}", name, expected),
                    format!("{:?}", actual),
                ));
            }
        }
        if self.state_size() == 0 || self.action_size() == 0 {
            return Err(DuelistError::invalid_parameter("network", "empty input or output layer"));
        }

        let finite = self.weights1.iter()
            .chain(self.bias1.iter())
            .chain(self.weights2.iter())
            .chain(self.bias2.iter())
            .chain(self.weights3.iter())
            .chain(self.bias3.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(DuelistError::InvalidCheckpoint(
                "network contains non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }

    /// Save the network to a binary file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Load a network from a binary file written by [`QNetwork::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let network: QNetwork = bincode::deserialize_from(reader)?;
        network.validate()?;
        Ok(network)
    }

    fn check_input(&self, state: ArrayView1<f32>) -> Result<()> {
        if state.len() != self.state_size() {
            return Err(DuelistError::dimension_mismatch(
                self.state_size().to_string(),
                state.len().to_string(),
            ));
        }
        Ok(())
    }

    fn hidden(&self, state: ArrayView1<f32>) -> (Array1<f32>, Array1<f32>) {
        let h1 = (state.dot(&self.weights1) + &self.bias1).mapv_into(relu);
        let h2 = (h1.dot(&self.weights2) + &self.bias2).mapv_into(relu);
        (h1, h2)
    }
}

fn relu(v: f32) -> f32 {
    v.max(0.0)
}

fn he_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Array2<f32> {
    let limit = (2.0 / fan_in as f32).sqrt();
    Array2::random_using((fan_in, fan_out), Uniform::new(-limit, limit), rng)
}

fn small_bias<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Array1<f32> {
    Array1::random_using(size, Uniform::new(-BIAS_INIT_RANGE, BIAS_INIT_RANGE), rng)
}
