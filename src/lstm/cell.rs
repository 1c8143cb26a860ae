//! LSTM cell and dense sigmoid head.
//!
//! ```text
//! z   = W_x * x + W_h * h_prev + b          (4H rows, gate order i, f, g, o)
//! i   = sigmoid(z_i)    f = sigmoid(z_f)
//! g   = tanh(z_g)       o = sigmoid(z_o)
//! c   = f * c_prev + i * g
//! h   = o * tanh(c)
//! y   = sigmoid(w_out . h_T + b_out)
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of LSTM gates (input, forget, cell candidate, output).
pub const NUM_GATES: usize = 4;

/// Gate row offsets, in units of `hidden_units`.
pub const GATE_I: usize = 0;
pub const GATE_F: usize = 1;
pub const GATE_G: usize = 2;
pub const GATE_O: usize = 3;

/// LSTM + dense head weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LstmWeights {
    pub input_width: usize,
    pub hidden_units: usize,

    /// Input kernel: [4H x F], row-major.
    pub w_x: Vec<f64>,
    /// Recurrent kernel: [4H x H], row-major.
    pub w_h: Vec<f64>,
    /// Gate biases: [4H].
    pub b: Vec<f64>,

    /// Dense head: [H].
    pub w_out: Vec<f64>,
    pub b_out: f64,
}

impl LstmWeights {
    /// Xavier/Glorot-uniform kernels, zero biases except the forget gate,
    /// which starts at 1.0 so early training keeps cell state.
    pub fn init(input_width: usize, hidden_units: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = NUM_GATES * hidden_units;

        let mut uniform = |n: usize, fan_in: usize, fan_out: usize| -> Vec<f64> {
            let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
            (0..n).map(|_| rng.gen::<f64>() * 2.0 * limit - limit).collect()
        };

        let w_x = uniform(rows * input_width, input_width, rows);
        let w_h = uniform(rows * hidden_units, hidden_units, rows);
        let w_out = uniform(hidden_units, hidden_units, 1);

        let mut b = vec![0.0; rows];
        for bias in &mut b[GATE_F * hidden_units..(GATE_F + 1) * hidden_units] {
            *bias = 1.0;
        }

        Self {
            input_width,
            hidden_units,
            w_x,
            w_h,
            b,
            w_out,
            b_out: 0.0,
        }
    }

    /// Total number of trainable parameters.
    pub fn num_params(&self) -> usize {
        self.w_x.len() + self.w_h.len() + self.b.len() + self.w_out.len() + 1
    }

    /// Check that every buffer matches the declared dimensions.
    pub fn validate(&self) -> Result<(), String> {
        let rows = NUM_GATES * self.hidden_units;
        let checks = [
            ("w_x", self.w_x.len(), rows * self.input_width),
            ("w_h", self.w_h.len(), rows * self.hidden_units),
            ("b", self.b.len(), rows),
            ("w_out", self.w_out.len(), self.hidden_units),
        ];
        for (name, actual, expected) in checks {
            if actual != expected {
                return Err(format!("{name} has {actual} values, expected {expected}"));
            }
        }
        if self.input_width == 0 || self.hidden_units == 0 {
            return Err("input width and hidden units must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Cached values from one timestep, needed for backprop.
#[derive(Debug, Clone)]
pub struct StepCache {
    pub x: Vec<f64>,
    pub h_prev: Vec<f64>,
    pub c_prev: Vec<f64>,
    pub i: Vec<f64>,
    pub f: Vec<f64>,
    pub g: Vec<f64>,
    pub o: Vec<f64>,
    pub c: Vec<f64>,
    pub tanh_c: Vec<f64>,
    pub h: Vec<f64>,
}

/// Forward result for a whole sequence.
#[derive(Debug, Clone)]
pub struct SequenceForward {
    /// Per-timestep caches, oldest first.
    pub steps: Vec<StepCache>,
    /// Final dense output before the sigmoid.
    pub logit: f64,
    /// Probability in (0, 1).
    pub output: f64,
}

pub struct LstmCell;

impl LstmCell {
    /// One LSTM timestep.
    pub fn step(weights: &LstmWeights, x: &[f64], h_prev: &[f64], c_prev: &[f64]) -> StepCache {
        let hidden = weights.hidden_units;
        let width = weights.input_width;
        let rows = NUM_GATES * hidden;

        let mut z = weights.b.clone();
        for (r, z_r) in z.iter_mut().enumerate().take(rows) {
            let wx = &weights.w_x[r * width..(r + 1) * width];
            let wh = &weights.w_h[r * hidden..(r + 1) * hidden];
            *z_r += wx.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
            *z_r += wh.iter().zip(h_prev).map(|(w, v)| w * v).sum::<f64>();
        }

        let gate = |k: usize| &z[k * hidden..(k + 1) * hidden];
        let i: Vec<f64> = gate(GATE_I).iter().map(|&v| sigmoid(v)).collect();
        let f: Vec<f64> = gate(GATE_F).iter().map(|&v| sigmoid(v)).collect();
        let g: Vec<f64> = gate(GATE_G).iter().map(|&v| v.tanh()).collect();
        let o: Vec<f64> = gate(GATE_O).iter().map(|&v| sigmoid(v)).collect();

        let c: Vec<f64> = (0..hidden).map(|j| f[j] * c_prev[j] + i[j] * g[j]).collect();
        let tanh_c: Vec<f64> = c.iter().map(|v| v.tanh()).collect();
        let h: Vec<f64> = (0..hidden).map(|j| o[j] * tanh_c[j]).collect();

        StepCache {
            x: x.to_vec(),
            h_prev: h_prev.to_vec(),
            c_prev: c_prev.to_vec(),
            i,
            f,
            g,
            o,
            c,
            tanh_c,
            h,
        }
    }

    /// Run a full sequence from zero state and apply the dense head.
    ///
    /// `sequence` holds `timesteps * input_width` already-scaled values.
    pub fn forward(weights: &LstmWeights, sequence: &[f64]) -> SequenceForward {
        let hidden = weights.hidden_units;
        let mut h = vec![0.0; hidden];
        let mut c = vec![0.0; hidden];
        let mut steps = Vec::with_capacity(sequence.len() / weights.input_width.max(1));

        for x in sequence.chunks(weights.input_width) {
            let cache = Self::step(weights, x, &h, &c);
            h.clone_from(&cache.h);
            c.clone_from(&cache.c);
            steps.push(cache);
        }

        let logit = weights.b_out + weights.w_out.iter().zip(&h).map(|(w, v)| w * v).sum::<f64>();

        SequenceForward {
            steps,
            logit,
            output: sigmoid(logit),
        }
    }
}

// ============================================================================
// Activation functions
// ============================================================================

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_shapes() {
        let w = LstmWeights::init(6, 8, 42);
        assert_eq!(w.w_x.len(), 4 * 8 * 6);
        assert_eq!(w.w_h.len(), 4 * 8 * 8);
        assert_eq!(w.b.len(), 32);
        assert_eq!(w.w_out.len(), 8);
        assert_eq!(w.num_params(), 192 + 256 + 32 + 8 + 1);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_forget_bias_is_one() {
        let w = LstmWeights::init(3, 4, 1);
        assert!(w.b[4..8].iter().all(|&b| b == 1.0));
        assert!(w.b[..4].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_init_is_deterministic() {
        assert_eq!(LstmWeights::init(5, 16, 7), LstmWeights::init(5, 16, 7));
        assert_ne!(LstmWeights::init(5, 16, 7).w_x, LstmWeights::init(5, 16, 8).w_x);
    }

    #[test]
    fn test_forward_output_in_unit_interval() {
        let w = LstmWeights::init(6, 16, 42);
        for scale in [0.0, 0.5, 5.0, -5.0, 100.0] {
            let out = LstmCell::forward(&w, &[scale; 6]);
            assert!(out.output > 0.0 && out.output < 1.0, "output {}", out.output);
            assert_eq!(out.steps.len(), 1);
        }
    }

    #[test]
    fn test_forward_multi_step_chains_state() {
        let w = LstmWeights::init(2, 4, 3);
        let out = LstmCell::forward(&w, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(out.steps.len(), 3);
        assert_eq!(out.steps[1].h_prev, out.steps[0].h);
        assert_eq!(out.steps[2].c_prev, out.steps[1].c);
    }

    #[test]
    fn test_validate_catches_truncated_buffers() {
        let mut w = LstmWeights::init(3, 4, 1);
        w.w_h.pop();
        assert!(w.validate().unwrap_err().contains("w_h"));
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(sigmoid(100.0) > 0.999);
        assert!(sigmoid(-100.0) < 0.001);
    }
}
