//! Manual backpropagation through time for the LSTM classifier + Adam.
//!
//! Loss is binary cross-entropy on the sigmoid output. Gradients are
//! averaged over each mini-batch, clipped by global norm, and applied with
//! Adam. Rows are reshuffled every epoch from a seeded RNG so a fit is
//! reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

use crate::inference::SequenceBatch;
use crate::lstm::cell::{
    LstmCell, LstmWeights, SequenceForward, GATE_F, GATE_G, GATE_I, GATE_O, NUM_GATES,
};

/// Max gradient norm for global gradient clipping.
const MAX_GRAD_NORM: f64 = 5.0;

/// Probabilities are clamped to [EPS, 1-EPS] inside the loss.
const BCE_EPSILON: f64 = 1e-7;

/// Fit hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 3,
            batch_size: 16,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

/// Summary of one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean binary cross-entropy over all rows this epoch.
    pub loss: f64,
    pub batches: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum TrainingError {
    #[error("cannot train on an empty batch")]
    EmptyBatch,

    #[error("batch has no feature columns")]
    NoFeatures,

    #[error("batch has {rows} rows but {targets} targets")]
    TargetCount { rows: usize, targets: usize },

    #[error("batch has {actual} features per timestep, model expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("target {value} at row {row} is outside [0, 1]")]
    TargetRange { row: usize, value: f64 },

    #[error("training diverged at epoch {epoch} (loss {loss})")]
    Diverged { epoch: usize, loss: f64 },
}

/// Accumulated gradients matching the `LstmWeights` layout.
struct GradAccum {
    d_w_x: Vec<f64>,
    d_w_h: Vec<f64>,
    d_b: Vec<f64>,
    d_w_out: Vec<f64>,
    d_b_out: f64,
}

impl GradAccum {
    fn new(weights: &LstmWeights) -> Self {
        Self {
            d_w_x: vec![0.0; weights.w_x.len()],
            d_w_h: vec![0.0; weights.w_h.len()],
            d_b: vec![0.0; weights.b.len()],
            d_w_out: vec![0.0; weights.w_out.len()],
            d_b_out: 0.0,
        }
    }

    /// Compute L2 norm of all accumulated gradients.
    fn grad_norm(&self) -> f64 {
        let sum: f64 = self
            .d_w_x
            .iter()
            .chain(&self.d_w_h)
            .chain(&self.d_b)
            .chain(&self.d_w_out)
            .map(|v| v * v)
            .sum();
        (sum + self.d_b_out * self.d_b_out).sqrt()
    }

    /// Scale all gradients by a factor.
    fn scale(&mut self, factor: f64) {
        for v in self
            .d_w_x
            .iter_mut()
            .chain(self.d_w_h.iter_mut())
            .chain(self.d_b.iter_mut())
            .chain(self.d_w_out.iter_mut())
        {
            *v *= factor;
        }
        self.d_b_out *= factor;
    }

    fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(
            self.d_w_x.len() + self.d_w_h.len() + self.d_b.len() + self.d_w_out.len() + 1,
        );
        flat.extend_from_slice(&self.d_w_x);
        flat.extend_from_slice(&self.d_w_h);
        flat.extend_from_slice(&self.d_b);
        flat.extend_from_slice(&self.d_w_out);
        flat.push(self.d_b_out);
        flat
    }
}

/// Adam optimizer.
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub steps: u64,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamOptimizer {
    pub fn new(num_params: usize, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            steps: 0,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
        }
    }

    /// Apply one bias-corrected Adam update in place.
    fn apply(&mut self, weights_flat: &mut [f64], grads_flat: &[f64]) {
        self.steps += 1;
        let t = self.steps as f64;
        let lr_t = self.lr * (1.0 - self.beta2.powf(t)).sqrt() / (1.0 - self.beta1.powf(t));

        for i in 0..weights_flat.len() {
            let g = grads_flat[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            weights_flat[i] -= lr_t * self.m[i] / (self.v[i].sqrt() + self.eps);
        }
    }
}

fn flatten_weights(w: &LstmWeights) -> Vec<f64> {
    let mut flat = Vec::with_capacity(w.num_params());
    flat.extend_from_slice(&w.w_x);
    flat.extend_from_slice(&w.w_h);
    flat.extend_from_slice(&w.b);
    flat.extend_from_slice(&w.w_out);
    flat.push(w.b_out);
    flat
}

fn unflatten_weights(flat: &[f64], w: &mut LstmWeights) {
    let mut offset = 0;
    let n = w.w_x.len();
    w.w_x.copy_from_slice(&flat[offset..offset + n]);
    offset += n;
    let n = w.w_h.len();
    w.w_h.copy_from_slice(&flat[offset..offset + n]);
    offset += n;
    let n = w.b.len();
    w.b.copy_from_slice(&flat[offset..offset + n]);
    offset += n;
    let n = w.w_out.len();
    w.w_out.copy_from_slice(&flat[offset..offset + n]);
    offset += n;
    w.b_out = flat[offset];
}

/// Binary cross-entropy for one probability/target pair.
pub fn binary_cross_entropy(p: f64, target: f64) -> f64 {
    let p = p.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
    -(target * p.ln() + (1.0 - target) * (1.0 - p).ln())
}

/// Backprop one sequence into `grads`, returning its loss.
fn backprop_sequence(
    grads: &mut GradAccum,
    weights: &LstmWeights,
    forward: &SequenceForward,
    target: f64,
) -> f64 {
    let hidden = weights.hidden_units;
    let width = weights.input_width;
    let loss = binary_cross_entropy(forward.output, target);

    // d loss / d logit for sigmoid + BCE
    let d_logit = forward.output - target;

    let Some(last) = forward.steps.last() else {
        return loss;
    };

    grads.d_b_out += d_logit;
    let mut d_h = vec![0.0; hidden];
    for j in 0..hidden {
        grads.d_w_out[j] += d_logit * last.h[j];
        d_h[j] = d_logit * weights.w_out[j];
    }
    let mut d_c = vec![0.0; hidden];

    for step in forward.steps.iter().rev() {
        let mut dz = vec![0.0; NUM_GATES * hidden];

        for j in 0..hidden {
            let (i, f, g, o) = (step.i[j], step.f[j], step.g[j], step.o[j]);
            let tanh_c = step.tanh_c[j];

            // h = o * tanh(c)
            let d_o = d_h[j] * tanh_c;
            let dc = d_c[j] + d_h[j] * o * (1.0 - tanh_c * tanh_c);

            // c = f * c_prev + i * g
            let d_i = dc * g;
            let d_f = dc * step.c_prev[j];
            let d_g = dc * i;
            d_c[j] = dc * f;

            dz[GATE_I * hidden + j] = d_i * i * (1.0 - i);
            dz[GATE_F * hidden + j] = d_f * f * (1.0 - f);
            dz[GATE_G * hidden + j] = d_g * (1.0 - g * g);
            dz[GATE_O * hidden + j] = d_o * o * (1.0 - o);
        }

        let mut d_h_prev = vec![0.0; hidden];
        for (r, &dz_r) in dz.iter().enumerate() {
            if dz_r == 0.0 {
                continue;
            }
            grads.d_b[r] += dz_r;
            for (k, &x_k) in step.x.iter().enumerate() {
                grads.d_w_x[r * width + k] += dz_r * x_k;
            }
            for k in 0..hidden {
                grads.d_w_h[r * hidden + k] += dz_r * step.h_prev[k];
                d_h_prev[k] += dz_r * weights.w_h[r * hidden + k];
            }
        }
        d_h = d_h_prev;
    }

    loss
}

/// Train on one mini-batch of already-scaled sequences. Returns the summed
/// loss over the mini-batch.
fn train_minibatch(
    weights: &mut LstmWeights,
    optimizer: &mut AdamOptimizer,
    sequences: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
) -> f64 {
    let mut grads = GradAccum::new(weights);
    let mut loss_sum = 0.0;

    for &idx in indices {
        let forward = LstmCell::forward(weights, &sequences[idx]);
        loss_sum += backprop_sequence(&mut grads, weights, &forward, targets[idx]);
    }

    grads.scale(1.0 / indices.len() as f64);

    let norm = grads.grad_norm();
    if norm > MAX_GRAD_NORM {
        grads.scale(MAX_GRAD_NORM / norm);
    }

    let mut flat_w = flatten_weights(weights);
    optimizer.apply(&mut flat_w, &grads.flatten());
    unflatten_weights(&flat_w, weights);

    loss_sum
}

/// Fit the weights on scaled sequences.
///
/// `sequences[i]` must already be transformed by the model's scaler.
/// `on_epoch` is called after every epoch with that epoch's mean loss.
pub fn fit(
    weights: &mut LstmWeights,
    sequences: &[Vec<f64>],
    targets: &[f64],
    options: &FitOptions,
    mut on_epoch: impl FnMut(&EpochStats),
) -> Result<Vec<EpochStats>, TrainingError> {
    let mut optimizer = AdamOptimizer::new(weights.num_params(), options.learning_rate);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut order: Vec<usize> = (0..sequences.len()).collect();
    let batch_size = options.batch_size.max(1);
    let mut history = Vec::with_capacity(options.epochs);

    for epoch in 1..=options.epochs {
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0;
        let mut batches = 0;
        for chunk in order.chunks(batch_size) {
            loss_sum += train_minibatch(weights, &mut optimizer, sequences, targets, chunk);
            batches += 1;
        }

        let loss = loss_sum / sequences.len() as f64;
        if !loss.is_finite() {
            return Err(TrainingError::Diverged { epoch, loss });
        }

        let stats = EpochStats { epoch, loss, batches };
        debug!(epoch, loss, batches, "Epoch complete");
        on_epoch(&stats);
        history.push(stats);
    }

    Ok(history)
}

/// Check a training batch against the model and the targets.
pub fn validate_training_data(
    weights: &LstmWeights,
    batch: &SequenceBatch,
    targets: &[f64],
) -> Result<(), TrainingError> {
    if batch.is_empty() {
        return Err(TrainingError::EmptyBatch);
    }
    if batch.features() == 0 {
        return Err(TrainingError::NoFeatures);
    }
    if batch.rows() != targets.len() {
        return Err(TrainingError::TargetCount {
            rows: batch.rows(),
            targets: targets.len(),
        });
    }
    if batch.features() != weights.input_width {
        return Err(TrainingError::WidthMismatch {
            expected: weights.input_width,
            actual: batch.features(),
        });
    }
    if let Some((row, &value)) = targets
        .iter()
        .enumerate()
        .find(|(_, t)| !(0.0..=1.0).contains(*t))
    {
        return Err(TrainingError::TargetRange { row, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bce_values() {
        assert!((binary_cross_entropy(0.5, 1.0) - std::f64::consts::LN_2).abs() < 1e-12);
        assert!(binary_cross_entropy(1.0, 1.0) < 1e-6);
        assert!(binary_cross_entropy(0.0, 1.0).is_finite());
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let weights = LstmWeights::init(3, 4, 9);
        let sequence = vec![0.3, -0.7, 1.1, 0.5, 0.2, -0.4];
        let target = 0.8;

        let mut grads = GradAccum::new(&weights);
        let forward = LstmCell::forward(&weights, &sequence);
        backprop_sequence(&mut grads, &weights, &forward, target);
        let analytic = grads.flatten();

        let base = flatten_weights(&weights);
        let h = 1e-6;
        // Spot-check a spread of parameters across every buffer.
        for idx in (0..base.len()).step_by(7) {
            let mut plus = weights.clone();
            let mut flat = base.clone();
            flat[idx] += h;
            unflatten_weights(&flat, &mut plus);
            let mut minus = weights.clone();
            flat[idx] -= 2.0 * h;
            unflatten_weights(&flat, &mut minus);

            let lp = binary_cross_entropy(LstmCell::forward(&plus, &sequence).output, target);
            let lm = binary_cross_entropy(LstmCell::forward(&minus, &sequence).output, target);
            let numeric = (lp - lm) / (2.0 * h);

            assert!(
                (numeric - analytic[idx]).abs() < 1e-5,
                "param {idx}: numeric {numeric} vs analytic {}",
                analytic[idx]
            );
        }
    }

    #[test]
    fn test_fit_learns_separable_problem() {
        let mut weights = LstmWeights::init(2, 8, 5);
        let sequences: Vec<Vec<f64>> = (0..64)
            .map(|i| {
                let s = if i % 2 == 0 { 1.0 } else { -1.0 };
                vec![s, s * 0.5]
            })
            .collect();
        let targets: Vec<f64> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();

        let options = FitOptions {
            epochs: 30,
            batch_size: 8,
            learning_rate: 0.01,
            seed: 1,
        };
        let mut seen = 0;
        let history = fit(&mut weights, &sequences, &targets, &options, |_| seen += 1).unwrap();

        assert_eq!(seen, 30);
        assert_eq!(history.len(), 30);
        assert_eq!(history[0].batches, 8);
        assert!(history[29].loss < history[0].loss * 0.5);

        assert!(LstmCell::forward(&weights, &[1.0, 0.5]).output > 0.5);
        assert!(LstmCell::forward(&weights, &[-1.0, -0.5]).output < 0.5);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let sequences: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 20.0]).collect();
        let targets: Vec<f64> = (0..20).map(|i| (i % 3) as f64 / 2.0).collect();
        let options = FitOptions::default();

        let mut a = LstmWeights::init(1, 4, 2);
        let mut b = a.clone();
        fit(&mut a, &sequences, &targets, &options, |_| {}).unwrap();
        fit(&mut b, &sequences, &targets, &options, |_| {}).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_training_data() {
        let weights = LstmWeights::init(2, 4, 1);
        let batch = SequenceBatch::from_rows(&[[0.0, 1.0], [1.0, 0.0]]).unwrap();

        assert!(validate_training_data(&weights, &batch, &[0.1, 0.9]).is_ok());
        assert_eq!(
            validate_training_data(&weights, &batch, &[0.1]),
            Err(TrainingError::TargetCount { rows: 2, targets: 1 })
        );
        assert_eq!(
            validate_training_data(&weights, &batch, &[0.1, 1.5]),
            Err(TrainingError::TargetRange { row: 1, value: 1.5 })
        );

        let empty = SequenceBatch::from_rows::<[f64; 2]>(&[]).unwrap();
        assert_eq!(
            validate_training_data(&weights, &empty, &[]),
            Err(TrainingError::EmptyBatch)
        );

        let wide = SequenceBatch::from_rows(&[[0.0, 1.0, 2.0]]).unwrap();
        assert_eq!(
            validate_training_data(&weights, &wide, &[0.5]),
            Err(TrainingError::WidthMismatch { expected: 2, actual: 3 })
        );

        let zero = LstmWeights::init(0, 4, 1);
        let no_columns = SequenceBatch::from_rows(&[Vec::<f64>::new(), Vec::new()]).unwrap();
        assert_eq!(
            validate_training_data(&zero, &no_columns, &[0.1, 0.9]),
            Err(TrainingError::NoFeatures)
        );
    }
}
