//! The weight-update rules themselves, each consuming `train_slopes`
//! accumulated by `Network::backward_pass` (§4.6).
//!
//! Every rule clamps the updated weight to +-1500, matching the reference
//! implementation's saturation guard against runaway steps.

use std::ops::Range;

use crate::scalar::Scalar;
use rand::Rng;

use crate::network::Network;

const WEIGHT_CLAMP: f64 = 1500.0;

pub(crate) fn clamp<T: Scalar>(w: T) -> T {
    let hi = T::from(WEIGHT_CLAMP).unwrap();
    let lo = T::from(-WEIGHT_CLAMP).unwrap();
    if w > hi {
        hi
    } else if w < lo {
        lo
    } else {
        w
    }
}

/// Apply one pattern's worth of gradient immediately, with momentum
/// carried from the previous pattern's delta. Used by `Incremental` after
/// every `backward_pass`.
pub(crate) fn incremental_step<T: Scalar>(net: &mut Network<T>) {
    let lr = net.learning_rate;
    let momentum = net.learning_momentum;
    for i in 0..net.weights.len() {
        let tmp_error = net.scratch.train_slopes[i] * lr;
        let delta = tmp_error + momentum * net.scratch.prev_weight_deltas[i];
        net.weights[i] = net.weights[i] + delta;
        net.scratch.prev_weight_deltas[i] = delta;
        net.scratch.train_slopes[i] = T::zero();
    }
}

/// Apply one epoch's accumulated slopes as a single step, averaged by
/// pattern count. Used by `Batch`.
pub(crate) fn batch_step<T: Scalar>(net: &mut Network<T>, num_data: usize) {
    let epsilon = net.learning_rate / T::from(num_data.max(1)).unwrap();
    for i in 0..net.weights.len() {
        net.weights[i] = net.weights[i] + net.scratch.train_slopes[i] * epsilon;
        net.scratch.train_slopes[i] = T::zero();
    }
}

/// iRPROP-: step size adapts from the sign agreement between this epoch's
/// slope and the previous one, independent of slope magnitude.
pub(crate) fn irpropm_step<T: Scalar>(net: &mut Network<T>) {
    let range = 0..net.weights.len();
    irpropm_step_range(net, range);
}

/// Same as [`irpropm_step`] but restricted to `range` of the weight array,
/// used during cascade output-phase training where only the output layer's
/// incoming weights are adapted (§4.9).
pub(crate) fn irpropm_step_range<T: Scalar>(net: &mut Network<T>, range: Range<usize>) {
    let increase = net.rprop_increase_factor;
    let decrease = net.rprop_decrease_factor;
    let delta_min = net.rprop_delta_min;
    let delta_max = net.rprop_delta_max;
    irpropm_update(
        &mut net.weights[range.clone()],
        &mut net.scratch.train_slopes[range.clone()],
        &mut net.scratch.prev_steps[range.clone()],
        &mut net.scratch.prev_train_slopes[range],
        increase,
        decrease,
        delta_min,
        delta_max,
    );
}

/// iRPROP- over an arbitrary weight/slope buffer pair, shared by whole-
/// network training and cascade candidate weights, which live outside the
/// network's own arrays until the candidate is installed (§4.9).
pub(crate) fn irpropm_update<T: Scalar>(
    weights: &mut [T],
    slopes: &mut [T],
    prev_steps: &mut [T],
    prev_slopes: &mut [T],
    increase: T,
    decrease: T,
    delta_min: T,
    delta_max: T,
) {
    let floor = T::from(0.0001).unwrap();

    for i in 0..weights.len() {
        let prev_step = prev_steps[i].max(floor);
        let mut slope = slopes[i];
        let prev_slope = prev_slopes[i];
        let same_sign = prev_slope * slope;

        let next_step = if same_sign >= T::zero() {
            (prev_step * increase).min(delta_max)
        } else {
            slope = T::zero();
            (prev_step * decrease).max(delta_min)
        };

        if slope < T::zero() {
            weights[i] = clamp(weights[i] - next_step);
        } else if slope > T::zero() {
            weights[i] = clamp(weights[i] + next_step);
        }

        prev_steps[i] = next_step;
        prev_slopes[i] = slope;
        slopes[i] = T::zero();
    }
}

/// Quickprop: fits a parabola through the previous and current slope to
/// jump toward the estimated minimum, falling back to a capped step when
/// the slope hasn't changed sign.
pub(crate) fn quickprop_step<T: Scalar>(net: &mut Network<T>, num_data: usize) {
    let range = 0..net.weights.len();
    quickprop_step_range(net, num_data, range);
}

/// Same as [`quickprop_step`] but restricted to `range` of the weight
/// array (§4.9).
pub(crate) fn quickprop_step_range<T: Scalar>(net: &mut Network<T>, num_data: usize, range: Range<usize>) {
    let epsilon = net.learning_rate / T::from(num_data.max(1)).unwrap();
    let decay = net.quickprop_decay;
    let mu = net.quickprop_mu;
    quickprop_update(
        &mut net.weights[range.clone()],
        &mut net.scratch.train_slopes[range.clone()],
        &mut net.scratch.prev_steps[range.clone()],
        &mut net.scratch.prev_train_slopes[range],
        epsilon,
        decay,
        mu,
    );
}

/// Quickprop over an arbitrary weight/slope buffer pair (§4.9, see
/// [`irpropm_update`]).
pub(crate) fn quickprop_update<T: Scalar>(
    weights: &mut [T],
    slopes: &mut [T],
    prev_steps: &mut [T],
    prev_slopes: &mut [T],
    epsilon: T,
    decay: T,
    mu: T,
) {
    let shrink_factor = mu / (T::one() + mu);
    let tiny = T::from(0.001).unwrap();

    for i in 0..weights.len() {
        let w = weights[i];
        let prev_step = prev_steps[i];
        let slope = slopes[i] + decay * w;
        let prev_slope = prev_slopes[i];
        let mut next_step = T::zero();

        if prev_step > tiny {
            if slope > T::zero() {
                next_step = next_step + epsilon * slope;
            }
            if slope > shrink_factor * prev_slope {
                next_step = next_step + mu * prev_step;
            } else {
                next_step = next_step + prev_step * slope / (prev_slope - slope);
            }
        } else if prev_step < -tiny {
            if slope < T::zero() {
                next_step = next_step + epsilon * slope;
            }
            if slope < shrink_factor * prev_slope {
                next_step = next_step + mu * prev_step;
            } else {
                next_step = next_step + prev_step * slope / (prev_slope - slope);
            }
        } else {
            next_step = next_step + epsilon * slope;
        }

        prev_steps[i] = next_step;
        weights[i] = clamp(w + next_step);
        prev_slopes[i] = slope;
        slopes[i] = T::zero();
    }
}

/// SARPROP: iRPROP- with a temperature-scheduled weight-decay term folded
/// into the slope and simulated-annealing noise injected on a sign flip,
/// so stalled weights can still escape a local step-size minimum.
pub(crate) fn sarprop_step<T: Scalar>(net: &mut Network<T>, epoch: usize) {
    let range = 0..net.weights.len();
    sarprop_step_range(net, epoch, range);
}

/// Same as [`sarprop_step`] but restricted to `range` of the weight array
/// (§4.9).
pub(crate) fn sarprop_step_range<T: Scalar>(net: &mut Network<T>, epoch: usize, range: Range<usize>) {
    let increase = net.rprop_increase_factor;
    let decrease = net.rprop_decrease_factor;
    let delta_max = net.rprop_delta_max;
    let weight_decay_shift = net.sarprop_weight_decay_shift;
    let step_error_threshold_factor = net.sarprop_step_error_threshold_factor;
    let step_error_shift = net.sarprop_step_error_shift;
    let temperature = net.sarprop_temperature;
    let mse = net.get_mse();
    sarprop_update(
        &mut net.weights[range.clone()],
        &mut net.scratch.train_slopes[range.clone()],
        &mut net.scratch.prev_steps[range.clone()],
        &mut net.scratch.prev_train_slopes[range],
        epoch,
        increase,
        decrease,
        delta_max,
        weight_decay_shift,
        step_error_threshold_factor,
        step_error_shift,
        temperature,
        mse,
    );
}

/// SARPROP over an arbitrary weight/slope buffer pair (§4.9, see
/// [`irpropm_update`]). `mse` is the network's current mean error, used both
/// for the step-error-threshold comparison and the annealing noise scale.
#[allow(clippy::too_many_arguments)]
pub(crate) fn sarprop_update<T: Scalar>(
    weights: &mut [T],
    slopes: &mut [T],
    prev_steps: &mut [T],
    prev_slopes: &mut [T],
    epoch: usize,
    increase: T,
    decrease: T,
    delta_max: T,
    weight_decay_shift: T,
    step_error_threshold_factor: T,
    step_error_shift: T,
    temperature: T,
    mse: T,
) {
    let delta_min = T::from(0.000001).unwrap();
    let floor = T::from(0.000001).unwrap();
    let rmse = mse.sqrt();
    let epoch_t = T::from(epoch).unwrap();
    let mut rng = rand::thread_rng();

    for i in 0..weights.len() {
        let prev_step = prev_steps[i].max(floor);
        let decay_term = weights[i] * (-temperature * epoch_t + weight_decay_shift).exp2();
        let mut slope = -slopes[i] - decay_term;
        let prev_slope = prev_slopes[i];
        let same_sign = prev_slope * slope;

        let next_step;
        if same_sign > T::zero() {
            next_step = (prev_step * increase).min(delta_max);
            if slope < T::zero() {
                weights[i] = clamp(weights[i] + next_step);
            } else {
                weights[i] = clamp(weights[i] - next_step);
            }
        } else if same_sign < T::zero() {
            next_step = if prev_step < step_error_threshold_factor * mse {
                let noise: T = T::from(rng.gen_range(0.0..1.0)).unwrap();
                prev_step * decrease + noise * rmse * (-temperature * epoch_t + step_error_shift).exp2()
            } else {
                (prev_step * decrease).max(delta_min)
            };
            slope = T::zero();
        } else {
            next_step = prev_step;
            if slope < T::zero() {
                weights[i] = clamp(weights[i] + prev_step);
            } else {
                weights[i] = clamp(weights[i] - prev_step);
            }
        }

        prev_steps[i] = next_step;
        prev_slopes[i] = slope;
        slopes[i] = T::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunc;
    use crate::dataset::TrainingData;
    use crate::training::TrainingAlgorithm;

    #[test]
    fn sarprop_training_does_not_diverge_on_xor() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net.training_algorithm = TrainingAlgorithm::Sarprop;
        let data = TrainingData::create_train(
            vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
            vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
        )
        .unwrap();
        for _ in 0..200 {
            let mse = net.train_epoch(&data).unwrap();
            assert!(mse.is_finite());
        }
    }

    #[test]
    fn weights_never_exceed_clamp_under_rprop() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net.training_algorithm = TrainingAlgorithm::RProp;
        net.rprop_delta_max = 1e6;
        let data = TrainingData::create_train(
            vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
            vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
        )
        .unwrap();
        for _ in 0..50 {
            net.train_epoch(&data).unwrap();
        }
        for &w in net.weights() {
            assert!(w.abs() <= WEIGHT_CLAMP);
        }
    }
}
