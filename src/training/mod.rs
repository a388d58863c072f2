//! Gradient-based training: error accounting, backpropagation, and the
//! five supported weight-update rules (§4.4, §4.5, §4.6, §4.7).
//!
//! A pattern always goes through the same two steps: `backward_pass`
//! computes `train_errors` (derivative-weighted backpropagated error, per
//! neuron) and accumulates `train_slopes` (per weight); which update rule
//! consumes those slopes, and when, is what actually distinguishes the five
//! algorithms below.

pub mod update;

#[cfg(feature = "parallel")]
pub mod parallel;

use crate::scalar::Scalar;

use crate::activation;
use crate::dataset::TrainingData;
use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;

/// Which weight-update rule a network trains with (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrainingAlgorithm {
    /// Apply a weight delta after every pattern (online gradient descent
    /// with momentum).
    Incremental,
    /// Accumulate slopes over a full epoch, then apply one weight delta.
    Batch,
    /// iRPROP-: per-weight adaptive step size driven only by gradient sign.
    RProp,
    /// Quickprop: per-weight quadratic step estimate with weight decay.
    Quickprop,
    /// SARPROP: iRPROP- with simulated-annealing noise injection.
    Sarprop,
}

impl TrainingAlgorithm {
    /// Cascade training only ever runs iRPROP-, Quickprop, or SARPROP on
    /// the output/candidate weights (§4.9); incremental and batch are
    /// rejected with `UnsupportedCascadeAlgorithm`.
    pub fn usable_for_cascade(self) -> bool {
        !matches!(self, TrainingAlgorithm::Incremental | TrainingAlgorithm::Batch)
    }
}

/// Transform applied to the raw `desired - actual` diff before it is
/// multiplied by the output activation's derivative (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorFunc {
    Linear,
    /// `log((1+d)/(1-d))`, clipped to +-17 near the asymptotes, which
    /// pushes harder on confidently-wrong symmetric outputs than plain
    /// linear error.
    Tanh,
}

impl ErrorFunc {
    fn apply<T: Scalar>(self, diff: T) -> T {
        match self {
            ErrorFunc::Linear => diff,
            ErrorFunc::Tanh => {
                let one = T::one();
                if diff < T::from(-0.9999999).unwrap() {
                    T::from(-17.0).unwrap()
                } else if diff > T::from(0.9999999).unwrap() {
                    T::from(17.0).unwrap()
                } else {
                    ((one + diff) / (one - diff)).ln()
                }
            }
        }
    }
}

/// Which accumulated quantity a stop condition is measured against (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopFunc {
    Mse,
    BitFail,
}

/// Per-epoch progress passed to a training callback (§6).
#[derive(Debug, Clone, Copy)]
pub struct EpochReport<T: Scalar> {
    pub epoch: usize,
    pub mse: T,
    pub bit_fail: usize,
}

/// Returned by a callback to request the run stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackControl {
    Continue,
    Stop,
}

impl<T: Scalar> Network<T> {
    pub(crate) fn ensure_scratch_allocated(&mut self) {
        let n = self.neurons.len();
        let w = self.weights.len();
        if self.scratch.train_errors.len() != n {
            self.scratch.train_errors = vec![T::zero(); n];
        }
        if self.scratch.train_slopes.len() != w {
            self.scratch.train_slopes = vec![T::zero(); w];
        }
        if self.scratch.prev_weight_deltas.len() != w {
            self.scratch.prev_weight_deltas = vec![T::zero(); w];
        }
        if self.scratch.prev_train_slopes.len() != w {
            self.scratch.prev_train_slopes = vec![T::zero(); w];
        }
        if self.scratch.prev_steps.len() != w {
            let seed = if self.training_algorithm == TrainingAlgorithm::RProp {
                self.rprop_delta_zero
            } else {
                T::zero()
            };
            self.scratch.prev_steps = vec![seed; w];
        }
    }

    /// Reset slopes/steps/prior-slopes before a fresh training run, as
    /// `fann_clear_train_arrays` does (§4.7).
    pub fn clear_train_arrays(&mut self) {
        self.ensure_scratch_allocated();
        let w = self.weights.len();
        self.scratch.train_slopes = vec![T::zero(); w];
        self.scratch.prev_train_slopes = vec![T::zero(); w];
        let seed = if self.training_algorithm == TrainingAlgorithm::RProp {
            self.rprop_delta_zero
        } else {
            T::zero()
        };
        self.scratch.prev_steps = vec![seed; w];
        self.sarprop_epoch = 0;
    }

    /// Run the network forward, score it against `desired`, and
    /// backpropagate the derivative-weighted error into `train_errors` and
    /// `train_slopes` (§4.5). Does not touch the weights.
    pub(crate) fn backward_pass(&mut self, input: &[T], desired: &[T]) -> NetworkResult<()> {
        self.run(input)?;
        self.ensure_scratch_allocated();

        for e in self.scratch.train_errors.iter_mut() {
            *e = T::zero();
        }

        let out_layer = *self.layers.last().unwrap();
        for (i, dest) in (out_layer.first_neuron..out_layer.last_neuron).enumerate() {
            let n = self.neurons[dest];
            if !n.activation_function.is_trainable() {
                return Err(self.set_error(NetworkError::CantTrainActivation(n.activation_function)));
            }
            let diff = self.accumulate_mse(desired[i] - n.value, n.activation_function.is_symmetric());
            let diff = self.error_function.apply(diff);
            self.scratch.train_errors[dest] =
                activation::derivative(n.activation_function, n.activation_steepness, n.value, n.sum) * diff;
        }

        for li in (1..self.layers.len()).rev() {
            let layer = self.layers[li];
            for dest in layer.first_neuron..layer.last_neuron {
                let n = &self.neurons[dest];
                let (first_con, last_con) = (n.first_con, n.last_con);
                let dest_error = self.scratch.train_errors[dest];
                for w_idx in first_con..last_con {
                    let src = self.connections[w_idx];
                    self.scratch.train_slopes[w_idx] =
                        self.scratch.train_slopes[w_idx] + dest_error * self.neurons[src].value;
                    self.scratch.train_errors[src] =
                        self.scratch.train_errors[src] + dest_error * self.weights[w_idx];
                }
            }
            if li >= 2 {
                let prev = self.layers[li - 1];
                for n_idx in prev.first_neuron..prev.last_neuron {
                    let n = self.neurons[n_idx];
                    if n.is_bias() {
                        continue;
                    }
                    self.scratch.train_errors[n_idx] *=
                        activation::derivative(n.activation_function, n.activation_steepness, n.value, n.sum);
                }
            }
        }
        Ok(())
    }

    /// Run one pattern through `backward_pass`; for `Incremental` this also
    /// applies the weight update immediately. Other algorithms only
    /// accumulate slopes, to be consumed by `apply_batch_update` at epoch
    /// end.
    fn train_single(&mut self, input: &[T], desired: &[T]) -> NetworkResult<()> {
        self.backward_pass(input, desired)?;
        if self.training_algorithm == TrainingAlgorithm::Incremental {
            update::incremental_step(self);
        }
        Ok(())
    }

    /// Apply the accumulated epoch slopes for `Batch`/`RProp`/`Quickprop`/
    /// `Sarprop`. No-op for `Incremental`, which already updated per
    /// pattern.
    fn apply_batch_update(&mut self, num_data: usize) {
        match self.training_algorithm {
            TrainingAlgorithm::Incremental => {}
            TrainingAlgorithm::Batch => update::batch_step(self, num_data),
            TrainingAlgorithm::RProp => update::irpropm_step(self),
            TrainingAlgorithm::Quickprop => update::quickprop_step(self, num_data),
            TrainingAlgorithm::Sarprop => {
                let epoch = self.sarprop_epoch;
                update::sarprop_step(self, epoch);
                self.sarprop_epoch += 1;
            }
        }
    }

    /// Train on every pattern in `data` once, in order, and return the
    /// resulting MSE (§4.7). Resets MSE accounting at the start.
    pub fn train_epoch(&mut self, data: &TrainingData<T>) -> NetworkResult<T> {
        if data.num_input() != self.num_input() || data.num_output() != self.num_output() {
            return Err(self.set_error(NetworkError::DimensionMismatch {
                net_inputs: self.num_input(),
                net_outputs: self.num_output(),
                data_inputs: data.num_input(),
                data_outputs: data.num_output(),
            }));
        }
        self.ensure_scratch_allocated();
        self.reset_mse();
        for i in 0..data.length() {
            let input = data.input(i).unwrap().to_vec();
            let desired = data.output(i).unwrap().to_vec();
            self.train_single(&input, &desired)?;
        }
        self.apply_batch_update(data.length());
        Ok(self.get_mse())
    }

    /// Train until `max_epochs` is reached or the configured stop
    /// criterion (`stop_function` against `desired_error`) is satisfied,
    /// calling `callback` every `epochs_between_reports` epochs (0
    /// disables reporting) (§4.7, §6).
    pub fn train_on_data(
        &mut self,
        data: &TrainingData<T>,
        max_epochs: usize,
        epochs_between_reports: usize,
        desired_error: T,
        mut callback: impl FnMut(&Network<T>, EpochReport<T>) -> CallbackControl,
    ) -> NetworkResult<usize> {
        self.clear_train_arrays();
        for epoch in 1..=max_epochs {
            self.train_epoch(data)?;
            let report = EpochReport {
                epoch,
                mse: self.get_mse(),
                bit_fail: self.get_bit_fail(),
            };
            let satisfied = match self.stop_function {
                StopFunc::Mse => report.mse <= desired_error,
                StopFunc::BitFail => T::from(report.bit_fail).unwrap() <= desired_error,
            };
            if epochs_between_reports != 0 && (epoch % epochs_between_reports == 0 || satisfied || epoch == max_epochs) {
                #[cfg(feature = "logging")]
                log::debug!("epoch {epoch}: mse={:?} bit_fail={}", report.mse, report.bit_fail);
                if callback(self, report) == CallbackControl::Stop {
                    #[cfg(feature = "logging")]
                    log::info!("training callback requested stop at epoch {epoch}");
                    return Ok(epoch);
                }
            }
            if satisfied {
                #[cfg(feature = "logging")]
                log::info!("stop condition satisfied at epoch {epoch}");
                return Ok(epoch);
            }
        }
        Ok(max_epochs)
    }

    /// Evaluate (without training) every pattern in `data` and return the
    /// resulting MSE, mirroring `fann_test_data` (§6 supplement).
    pub fn test_data(&mut self, data: &TrainingData<T>) -> NetworkResult<T> {
        self.reset_mse();
        for i in 0..data.length() {
            let input = data.input(i).unwrap().to_vec();
            let desired = data.output(i).unwrap().to_vec();
            self.test(&input, &desired)?;
        }
        Ok(self.get_mse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunc;
    use crate::network::Network;

    fn xor_data() -> TrainingData<f64> {
        TrainingData::create_train(
            vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
            vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
        )
        .unwrap()
    }

    fn xor_net() -> Network<f64> {
        let mut net = Network::create_standard(&[2, 3, 1]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net
    }

    #[test]
    fn rprop_training_reduces_mse_on_xor() {
        let mut net = xor_net();
        net.training_algorithm = TrainingAlgorithm::RProp;
        let data = xor_data();
        let initial = net.train_epoch(&data).unwrap();
        for _ in 0..300 {
            net.train_epoch(&data).unwrap();
        }
        let later = net.train_epoch(&data).unwrap();
        assert!(later < initial, "expected MSE to decrease: {initial} -> {later}");
    }

    #[test]
    fn incremental_training_reduces_mse_on_xor() {
        let mut net = xor_net();
        net.training_algorithm = TrainingAlgorithm::Incremental;
        net.learning_rate = 0.7;
        let data = xor_data();
        let initial = net.train_epoch(&data).unwrap();
        for _ in 0..500 {
            net.train_epoch(&data).unwrap();
        }
        let later = net.train_epoch(&data).unwrap();
        assert!(later < initial);
    }

    #[test]
    fn quickprop_training_reduces_mse_on_xor() {
        let mut net = xor_net();
        net.training_algorithm = TrainingAlgorithm::Quickprop;
        net.learning_rate = 0.7;
        let data = xor_data();
        let initial = net.train_epoch(&data).unwrap();
        for _ in 0..300 {
            net.train_epoch(&data).unwrap();
        }
        let later = net.train_epoch(&data).unwrap();
        assert!(later < initial);
    }

    #[test]
    fn train_on_data_stops_early_when_threshold_met() {
        let mut net = xor_net();
        net.training_algorithm = TrainingAlgorithm::RProp;
        let data = xor_data();
        let epochs_run = net
            .train_on_data(&data, 2000, 50, 1.0, |_, _| CallbackControl::Continue)
            .unwrap();
        assert!(epochs_run <= 2000);
        assert!(net.get_mse() <= 1.0 || epochs_run == 2000);
    }

    #[test]
    fn threshold_activation_rejects_training() {
        let mut net = xor_net();
        net.set_activation_function_output(ActivationFunc::Threshold);
        let data = xor_data();
        let err = net.train_epoch(&data).unwrap_err();
        assert!(matches!(err, NetworkError::CantTrainActivation(_)));
    }
}
