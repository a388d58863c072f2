//! Cascade-Correlation topology growth (§4.9): repeatedly train the output
//! weights to convergence, grow a pool of candidate hidden neurons scored
//! by how well each would explain the network's remaining residual error,
//! then splice the best candidate in as a permanent new hidden neuron and
//! repeat.
//!
//! Cascade growth only makes sense on a shortcut-wired network, since a
//! newly inserted neuron must be reachable from every earlier neuron and
//! itself reachable by every later one.

use crate::scalar::Scalar;
use rand::Rng;

use crate::activation::{self, ActivationFunc};
use crate::dataset::TrainingData;
use crate::error::{NetworkError, NetworkResult};
use crate::layer::Layer;
use crate::network::{Network, NetworkType};
use crate::neuron::Neuron;
use crate::training::update;
use crate::training::{CallbackControl, EpochReport, TrainingAlgorithm};

/// Tunable parameters governing candidate pool shape and growth pacing
/// (§6). Defaults match the reference implementation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CascadeParams<T: Scalar> {
    pub output_change_fraction: T,
    pub output_stagnation_epochs: usize,
    pub candidate_change_fraction: T,
    pub candidate_stagnation_epochs: usize,
    pub weight_multiplier: T,
    pub candidate_limit: T,
    pub max_out_epochs: usize,
    pub min_out_epochs: usize,
    pub max_cand_epochs: usize,
    pub min_cand_epochs: usize,
    pub num_candidate_groups: usize,
    pub candidate_activation_functions: Vec<ActivationFunc>,
    pub candidate_activation_steepnesses: Vec<T>,
}

impl<T: Scalar> Default for CascadeParams<T> {
    fn default() -> Self {
        CascadeParams {
            output_change_fraction: T::from(0.01).unwrap(),
            output_stagnation_epochs: 12,
            candidate_change_fraction: T::from(0.01).unwrap(),
            candidate_stagnation_epochs: 12,
            weight_multiplier: T::from(0.4).unwrap(),
            candidate_limit: T::from(1000.0).unwrap(),
            max_out_epochs: 150,
            min_out_epochs: 50,
            max_cand_epochs: 150,
            min_cand_epochs: 50,
            num_candidate_groups: 2,
            candidate_activation_functions: ActivationFunc::CASCADE_DEFAULT.to_vec(),
            candidate_activation_steepnesses: vec![T::from(0.25).unwrap(), T::from(0.5).unwrap(), T::from(0.75).unwrap(), T::one()],
        }
    }
}

impl<T: Scalar> CascadeParams<T> {
    fn num_candidates(&self) -> usize {
        self.candidate_activation_functions.len() * self.candidate_activation_steepnesses.len() * self.num_candidate_groups
    }
}

/// A not-yet-installed hidden neuron, trained to correlate with the
/// network's residual output error.
struct Candidate<T: Scalar> {
    activation_function: ActivationFunc,
    steepness: T,
    in_weights: Vec<T>,
    in_slopes: Vec<T>,
    in_prev_steps: Vec<T>,
    in_prev_slopes: Vec<T>,
    out_weights: Vec<T>,
    out_slopes: Vec<T>,
    out_prev_steps: Vec<T>,
    out_prev_slopes: Vec<T>,
    score: T,
    value: T,
    sum: T,
}

impl<T: Scalar> Candidate<T> {
    /// `bias_index` is the source slot fed by the network's single global
    /// bias (`num_input`, i.e. the last neuron of layer 0) — the only input
    /// weight drawn from `(-scale, scale)`; every other input weight and
    /// every output weight is drawn from `(0, scale)`, matching
    /// `initialize_candidate_weights`.
    fn new(
        func: ActivationFunc,
        steepness: T,
        num_sources: usize,
        bias_index: usize,
        num_output: usize,
        scale: T,
        rprop_delta_zero: T,
        is_rprop: bool,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let step_seed = if is_rprop { rprop_delta_zero } else { T::zero() };
        let in_weights = (0..num_sources)
            .map(|i| {
                if i == bias_index {
                    T::from(rng.gen_range(-1.0..1.0)).unwrap() * scale
                } else {
                    T::from(rng.gen_range(0.0..1.0)).unwrap() * scale
                }
            })
            .collect();
        let out_weights = (0..num_output)
            .map(|_| T::from(rng.gen_range(0.0..1.0)).unwrap() * scale)
            .collect();
        Candidate {
            activation_function: func,
            steepness,
            in_weights,
            in_slopes: vec![T::zero(); num_sources],
            in_prev_steps: vec![step_seed; num_sources],
            in_prev_slopes: vec![T::zero(); num_sources],
            out_weights,
            out_slopes: vec![T::zero(); num_output],
            out_prev_steps: vec![step_seed; num_output],
            out_prev_slopes: vec![T::zero(); num_output],
            score: T::zero(),
            value: T::zero(),
            sum: T::zero(),
        }
    }

    fn forward(&mut self, source_values: &[T]) {
        let mut sum = T::zero();
        for (w, v) in self.in_weights.iter().zip(source_values.iter()) {
            sum = sum + *w * *v;
        }
        let bound = T::from(150.0).unwrap() / self.steepness;
        sum = if sum > bound { bound } else if sum < -bound { -bound } else { sum };
        self.sum = sum;
        self.value = activation::activate(self.activation_function, self.steepness, sum);
    }

    /// Accumulate this pattern's contribution to the correlation score and
    /// the input/output slopes, given the main network's per-output
    /// residual error (already derivative-scaled, §4.9 per
    /// `fann_update_candidate_slopes`).
    fn accumulate(&mut self, source_values: &[T], output_residuals: &[T]) {
        self.forward(source_values);
        let derived = activation::derivative(self.activation_function, self.steepness, self.value, self.sum);
        let two = T::one() + T::one();
        let mut error_value = T::zero();
        for j in 0..output_residuals.len() {
            let diff = self.value * self.out_weights[j] - output_residuals[j];
            self.out_slopes[j] = self.out_slopes[j] - two * diff * self.value;
            error_value = error_value + diff * self.out_weights[j];
            self.score = self.score - diff * diff;
        }
        error_value = error_value * derived;
        for (slope, &src_value) in self.in_slopes.iter_mut().zip(source_values.iter()) {
            *slope = *slope - error_value * src_value;
        }
    }
}

impl<T: Scalar> Network<T> {
    fn require_shortcut(&mut self) -> NetworkResult<()> {
        if self.network_type != NetworkType::Shortcut {
            return Err(self.set_error(NetworkError::CascadeRequiresShortcut));
        }
        Ok(())
    }

    /// Grow the network by up to `max_neurons` cascade hidden units,
    /// alternating output-phase and candidate-phase training, stopping
    /// early once `desired_error` is reached (§4.9).
    pub fn cascadetrain_on_data(
        &mut self,
        data: &TrainingData<T>,
        max_neurons: usize,
        neurons_between_reports: usize,
        desired_error: T,
        mut callback: impl FnMut(&Network<T>, usize, EpochReport<T>) -> CallbackControl,
    ) -> NetworkResult<usize> {
        self.require_shortcut()?;
        if !self.training_algorithm.usable_for_cascade() {
            return Err(self.set_error(NetworkError::UnsupportedCascadeAlgorithm(self.training_algorithm)));
        }

        let mut total_epochs = 0usize;
        for round in 1..=max_neurons {
            total_epochs += self.train_outputs(data, desired_error)?;
            let mse = self.get_mse();

            if neurons_between_reports != 0 && (round % neurons_between_reports == 0 || round == 1 || round == max_neurons) {
                let report = EpochReport { epoch: total_epochs, mse, bit_fail: self.get_bit_fail() };
                if callback(self, round, report) == CallbackControl::Stop {
                    return Ok(total_epochs);
                }
            }

            if mse <= desired_error {
                break;
            }

            let (best, epochs) = self.train_candidates(data)?;
            total_epochs += epochs;
            #[cfg(feature = "logging")]
            log::info!(
                "cascade round {round}: installing neuron {:?} (steepness {:?}) after {epochs} candidate epochs, mse={:?}",
                best.activation_function,
                best.steepness,
                mse
            );
            self.install_candidate(best);
        }

        total_epochs += self.train_outputs(data, T::zero())?;
        Ok(total_epochs)
    }

    fn out_weight_range(&self) -> std::ops::Range<usize> {
        let out_layer = *self.layers.last().unwrap();
        self.neurons[out_layer.first_neuron].first_con..self.weights.len()
    }

    /// Train only the output layer's incoming weights until improvement
    /// stagnates or `desired_error` is reached, mirroring
    /// `fann_train_outputs` (§4.9).
    fn train_outputs(&mut self, data: &TrainingData<T>, desired_error: T) -> NetworkResult<usize> {
        self.clear_train_arrays();
        let max_epochs = self.cascade_params.max_out_epochs;
        let min_epochs = self.cascade_params.min_out_epochs;
        let mut stagnation = max_epochs;

        let mut initial_error = self.train_outputs_epoch(data)?;
        if initial_error <= desired_error {
            return Ok(1);
        }

        let mut target_improvement = T::zero();
        let mut backslide_improvement = T::from(-1.0e20).unwrap();
        let change_fraction = self.cascade_params.output_change_fraction;
        let stagnation_window = self.cascade_params.output_stagnation_epochs;

        for i in 1..max_epochs {
            let error = self.train_outputs_epoch(data)?;
            if error <= desired_error {
                return Ok(i + 1);
            }

            let improvement = initial_error - error;
            if improvement > target_improvement || improvement < backslide_improvement {
                target_improvement = improvement * (T::one() + change_fraction);
                backslide_improvement = improvement * (T::one() - change_fraction);
                stagnation = i + stagnation_window;
            }
            if i >= stagnation && i >= min_epochs {
                #[cfg(feature = "logging")]
                log::debug!("output-phase training stagnated at epoch {i}");
                return Ok(i + 1);
            }
            initial_error = initial_error.min(error);
        }
        Ok(max_epochs)
    }

    fn train_outputs_epoch(&mut self, data: &TrainingData<T>) -> NetworkResult<T> {
        self.ensure_scratch_allocated();
        self.reset_mse();
        for i in 0..data.length() {
            let input = data.input(i).unwrap().to_vec();
            let desired = data.output(i).unwrap().to_vec();
            self.backward_pass(&input, &desired)?;
        }
        let range = self.out_weight_range();
        match self.training_algorithm {
            TrainingAlgorithm::RProp => update::irpropm_step_range(self, range),
            TrainingAlgorithm::Sarprop => {
                let epoch = self.sarprop_epoch;
                update::sarprop_step_range(self, epoch, range);
                self.sarprop_epoch += 1;
            }
            TrainingAlgorithm::Quickprop => update::quickprop_step_range(self, data.length(), range),
            TrainingAlgorithm::Incremental | TrainingAlgorithm::Batch => {
                return Err(self.set_error(NetworkError::UnsupportedCascadeAlgorithm(self.training_algorithm)));
            }
        }
        Ok(self.get_mse())
    }

    /// Train a fresh pool of candidate hidden neurons against the current
    /// residual error until scores stagnate, and return the winner
    /// (§4.9).
    fn train_candidates(&mut self, data: &TrainingData<T>) -> NetworkResult<(Candidate<T>, usize)> {
        let params = self.cascade_params.clone_shallow();
        let num_sources = self.layers.last().unwrap().first_neuron;
        let bias_index = self.num_input();
        let num_output = self.num_output();
        let num_hidden = num_sources - self.num_input() - 1;
        let scale = {
            let raw = T::from(2.0).unwrap() * (T::from(0.7).unwrap() * T::from(num_hidden.max(0)).unwrap()).powf(T::one() / T::from(self.num_input().max(1)).unwrap());
            let hi = T::from(8.0).unwrap();
            let lo = T::from(0.5).unwrap();
            if raw > hi { hi } else if raw < lo { lo } else { raw }
        };

        let is_rprop = self.training_algorithm == TrainingAlgorithm::RProp;
        let mut pool: Vec<Candidate<T>> = Vec::with_capacity(params.num_candidates());
        for &func in &params.candidate_activation_functions {
            for &steepness in &params.candidate_activation_steepnesses {
                for _ in 0..params.num_candidate_groups {
                    pool.push(Candidate::new(
                        func,
                        steepness,
                        num_sources,
                        bias_index,
                        num_output,
                        scale,
                        self.rprop_delta_zero,
                        is_rprop,
                    ));
                }
            }
        }

        let max_epochs = params.max_cand_epochs;
        let min_epochs = params.min_cand_epochs;
        let mut stagnation = max_epochs;
        let mut target = T::zero();
        let mut backslide = T::from(-1.0e20).unwrap();
        let mut epochs_run = max_epochs;

        for epoch in 0..max_epochs {
            let best_score = self.train_candidates_epoch(data, &mut pool, num_sources, num_output)?;

            if best_score / self.get_mse().max(T::from(1e-12).unwrap()) > params.candidate_limit {
                epochs_run = epoch + 1;
                break;
            }
            if best_score > target || best_score < backslide {
                target = best_score * (T::one() + params.candidate_change_fraction);
                backslide = best_score * (T::one() - params.candidate_change_fraction);
                stagnation = epoch + params.candidate_stagnation_epochs;
            }
            if epoch >= stagnation && epoch >= min_epochs {
                epochs_run = epoch + 1;
                break;
            }
        }

        let best_index = pool
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.score.partial_cmp(&b.1.score).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        Ok((pool.swap_remove(best_index), epochs_run))
    }

    fn train_candidates_epoch(
        &mut self,
        data: &TrainingData<T>,
        pool: &mut [Candidate<T>],
        num_sources: usize,
        num_output: usize,
    ) -> NetworkResult<T> {
        // Seeded to the network's current sum-of-squared error, not zero:
        // a candidate's score only ever decreases as `accumulate` subtracts
        // per-pattern diff^2 from it, so a zero seed would make every score
        // negative and the `candidate_limit` ratio check below unreachable.
        let (mse_sum, _, _) = self.raw_mse_parts();
        for c in pool.iter_mut() {
            c.score = mse_sum;
        }

        for i in 0..data.length() {
            let input = data.input(i).unwrap().to_vec();
            let desired = data.output(i).unwrap().to_vec();
            self.run(&input)?;

            let mut residuals = vec![T::zero(); num_output];
            let out_layer = *self.layers.last().unwrap();
            for (j, dest) in (out_layer.first_neuron..out_layer.last_neuron).enumerate() {
                let symmetric = self.neurons[dest].activation_function.is_symmetric();
                let mut diff = desired[j] - self.neurons[dest].value;
                if symmetric {
                    diff = diff / (T::one() + T::one());
                }
                residuals[j] = diff;
            }

            let source_values: Vec<T> = self.neurons[..num_sources].iter().map(|n| n.value).collect();
            for c in pool.iter_mut() {
                c.accumulate(&source_values, &residuals);
            }
        }

        for c in pool.iter_mut() {
            apply_candidate_update(self, c, data.length());
        }

        Ok(pool.iter().map(|c| c.score).fold(T::neg_infinity(), |a, x| if x > a { x } else { a }))
    }

    /// Splice `candidate` into the network as a new hidden neuron
    /// immediately before the output layer, rewiring every output
    /// neuron's incoming weights to also read from it (§4.9).
    fn install_candidate(&mut self, candidate: Candidate<T>) {
        let insert_pos = self.layers.last().unwrap().first_neuron;
        let multiplier = self.cascade_params.weight_multiplier;

        let mut per_neuron: Vec<Vec<(usize, T)>> = self
            .neurons
            .iter()
            .map(|n| {
                (n.first_con..n.last_con)
                    .map(|w| (self.connections[w], self.weights[w]))
                    .collect()
            })
            .collect();

        let new_sources: Vec<(usize, T)> = candidate.in_weights.iter().enumerate().map(|(src, &w)| (src, w)).collect();
        per_neuron.insert(insert_pos, new_sources);

        self.neurons.insert(
            insert_pos,
            Neuron::with_activation(candidate.activation_function, candidate.steepness),
        );

        let out_layer_idx = self.layers.len() - 1;
        self.layers[out_layer_idx].first_neuron += 1;
        self.layers[out_layer_idx].last_neuron += 1;
        self.layers.insert(out_layer_idx, Layer { first_neuron: insert_pos, last_neuron: insert_pos + 1 });

        for (j, out_neuron_sources) in per_neuron[insert_pos + 1..].iter_mut().enumerate() {
            out_neuron_sources.push((insert_pos, candidate.out_weights[j] * multiplier));
        }

        let mut weights = Vec::new();
        let mut connections = Vec::new();
        for (idx, n) in self.neurons.iter_mut().enumerate() {
            let first_con = weights.len();
            for &(src, w) in &per_neuron[idx] {
                connections.push(src);
                weights.push(w);
            }
            n.first_con = first_con;
            n.last_con = weights.len();
        }
        self.weights = weights;
        self.connections = connections;
        self.scratch = Default::default();
    }
}

/// Apply one epoch's accumulated candidate slopes, using whichever rule
/// `net.training_algorithm` selects, with every hyperparameter read from
/// `net`'s configurable fields rather than hardcoded — the candidate's
/// weight/slope buffers are a different shape than the network's own
/// (§4.9), but the math is the same, so it is shared via
/// `training::update`'s slice-level cores.
fn apply_candidate_update<T: Scalar>(net: &Network<T>, c: &mut Candidate<T>, num_data: usize) {
    match net.training_algorithm {
        TrainingAlgorithm::RProp => {
            let increase = net.rprop_increase_factor;
            let decrease = net.rprop_decrease_factor;
            let delta_min = net.rprop_delta_min;
            let delta_max = net.rprop_delta_max;
            update::irpropm_update(&mut c.in_weights, &mut c.in_slopes, &mut c.in_prev_steps, &mut c.in_prev_slopes, increase, decrease, delta_min, delta_max);
            update::irpropm_update(&mut c.out_weights, &mut c.out_slopes, &mut c.out_prev_steps, &mut c.out_prev_slopes, increase, decrease, delta_min, delta_max);
        }
        TrainingAlgorithm::Quickprop => {
            let epsilon = net.learning_rate / T::from(num_data.max(1)).unwrap();
            let decay = net.quickprop_decay;
            let mu = net.quickprop_mu;
            update::quickprop_update(&mut c.in_weights, &mut c.in_slopes, &mut c.in_prev_steps, &mut c.in_prev_slopes, epsilon, decay, mu);
            update::quickprop_update(&mut c.out_weights, &mut c.out_slopes, &mut c.out_prev_steps, &mut c.out_prev_slopes, epsilon, decay, mu);
        }
        TrainingAlgorithm::Sarprop => {
            let increase = net.rprop_increase_factor;
            let decrease = net.rprop_decrease_factor;
            let delta_max = net.rprop_delta_max;
            let weight_decay_shift = net.sarprop_weight_decay_shift;
            let step_error_threshold_factor = net.sarprop_step_error_threshold_factor;
            let step_error_shift = net.sarprop_step_error_shift;
            let temperature = net.sarprop_temperature;
            let mse = net.get_mse();
            update::sarprop_update(
                &mut c.in_weights,
                &mut c.in_slopes,
                &mut c.in_prev_steps,
                &mut c.in_prev_slopes,
                net.sarprop_epoch,
                increase,
                decrease,
                delta_max,
                weight_decay_shift,
                step_error_threshold_factor,
                step_error_shift,
                temperature,
                mse,
            );
            update::sarprop_update(
                &mut c.out_weights,
                &mut c.out_slopes,
                &mut c.out_prev_steps,
                &mut c.out_prev_slopes,
                net.sarprop_epoch,
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
        TrainingAlgorithm::Incremental | TrainingAlgorithm::Batch => {}
    }
}

impl<T: Scalar> CascadeParams<T> {
    fn clone_shallow(&self) -> CascadeParams<T> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunc;

    fn xor_data() -> TrainingData<f64> {
        TrainingData::create_train(
            vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
            vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
        )
        .unwrap()
    }

    #[test]
    fn cascade_requires_shortcut_topology() {
        let mut net = Network::<f64>::create_standard(&[2, 1]).unwrap();
        net.training_algorithm = TrainingAlgorithm::RProp;
        let data = xor_data();
        let err = net
            .cascadetrain_on_data(&data, 1, 0, 0.01, |_, _, _| CallbackControl::Continue)
            .unwrap_err();
        assert!(matches!(err, NetworkError::CascadeRequiresShortcut));
    }

    #[test]
    fn cascade_rejects_incremental_algorithm() {
        let mut net = Network::<f64>::create_shortcut(&[2, 1]).unwrap();
        net.training_algorithm = TrainingAlgorithm::Incremental;
        let data = xor_data();
        let err = net
            .cascadetrain_on_data(&data, 1, 0, 0.01, |_, _, _| CallbackControl::Continue)
            .unwrap_err();
        assert!(matches!(err, NetworkError::UnsupportedCascadeAlgorithm(_)));
    }

    #[test]
    fn cascade_grows_network_and_reduces_error() {
        let mut net = Network::<f64>::create_shortcut(&[2, 1]).unwrap();
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net.training_algorithm = TrainingAlgorithm::RProp;
        net.cascade_params.max_out_epochs = 20;
        net.cascade_params.max_cand_epochs = 20;
        net.cascade_params.candidate_activation_functions = vec![ActivationFunc::SigmoidSymmetric];
        net.cascade_params.candidate_activation_steepnesses = vec![0.5, 1.0];
        net.cascade_params.num_candidate_groups = 1;
        let data = xor_data();

        let before = net.total_neurons();
        net.cascadetrain_on_data(&data, 3, 0, 0.01, |_, _, _| CallbackControl::Continue).unwrap();
        assert!(net.total_neurons() > before, "expected cascade to insert at least one hidden neuron");
    }
}
