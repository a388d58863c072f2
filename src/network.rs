//! Network representation, topology construction, and forward evaluation
//! (§3, §4.2, §4.3).
//!
//! The network is a handful of flat, index-addressed arrays rather than a
//! graph of owned nodes: neurons live in one contiguous `Vec`, weights in
//! another, and (for sparse/shortcut topologies) a parallel array of source
//! indices tells each weight which neuron feeds it. Cascade growth
//! reallocates these arrays and only has to fix up indices, never chase
//! pointers (§9).

use crate::scalar::Scalar;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::activation::{self, ActivationFunc};
use crate::cascade::CascadeParams;
use crate::error::{NetworkError, NetworkResult};
use crate::layer::Layer;
use crate::neuron::Neuron;
use crate::training::{ErrorFunc, StopFunc, TrainingAlgorithm};

/// Which of the three topology classes a network was built with (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkType {
    /// Fully or sparsely connected, edges only from the immediately
    /// preceding layer.
    Layer,
    /// Edges from every earlier layer, including the global bias.
    Shortcut,
}

/// Per-feature affine scaling derived from a training set (§4.8).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleParams<T: Scalar> {
    pub mean: Vec<T>,
    pub deviation: Vec<T>,
    pub new_min: Vec<T>,
    pub factor: Vec<T>,
}

impl<T: Scalar> ScaleParams<T> {
    fn scale_value(&self, i: usize, x: T) -> T {
        ((x - self.mean[i]) / self.deviation[i] + T::one()) * self.factor[i] + self.new_min[i]
    }

    fn descale_value(&self, i: usize, y: T) -> T {
        ((y - self.new_min[i]) / self.factor[i] - T::one()) * self.deviation[i] + self.mean[i]
    }
}

/// Lazily-allocated, epoch-persistent training scratch buffers (§3).
#[derive(Debug, Clone, Default)]
pub(crate) struct TrainScratch<T: Scalar> {
    pub train_errors: Vec<T>,
    pub train_slopes: Vec<T>,
    pub prev_steps: Vec<T>,
    pub prev_train_slopes: Vec<T>,
    pub prev_weight_deltas: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct Network<T: Scalar> {
    pub(crate) layers: Vec<Layer>,
    pub(crate) neurons: Vec<Neuron<T>>,
    pub(crate) weights: Vec<T>,
    /// Source-neuron index per weight. Populated for every topology for
    /// uniformity (§3); the fully-layered forward/backprop path ignores it
    /// and walks consecutive indices instead.
    pub(crate) connections: Vec<usize>,
    pub(crate) output: Vec<T>,

    pub network_type: NetworkType,
    pub connection_rate: f64,

    pub learning_rate: T,
    pub learning_momentum: T,
    pub training_algorithm: TrainingAlgorithm,
    pub error_function: ErrorFunc,
    pub stop_function: StopFunc,
    pub bit_fail_limit: T,

    pub rprop_increase_factor: T,
    pub rprop_decrease_factor: T,
    pub rprop_delta_min: T,
    pub rprop_delta_max: T,
    pub rprop_delta_zero: T,

    pub quickprop_decay: T,
    pub quickprop_mu: T,

    pub sarprop_weight_decay_shift: T,
    pub sarprop_step_error_threshold_factor: T,
    pub sarprop_step_error_shift: T,
    pub sarprop_temperature: T,
    pub sarprop_epoch: usize,

    pub(crate) scratch: TrainScratch<T>,

    mse_value: T,
    num_mse: usize,
    num_bit_fail: usize,

    input_scale: Option<ScaleParams<T>>,
    output_scale: Option<ScaleParams<T>>,

    pub cascade_params: CascadeParams<T>,

    last_error: Option<NetworkError>,
}

/// Saturation bound applied to the weighted sum before activation, scaled
/// by steepness so exp-based activations never overflow (§4.3 step 3).
fn sum_saturation<T: Scalar>(steepness: T) -> T {
    T::from(150.0).unwrap() / steepness
}

impl<T: Scalar> Network<T> {
    fn validate_layers(layers: &[usize]) -> NetworkResult<()> {
        if layers.len() < 2 {
            return Err(NetworkError::TooFewLayers(layers.len()));
        }
        for (i, &n) in layers.iter().enumerate() {
            if n == 0 {
                return Err(NetworkError::EmptyLayer { index: i });
            }
        }
        Ok(())
    }

    /// Build a fully-connected layered network (§4.2, `connection_rate = 1`).
    pub fn create_standard(layers: &[usize]) -> NetworkResult<Self> {
        Self::create_sparse(1.0, layers)
    }

    /// Build a layered network with a fractional connection rate (§4.2).
    /// `rate = 1.0` produces the fully-connected case.
    pub fn create_sparse(rate: f64, layers: &[usize]) -> NetworkResult<Self> {
        Self::validate_layers(layers)?;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(NetworkError::InvalidConnectionRate(rate));
        }

        let mut rng = rand::thread_rng();
        let mut net_layers = Vec::with_capacity(layers.len());
        let mut neurons: Vec<Neuron<T>> = Vec::new();
        let mut weights: Vec<T> = Vec::new();
        let mut connections: Vec<usize> = Vec::new();

        // First pass: allocate neurons per layer (with a bias on every
        // non-output layer).
        let num_layers = layers.len();
        for (li, &size) in layers.iter().enumerate() {
            let first = neurons.len();
            let has_bias = li + 1 != num_layers;
            for _ in 0..size {
                neurons.push(Neuron::unwired());
            }
            if has_bias {
                neurons.push(Neuron::bias(0));
            }
            net_layers.push(Layer {
                first_neuron: first,
                last_neuron: neurons.len(),
            });
        }

        let uniform = Uniform::new_inclusive(-0.1, 0.1);

        // Second pass: wire connections layer by layer.
        for li in 1..num_layers {
            let prev = net_layers[li - 1];
            let cur = net_layers[li];
            let prev_size = prev.len();
            let is_output_layer = li + 1 == num_layers;
            let dest_count = if is_output_layer { cur.len() } else { cur.len() - 1 };

            if (rate - 1.0).abs() < f64::EPSILON {
                for dest in cur.first_neuron..(cur.first_neuron + dest_count) {
                    let first_con = weights.len();
                    for src in prev.first_neuron..prev.last_neuron {
                        connections.push(src);
                        weights.push(T::from(uniform.sample(&mut rng)).unwrap());
                    }
                    neurons[dest].first_con = first_con;
                    neurons[dest].last_con = weights.len();
                }
            } else {
                wire_sparse_layer(
                    &mut rng,
                    &uniform,
                    prev,
                    cur.first_neuron,
                    dest_count,
                    rate,
                    &mut neurons,
                    &mut weights,
                    &mut connections,
                );
            }
        }

        Ok(Self::assemble(
            net_layers,
            neurons,
            weights,
            connections,
            NetworkType::Layer,
            rate,
        ))
    }

    /// Build a shortcut network: every neuron in layer `k>0` connects from
    /// every neuron in every earlier layer, including the single bias in
    /// layer 0 (§4.2).
    pub fn create_shortcut(layers: &[usize]) -> NetworkResult<Self> {
        Self::validate_layers(layers)?;

        let mut rng = rand::thread_rng();
        let mut net_layers = Vec::with_capacity(layers.len());
        let mut neurons: Vec<Neuron<T>> = Vec::new();
        let num_layers = layers.len();

        for (li, &size) in layers.iter().enumerate() {
            let first = neurons.len();
            for _ in 0..size {
                neurons.push(Neuron::unwired());
            }
            if li == 0 {
                neurons.push(Neuron::bias(0));
            }
            net_layers.push(Layer {
                first_neuron: first,
                last_neuron: neurons.len(),
            });
        }

        let uniform = Uniform::new_inclusive(-0.1, 0.1);
        let mut weights: Vec<T> = Vec::new();
        let mut connections: Vec<usize> = Vec::new();

        for li in 1..num_layers {
            let cur = net_layers[li];
            for dest in cur.first_neuron..cur.last_neuron {
                let first_con = weights.len();
                for earlier in net_layers.iter().take(li) {
                    for src in earlier.first_neuron..earlier.last_neuron {
                        connections.push(src);
                        weights.push(T::from(uniform.sample(&mut rng)).unwrap());
                    }
                }
                neurons[dest].first_con = first_con;
                neurons[dest].last_con = weights.len();
            }
        }

        Ok(Self::assemble(
            net_layers,
            neurons,
            weights,
            connections,
            NetworkType::Shortcut,
            1.0,
        ))
    }

    fn assemble(
        layers: Vec<Layer>,
        neurons: Vec<Neuron<T>>,
        weights: Vec<T>,
        connections: Vec<usize>,
        network_type: NetworkType,
        connection_rate: f64,
    ) -> Self {
        let num_output = layers.last().unwrap().len();
        Network {
            layers,
            neurons,
            weights,
            connections,
            output: vec![T::zero(); num_output],
            network_type,
            connection_rate,
            learning_rate: T::from(0.7).unwrap(),
            learning_momentum: T::zero(),
            training_algorithm: TrainingAlgorithm::RProp,
            error_function: ErrorFunc::Linear,
            stop_function: StopFunc::Mse,
            bit_fail_limit: T::from(0.35).unwrap(),
            rprop_increase_factor: T::from(1.2).unwrap(),
            rprop_decrease_factor: T::from(0.5).unwrap(),
            rprop_delta_min: T::from(0.0).unwrap(),
            rprop_delta_max: T::from(50.0).unwrap(),
            rprop_delta_zero: T::from(0.1).unwrap(),
            quickprop_decay: T::from(-0.0001).unwrap(),
            quickprop_mu: T::from(1.75).unwrap(),
            sarprop_weight_decay_shift: T::from(-6.644).unwrap(),
            sarprop_step_error_threshold_factor: T::from(0.1).unwrap(),
            sarprop_step_error_shift: T::from(1.385).unwrap(),
            sarprop_temperature: T::from(0.015).unwrap(),
            sarprop_epoch: 0,
            scratch: TrainScratch::default(),
            mse_value: T::zero(),
            num_mse: 0,
            num_bit_fail: 0,
            input_scale: None,
            output_scale: None,
            cascade_params: CascadeParams::default(),
            last_error: None,
        }
    }

    // -- inspection -----------------------------------------------------

    pub fn num_input(&self) -> usize {
        self.layers.first().map_or(0, |l| {
            let has_bias = self.layers.len() > 1;
            if has_bias {
                l.len() - 1
            } else {
                l.len()
            }
        })
    }

    pub fn num_output(&self) -> usize {
        self.layers.last().map_or(0, |l| l.len())
    }

    pub fn total_neurons(&self) -> usize {
        self.neurons.len()
    }

    pub fn total_connections(&self) -> usize {
        self.weights.len()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_array(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.len()).collect()
    }

    pub fn bias_array(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i + 1 != self.layers.len())
            .map(|(_, l)| if self.network_type == NetworkType::Shortcut { 1 } else { 1 })
            .collect::<Vec<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, _)| {
                if self.network_type == NetworkType::Shortcut && i != 0 {
                    0
                } else {
                    1
                }
            })
            .collect()
    }

    /// Source-neuron index for every weight, in weight order.
    pub fn connection_array(&self) -> &[usize] {
        &self.connections
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn last_error(&self) -> Option<&NetworkError> {
        self.last_error.as_ref()
    }

    pub fn reset_errno(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn set_error(&mut self, e: NetworkError) -> NetworkError {
        self.last_error = Some(e.clone());
        e
    }

    /// Raw MSE accumulator state (unaveraged sum-of-squared-error plus
    /// counts), exposed so a parallel batch epoch can merge each worker
    /// shard's contribution back into this network, and so cascade
    /// candidate training can seed candidate scores from the same raw sum
    /// the reference implementation uses, without making the accumulator
    /// itself public (§5, §4.9).
    pub(crate) fn raw_mse_parts(&self) -> (T, usize, usize) {
        (self.mse_value, self.num_mse, self.num_bit_fail)
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn merge_mse(&mut self, mse_value: T, num_mse: usize, num_bit_fail: usize) {
        self.mse_value = self.mse_value + mse_value;
        self.num_mse += num_mse;
        self.num_bit_fail += num_bit_fail;
    }

    // -- persistence --------------------------------------------------------
    //
    // The snapshot type lives here rather than in `io.rs` because it needs
    // struct-literal access to every private field (the MSE accumulators,
    // the scaling params, `last_error`); `io.rs` only ever sees the opaque
    // `NetworkSnapshot` and does the actual file/byte-stream work.

    #[cfg(feature = "io")]
    pub(crate) fn to_snapshot(&self) -> crate::io::NetworkSnapshot<T> {
        crate::io::NetworkSnapshot {
            layers: self.layers.clone(),
            neurons: self.neurons.clone(),
            weights: self.weights.clone(),
            connections: self.connections.clone(),
            network_type: self.network_type,
            connection_rate: self.connection_rate,
            learning_rate: self.learning_rate,
            learning_momentum: self.learning_momentum,
            training_algorithm: self.training_algorithm,
            error_function: self.error_function,
            stop_function: self.stop_function,
            bit_fail_limit: self.bit_fail_limit,
            rprop_increase_factor: self.rprop_increase_factor,
            rprop_decrease_factor: self.rprop_decrease_factor,
            rprop_delta_min: self.rprop_delta_min,
            rprop_delta_max: self.rprop_delta_max,
            rprop_delta_zero: self.rprop_delta_zero,
            quickprop_decay: self.quickprop_decay,
            quickprop_mu: self.quickprop_mu,
            sarprop_weight_decay_shift: self.sarprop_weight_decay_shift,
            sarprop_step_error_threshold_factor: self.sarprop_step_error_threshold_factor,
            sarprop_step_error_shift: self.sarprop_step_error_shift,
            sarprop_temperature: self.sarprop_temperature,
            sarprop_epoch: self.sarprop_epoch,
            input_scale: self.input_scale.clone(),
            output_scale: self.output_scale.clone(),
            cascade_params: self.cascade_params.clone(),
        }
    }

    #[cfg(feature = "io")]
    pub(crate) fn from_snapshot(snap: crate::io::NetworkSnapshot<T>) -> Self {
        let output = vec![T::zero(); snap.layers.last().map(|l| l.len()).unwrap_or(0)];
        Network {
            layers: snap.layers,
            neurons: snap.neurons,
            weights: snap.weights,
            connections: snap.connections,
            output,
            network_type: snap.network_type,
            connection_rate: snap.connection_rate,
            learning_rate: snap.learning_rate,
            learning_momentum: snap.learning_momentum,
            training_algorithm: snap.training_algorithm,
            error_function: snap.error_function,
            stop_function: snap.stop_function,
            bit_fail_limit: snap.bit_fail_limit,
            rprop_increase_factor: snap.rprop_increase_factor,
            rprop_decrease_factor: snap.rprop_decrease_factor,
            rprop_delta_min: snap.rprop_delta_min,
            rprop_delta_max: snap.rprop_delta_max,
            rprop_delta_zero: snap.rprop_delta_zero,
            quickprop_decay: snap.quickprop_decay,
            quickprop_mu: snap.quickprop_mu,
            sarprop_weight_decay_shift: snap.sarprop_weight_decay_shift,
            sarprop_step_error_threshold_factor: snap.sarprop_step_error_threshold_factor,
            sarprop_step_error_shift: snap.sarprop_step_error_shift,
            sarprop_temperature: snap.sarprop_temperature,
            sarprop_epoch: snap.sarprop_epoch,
            scratch: Default::default(),
            mse_value: T::zero(),
            num_mse: 0,
            num_bit_fail: 0,
            input_scale: snap.input_scale,
            output_scale: snap.output_scale,
            cascade_params: snap.cascade_params,
            last_error: None,
        }
    }

    // -- weights ----------------------------------------------------------

    pub fn set_weights(&mut self, weights: &[T]) -> NetworkResult<()> {
        if weights.len() != self.weights.len() {
            return Err(self.set_error(NetworkError::WeightCountMismatch {
                expected: self.weights.len(),
                actual: weights.len(),
            }));
        }
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    pub fn set_weight_array(&mut self, weights: &[T]) -> NetworkResult<()> {
        self.set_weights(weights)
    }

    pub fn get_weights(&self) -> Vec<T> {
        self.weights.clone()
    }

    pub fn randomize_weights(&mut self, min: T, max: T) {
        let mut rng = rand::thread_rng();
        for i in 0..self.weights.len() {
            if !self.is_bias_weight_slot(i) {
                self.weights[i] = rng.gen_range(min..=max);
            }
        }
    }

    fn is_bias_weight_slot(&self, _weight_index: usize) -> bool {
        false
    }

    /// Widrow-Nguyen initialization (§4.2): derive a per-weight scale from
    /// the input range and hidden-neuron count, then reseed weights.
    pub fn init_weights(&mut self, inputs: &[Vec<T>]) {
        let num_input = self.num_input();
        if inputs.is_empty() || num_input == 0 {
            return;
        }
        let mut min_in = inputs[0][0];
        let mut max_in = inputs[0][0];
        for row in inputs {
            for &x in row {
                if x < min_in {
                    min_in = x;
                }
                if x > max_in {
                    max_in = x;
                }
            }
        }
        let hidden: usize = self
            .layers
            .iter()
            .take(self.layers.len().saturating_sub(1))
            .skip(1)
            .map(|l| l.len())
            .sum();
        let range = (max_in - min_in).max(T::from(1e-6).unwrap());
        let h = T::from(hidden.max(1)).unwrap();
        let n = T::from(num_input.max(1)).unwrap();
        let base = T::from(0.7).unwrap() * h;
        let scale = base.powf(T::one() / n) / range;

        // Which neuron counts as "the bias" feeding a given layer: for a
        // layered network it is the immediately preceding layer's own local
        // bias, re-chosen every iteration; for a shortcut network every
        // layer is fed by the single global bias in layer 0 (§4.2, matching
        // `fann_init_weights`'s `bias_neuron` reassignment).
        let global_bias = self.layers[0].last_neuron - 1;
        let mut rng = rand::thread_rng();
        for li in 1..self.layers.len() {
            let prev = self.layers[li - 1];
            let layer = self.layers[li];
            let is_output = li + 1 == self.layers.len();
            let dest_count = if is_output { layer.len() } else { layer.len() - 1 };
            let bias_neuron = if self.network_type == NetworkType::Layer {
                prev.last_neuron - 1
            } else {
                global_bias
            };
            for dest in layer.first_neuron..(layer.first_neuron + dest_count) {
                let n = &self.neurons[dest];
                for w_idx in n.first_con..n.last_con {
                    let src = self.connections[w_idx];
                    self.weights[w_idx] = if src == bias_neuron {
                        T::from(rng.gen_range(-1.0..=1.0)).unwrap() * scale
                    } else {
                        T::from(rng.gen_range(0.0..=1.0)).unwrap() * scale
                    };
                }
            }
        }
        self.scratch = TrainScratch::default();
    }

    // -- activation accessors --------------------------------------------

    pub fn set_neuron_activation(&mut self, neuron: usize, func: ActivationFunc) -> NetworkResult<()> {
        let len = self.neurons.len();
        let n = self
            .neurons
            .get_mut(neuron)
            .ok_or(NetworkError::IndexOutOfRange { index: neuron, len })?;
        n.activation_function = func;
        Ok(())
    }

    pub fn set_neuron_steepness(&mut self, neuron: usize, steepness: T) -> NetworkResult<()> {
        let len = self.neurons.len();
        let n = self
            .neurons
            .get_mut(neuron)
            .ok_or(NetworkError::IndexOutOfRange { index: neuron, len })?;
        n.activation_steepness = steepness;
        Ok(())
    }

    fn layer_neuron_range(&self, layer_index: usize) -> NetworkResult<Layer> {
        self.layers
            .get(layer_index)
            .copied()
            .ok_or(NetworkError::IndexOutOfRange {
                index: layer_index,
                len: self.layers.len(),
            })
    }

    pub fn set_layer_activation(&mut self, layer_index: usize, func: ActivationFunc) -> NetworkResult<()> {
        let layer = self.layer_neuron_range(layer_index)?;
        for n in &mut self.neurons[layer.first_neuron..layer.last_neuron] {
            if !n.is_bias() {
                n.activation_function = func;
            }
        }
        Ok(())
    }

    pub fn set_layer_steepness(&mut self, layer_index: usize, steepness: T) -> NetworkResult<()> {
        let layer = self.layer_neuron_range(layer_index)?;
        for n in &mut self.neurons[layer.first_neuron..layer.last_neuron] {
            if !n.is_bias() {
                n.activation_steepness = steepness;
            }
        }
        Ok(())
    }

    pub fn set_activation_function_hidden(&mut self, func: ActivationFunc) {
        let last = self.layers.len() - 1;
        for li in 1..last {
            let _ = self.set_layer_activation(li, func);
        }
    }

    pub fn set_activation_function_output(&mut self, func: ActivationFunc) {
        let last = self.layers.len() - 1;
        let _ = self.set_layer_activation(last, func);
    }

    pub fn set_activation_steepness_hidden(&mut self, steepness: T) {
        let last = self.layers.len() - 1;
        for li in 1..last {
            let _ = self.set_layer_steepness(li, steepness);
        }
    }

    pub fn set_activation_steepness_output(&mut self, steepness: T) {
        let last = self.layers.len() - 1;
        let _ = self.set_layer_steepness(last, steepness);
    }

    // -- forward pass ------------------------------------------------------

    /// Compute each neuron's weighted sum and activation, layer by layer
    /// (§4.3), and return the output buffer.
    pub fn run(&mut self, input: &[T]) -> NetworkResult<&[T]> {
        if input.len() != self.num_input() {
            return Err(self.set_error(NetworkError::DimensionMismatch {
                net_inputs: self.num_input(),
                net_outputs: self.num_output(),
                data_inputs: input.len(),
                data_outputs: 0,
            }));
        }

        let first_layer = self.layers[0];
        for (i, &x) in input.iter().enumerate() {
            self.neurons[first_layer.first_neuron + i].value = x;
        }
        if first_layer.len() > input.len() {
            self.neurons[first_layer.last_neuron - 1].value = T::one();
        }

        let is_shortcut = self.network_type == NetworkType::Shortcut;
        let is_full = (self.connection_rate - 1.0).abs() < f64::EPSILON;

        for li in 1..self.layers.len() {
            let layer = self.layers[li];
            let prev = self.layers[li - 1];
            for dest in layer.first_neuron..layer.last_neuron {
                if self.neurons[dest].is_bias() {
                    self.neurons[dest].value = T::one();
                    continue;
                }
                let (first_con, last_con, steepness, func) = {
                    let n = &self.neurons[dest];
                    (n.first_con, n.last_con, n.activation_steepness, n.activation_function)
                };
                let mut sum = T::zero();
                if is_full && !is_shortcut {
                    let base = prev.first_neuron;
                    let n = last_con - first_con;
                    let rem = n & 3;
                    let mut i = 0;
                    if rem >= 3 {
                        sum = sum + self.weights[first_con + 2] * self.neurons[base + 2].value;
                    }
                    if rem >= 2 {
                        sum = sum + self.weights[first_con + 1] * self.neurons[base + 1].value;
                    }
                    if rem >= 1 {
                        sum = sum + self.weights[first_con] * self.neurons[base].value;
                    }
                    i = rem;
                    while i != n {
                        sum = sum
                            + self.weights[first_con + i] * self.neurons[base + i].value
                            + self.weights[first_con + i + 1] * self.neurons[base + i + 1].value
                            + self.weights[first_con + i + 2] * self.neurons[base + i + 2].value
                            + self.weights[first_con + i + 3] * self.neurons[base + i + 3].value;
                        i += 4;
                    }
                } else {
                    for w_idx in first_con..last_con {
                        let src = self.connections[w_idx];
                        sum = sum + self.weights[w_idx] * self.neurons[src].value;
                    }
                }
                let bound = sum_saturation(steepness);
                sum = if sum > bound {
                    bound
                } else if sum < -bound {
                    -bound
                } else {
                    sum
                };
                let value = activation::activate(func, steepness, sum);
                self.neurons[dest].sum = sum;
                self.neurons[dest].value = value;
            }
        }

        let out_layer = *self.layers.last().unwrap();
        for (i, src) in (out_layer.first_neuron..out_layer.last_neuron).enumerate() {
            self.output[i] = self.neurons[src].value;
        }
        Ok(&self.output)
    }

    pub fn output(&self) -> &[T] {
        &self.output
    }

    // -- MSE / bit-fail accounting (§4.4) ----------------------------------

    pub fn get_mse(&self) -> T {
        if self.num_mse == 0 {
            T::zero()
        } else {
            self.mse_value / T::from(self.num_mse).unwrap()
        }
    }

    pub fn get_bit_fail(&self) -> usize {
        self.num_bit_fail
    }

    pub fn reset_mse(&mut self) {
        self.mse_value = T::zero();
        self.num_mse = 0;
        self.num_bit_fail = 0;
    }

    pub(crate) fn accumulate_mse(&mut self, diff: T, symmetric: bool) -> T {
        let two = T::one() + T::one();
        let d = if symmetric { diff / two } else { diff };
        self.mse_value = self.mse_value + d * d;
        self.num_mse += 1;
        if d.abs() >= self.bit_fail_limit {
            self.num_bit_fail += 1;
        }
        d
    }

    /// Evaluate the network on one pattern and accumulate MSE/bit-fail
    /// without backpropagating (§SPEC_FULL supplement, `fann_test`).
    pub fn test(&mut self, input: &[T], desired: &[T]) -> NetworkResult<&[T]> {
        self.run(input)?;
        for (o, &d) in self.output.clone().iter().zip(desired.iter()) {
            let symmetric = {
                let out_layer = *self.layers.last().unwrap();
                self.neurons[out_layer.first_neuron].activation_function.is_symmetric()
            };
            self.accumulate_mse(d - *o, symmetric);
        }
        Ok(&self.output)
    }

    // -- scaling (§4.8) -----------------------------------------------------

    pub fn set_scaling_params(
        &mut self,
        inputs: &[Vec<T>],
        outputs: &[Vec<T>],
        in_min: T,
        in_max: T,
        out_min: T,
        out_max: T,
    ) -> NetworkResult<()> {
        self.input_scale = Some(derive_scale(inputs, in_min, in_max));
        self.output_scale = Some(derive_scale(outputs, out_min, out_max));
        Ok(())
    }

    pub fn clear_scaling_params(&mut self) {
        self.input_scale = None;
        self.output_scale = None;
    }

    pub fn scale_input(&self, input: &mut [T]) -> NetworkResult<()> {
        let p = self
            .input_scale
            .as_ref()
            .ok_or(NetworkError::ScalingParamsMissing)?;
        for (i, x) in input.iter_mut().enumerate() {
            *x = p.scale_value(i, *x);
        }
        Ok(())
    }

    pub fn descale_input(&self, input: &mut [T]) -> NetworkResult<()> {
        let p = self
            .input_scale
            .as_ref()
            .ok_or(NetworkError::ScalingParamsMissing)?;
        for (i, x) in input.iter_mut().enumerate() {
            *x = p.descale_value(i, *x);
        }
        Ok(())
    }

    pub fn scale_output(&self, output: &mut [T]) -> NetworkResult<()> {
        let p = self
            .output_scale
            .as_ref()
            .ok_or(NetworkError::ScalingParamsMissing)?;
        for (i, x) in output.iter_mut().enumerate() {
            *x = p.scale_value(i, *x);
        }
        Ok(())
    }

    pub fn descale_output(&self, output: &mut [T]) -> NetworkResult<()> {
        let p = self
            .output_scale
            .as_ref()
            .ok_or(NetworkError::ScalingParamsMissing)?;
        for (i, x) in output.iter_mut().enumerate() {
            *x = p.descale_value(i, *x);
        }
        Ok(())
    }

    // -- diagnostics --------------------------------------------------------

    pub fn print_parameters(&self) -> String {
        format!(
            "network type: {:?}\nlayers: {:?}\nconnection rate: {}\nlearning rate: {:?}\nmomentum: {:?}\ntraining algorithm: {:?}\nbit fail limit: {:?}",
            self.network_type,
            self.layer_array(),
            self.connection_rate,
            self.learning_rate,
            self.learning_momentum,
            self.training_algorithm,
            self.bit_fail_limit,
        )
    }

    pub fn print_connections(&self) -> String {
        let mut s = String::new();
        for (dest, n) in self.neurons.iter().enumerate() {
            if n.is_bias() {
                continue;
            }
            for w_idx in n.first_con..n.last_con {
                s.push_str(&format!(
                    "{} -> {} : {:?}\n",
                    self.connections[w_idx], dest, self.weights[w_idx]
                ));
            }
        }
        s
    }
}

fn derive_scale<T: Scalar>(data: &[Vec<T>], new_min: T, new_max: T) -> ScaleParams<T> {
    let width = data.first().map_or(0, |r| r.len());
    let n = T::from(data.len().max(1)).unwrap();
    let two = T::one() + T::one();
    let mut mean = vec![T::zero(); width];
    for row in data {
        for (i, &x) in row.iter().enumerate() {
            mean[i] = mean[i] + x;
        }
    }
    for m in &mut mean {
        *m = *m / n;
    }
    let mut deviation = vec![T::zero(); width];
    for row in data {
        for (i, &x) in row.iter().enumerate() {
            let d = x - mean[i];
            deviation[i] = deviation[i] + d * d;
        }
    }
    for d in &mut deviation {
        *d = (*d / n).sqrt();
        if *d <= T::zero() {
            *d = T::one();
        }
    }
    let factor = vec![(new_max - new_min) / two; width];
    let new_min_vec = vec![new_min; width];
    ScaleParams {
        mean,
        deviation,
        new_min: new_min_vec,
        factor,
    }
}

/// Sparse layer wiring: seed a bias edge to every destination, give every
/// source at least one outgoing edge, then sample the remainder uniformly
/// at random rejecting per-destination duplicates (§4.2).
#[allow(clippy::too_many_arguments)]
fn wire_sparse_layer<T: Scalar>(
    rng: &mut impl Rng,
    uniform: &Uniform<f64>,
    prev: Layer,
    dest_first: usize,
    dest_count: usize,
    rate: f64,
    neurons: &mut [Neuron<T>],
    weights: &mut Vec<T>,
    connections: &mut Vec<usize>,
) {
    let prev_size = prev.len();
    let bias_src = prev.last_neuron - 1;
    let has_bias = neurons[bias_src].is_bias();
    let fan_in = prev_size;
    let fan_out = dest_count;
    let quota = (fan_in.max(fan_out) as f64
        + (rate * (fan_in * fan_out) as f64).round()
        + fan_out as f64) as usize;

    let mut dest_sources: Vec<Vec<usize>> = vec![Vec::new(); dest_count];

    // Stage 1: seed a bias edge from layer k-1 to every neuron of layer k.
    if has_bias {
        for d in dest_sources.iter_mut() {
            d.push(bias_src);
        }
    }

    // Stage 2: give every source neuron at least one destination with a
    // free slot.
    let non_bias_sources: Vec<usize> = (prev.first_neuron..prev.last_neuron)
        .filter(|&s| s != bias_src)
        .collect();
    for &src in &non_bias_sources {
        let mut order: Vec<usize> = (0..dest_count).collect();
        shuffle(rng, &mut order);
        for &d in &order {
            if !dest_sources[d].contains(&src) {
                dest_sources[d].push(src);
                break;
            }
        }
    }

    // Stage 3: fill the remaining quota by uniform random sampling,
    // rejecting duplicates.
    let total_edges_so_far: usize = dest_sources.iter().map(|d| d.len()).sum();
    let remaining = quota.saturating_sub(total_edges_so_far);
    let max_possible: usize = dest_count * prev_size - total_edges_so_far;
    let mut added = 0usize;
    let mut attempts = 0usize;
    while added < remaining.min(max_possible) && attempts < remaining * 8 + 64 {
        attempts += 1;
        let d = rng.gen_range(0..dest_count);
        let src = prev.first_neuron + rng.gen_range(0..prev_size);
        if !dest_sources[d].contains(&src) {
            dest_sources[d].push(src);
            added += 1;
        }
    }

    for (i, sources) in dest_sources.into_iter().enumerate() {
        let dest = dest_first + i;
        let first_con = weights.len();
        for src in sources {
            connections.push(src);
            weights.push(T::from(uniform.sample(rng)).unwrap());
        }
        neurons[dest].first_con = first_con;
        neurons[dest].last_con = weights.len();
    }
}

fn shuffle<T>(rng: &mut impl Rng, slice: &mut [T]) {
    for i in (1..slice.len()).rev() {
        let j = rng.gen_range(0..=i);
        slice.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_network_has_expected_shape() {
        let net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        assert_eq!(net.num_input(), 2);
        assert_eq!(net.num_output(), 1);
        // layer0: 2 inputs + bias = 3, layer1: 3 hidden + bias = 4, layer2: 1 output
        assert_eq!(net.total_neurons(), 3 + 4 + 1);
        // layer1: 3 dest * 3 src(2in+bias) = 9, layer2: 1 dest * 4 src(3hidden+bias) = 4
        assert_eq!(net.total_connections(), 9 + 4);
    }

    #[test]
    fn weights_start_within_bounds() {
        let net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        for &w in net.weights() {
            assert!((-0.1..=0.1).contains(&w));
        }
    }

    #[test]
    fn randomize_weights_respects_bounds() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.randomize_weights(-2.0, 2.0);
        for &w in net.weights() {
            assert!((-2.0..=2.0).contains(&w));
        }
    }

    #[test]
    fn forward_pass_matches_hand_computation() {
        // Scenario 2 from the spec: 2-3-1 layered network, all weights 0.5,
        // steepness 1, linear activations.
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        let n = net.weights.len();
        net.set_weights(&vec![0.5; n]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::Linear);
        net.set_activation_function_output(ActivationFunc::Linear);
        net.set_activation_steepness_hidden(1.0);
        net.set_activation_steepness_output(1.0);

        let out = net.run(&[1.0, 1.0]).unwrap();
        assert!((out[0] - 2.75).abs() < 1e-9);
    }

    #[test]
    fn bias_neuron_value_is_always_one_after_run() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.run(&[0.3, -0.2]).unwrap();
        for layer in &net.layers[..net.layers.len() - 1] {
            let bias_idx = layer.last_neuron - 1;
            assert_eq!(net.neurons[bias_idx].value, 1.0);
        }
    }

    #[test]
    fn sparse_network_every_destination_has_bias_edge() {
        let net = Network::<f64>::create_sparse(0.3, &[10, 10, 10]).unwrap();
        for li in 1..net.layers.len() {
            let prev = net.layers[li - 1];
            let bias_src = prev.last_neuron - 1;
            let cur = net.layers[li];
            let dest_count = if li + 1 == net.layers.len() {
                cur.len()
            } else {
                cur.len() - 1
            };
            for dest in cur.first_neuron..(cur.first_neuron + dest_count) {
                let n = &net.neurons[dest];
                let has_bias = (n.first_con..n.last_con).any(|w| net.connections[w] == bias_src);
                assert!(has_bias, "neuron {dest} missing bias edge");
            }
        }
    }

    #[test]
    fn shortcut_network_edges_point_to_strictly_earlier_layers() {
        let net = Network::<f64>::create_shortcut(&[3, 2, 2, 1]).unwrap();
        for li in 1..net.layers.len() {
            let cur = net.layers[li];
            for dest in cur.first_neuron..cur.last_neuron {
                let n = &net.neurons[dest];
                for w in n.first_con..n.last_con {
                    let src = net.connections[w];
                    assert!(src < cur.first_neuron);
                }
            }
        }
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        let err = net.run(&[1.0]).unwrap_err();
        assert!(matches!(err, NetworkError::DimensionMismatch { .. }));
        assert!(net.last_error().is_some());
    }
}
