//! Multi-threaded batch epoch: shard the dataset across a rayon thread
//! pool, run an independent network clone over each shard, and reduce
//! every shard's accumulated slopes into the master network before a
//! single weight update (§5, grounded on `parallel_fann.c`).
//!
//! Each worker clone computes exactly what `backward_pass` computes
//! sequentially; the only difference from single-threaded batch training
//! is that the slope accumulation for the whole dataset is split across
//! `N` independent `train_slopes` buffers that get summed afterward,
//! matching `fann_train_epoch_irpropm_parallel`'s `ann_vect` pattern.

use crate::scalar::Scalar;
use rayon::prelude::*;

use crate::dataset::TrainingData;
use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;
use crate::training::{update, TrainingAlgorithm};

impl<T: Scalar> Network<T> {
    /// Train one epoch with the dataset split across `num_threads` worker
    /// shards (defaults to `num_cpus::get()`). `Incremental` training has
    /// no parallel form (its momentum term is inherently sequential), so
    /// it falls back to the ordinary single-threaded epoch, matching
    /// `fann_train_epoch_incremental_mod`'s plain sequential loop.
    pub fn train_epoch_parallel(&mut self, data: &TrainingData<T>, num_threads: Option<usize>) -> NetworkResult<T> {
        if data.num_input() != self.num_input() || data.num_output() != self.num_output() {
            return Err(self.set_error(NetworkError::DimensionMismatch {
                net_inputs: self.num_input(),
                net_outputs: self.num_output(),
                data_inputs: data.num_input(),
                data_outputs: data.num_output(),
            }));
        }

        if self.training_algorithm == TrainingAlgorithm::Incremental {
            return self.train_epoch(data);
        }

        self.ensure_scratch_allocated();
        self.reset_mse();

        let len = data.length();
        let threads = num_threads.unwrap_or_else(num_cpus::get).max(1).min(len.max(1));
        let chunk = len.div_ceil(threads);

        let shards: Vec<(Vec<T>, T, usize, usize)> = (0..threads)
            .into_par_iter()
            .map(|t| {
                let start = (t * chunk).min(len);
                let end = (start + chunk).min(len);
                let mut worker = self.clone();
                worker.reset_mse();
                for i in start..end {
                    let input = data.input(i).unwrap().to_vec();
                    let desired = data.output(i).unwrap().to_vec();
                    worker
                        .backward_pass(&input, &desired)
                        .expect("shard dimensions were validated against the network before sharding");
                }
                let (mse_value, num_mse, num_bit_fail) = worker.raw_mse_parts();
                (worker.scratch.train_slopes.clone(), mse_value, num_mse, num_bit_fail)
            })
            .collect();

        for (slopes, mse_value, num_mse, num_bit_fail) in shards {
            for (acc, s) in self.scratch.train_slopes.iter_mut().zip(slopes.iter()) {
                *acc = *acc + *s;
            }
            self.merge_mse(mse_value, num_mse, num_bit_fail);
        }

        match self.training_algorithm {
            TrainingAlgorithm::Batch => update::batch_step(self, len),
            TrainingAlgorithm::RProp => update::irpropm_step(self),
            TrainingAlgorithm::Quickprop => update::quickprop_step(self, len),
            TrainingAlgorithm::Sarprop => {
                let epoch = self.sarprop_epoch;
                update::sarprop_step(self, epoch);
                self.sarprop_epoch += 1;
            }
            TrainingAlgorithm::Incremental => unreachable!("handled above"),
        }

        Ok(self.get_mse())
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
    fn parallel_epoch_matches_sequential_epoch_for_batch() {
        let mut seq = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        seq.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        seq.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        seq.training_algorithm = TrainingAlgorithm::Batch;
        let mut par = seq.clone();

        let data = xor_data();
        let seq_mse = seq.train_epoch(&data).unwrap();
        let par_mse = par.train_epoch_parallel(&data, Some(2)).unwrap();

        assert!((seq_mse - par_mse).abs() < 1e-9, "{seq_mse} vs {par_mse}");
        for (a, b) in seq.get_weights().iter().zip(par.get_weights().iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn parallel_epoch_reduces_mse_on_xor_with_rprop() {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net.training_algorithm = TrainingAlgorithm::RProp;
        let data = xor_data();

        let initial = net.train_epoch_parallel(&data, Some(4)).unwrap();
        for _ in 0..300 {
            net.train_epoch_parallel(&data, Some(4)).unwrap();
        }
        let later = net.train_epoch_parallel(&data, Some(4)).unwrap();
        assert!(later < initial, "expected MSE to decrease: {initial} -> {later}");
    }
}
