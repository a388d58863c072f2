//! Persisting a [`Network`] to and from disk (§8).
//!
//! This is a from-scratch binary/JSON format built on `serde`, not the
//! legacy FANN text grammar (`fann_save`'s `num_layers ann_type ...` header
//! lines) — there is no requirement to interoperate with existing `.net`
//! files, so a plain `serde`-derived snapshot is the idiomatic choice,
//! mirroring how `dakatk-OpenPB`'s `file_io::save_output` serializes trained
//! network state through `serde_json` rather than a hand-rolled grammar.
//!
//! Only the state needed to reconstruct a working network is saved: the
//! arena (layers/neurons/weights/connections), topology metadata, every
//! training hyperparameter, the optional input/output scaling, and cascade
//! growth parameters. Transient fields — the scratch training buffers, the
//! running MSE accumulators, and the last recorded error — are never
//! persisted; they are either per-session bookkeeping or are cheaply
//! re-derived the next time the network trains or runs. The snapshot type
//! itself lives here but is assembled/consumed by `Network::to_snapshot` /
//! `Network::from_snapshot` in `network.rs`, the only place with access to
//! the private fields it copies.

use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::cascade::CascadeParams;
use crate::error::{NetworkError, NetworkResult};
use crate::layer::Layer;
use crate::network::{Network, NetworkType, ScaleParams};
use crate::neuron::Neuron;
use crate::training::{ErrorFunc, StopFunc, TrainingAlgorithm};

#[derive(Serialize, Deserialize)]
pub(crate) struct NetworkSnapshot<T: Scalar> {
    pub(crate) layers: Vec<Layer>,
    pub(crate) neurons: Vec<Neuron<T>>,
    pub(crate) weights: Vec<T>,
    pub(crate) connections: Vec<usize>,

    pub(crate) network_type: NetworkType,
    pub(crate) connection_rate: f64,

    pub(crate) learning_rate: T,
    pub(crate) learning_momentum: T,
    pub(crate) training_algorithm: TrainingAlgorithm,
    pub(crate) error_function: ErrorFunc,
    pub(crate) stop_function: StopFunc,
    pub(crate) bit_fail_limit: T,

    pub(crate) rprop_increase_factor: T,
    pub(crate) rprop_decrease_factor: T,
    pub(crate) rprop_delta_min: T,
    pub(crate) rprop_delta_max: T,
    pub(crate) rprop_delta_zero: T,

    pub(crate) quickprop_decay: T,
    pub(crate) quickprop_mu: T,

    pub(crate) sarprop_weight_decay_shift: T,
    pub(crate) sarprop_step_error_threshold_factor: T,
    pub(crate) sarprop_step_error_shift: T,
    pub(crate) sarprop_temperature: T,
    pub(crate) sarprop_epoch: usize,

    pub(crate) input_scale: Option<ScaleParams<T>>,
    pub(crate) output_scale: Option<ScaleParams<T>>,

    pub(crate) cascade_params: CascadeParams<T>,
}

impl<T: Scalar> Network<T> {
    /// Serialize to a compact binary file via `bincode`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NetworkResult<()>
    where
        T: Serialize,
    {
        let file = File::create(path.as_ref()).map_err(|e| NetworkError::Io {
            operation: "create".into(),
            message: e.to_string(),
        })?;
        bincode::serialize_into(BufWriter::new(file), &self.to_snapshot()).map_err(|e| NetworkError::Io {
            operation: "serialize".into(),
            message: e.to_string(),
        })
    }

    /// Load a network previously written by [`Network::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> NetworkResult<Self>
    where
        T: for<'de> Deserialize<'de>,
    {
        let file = File::open(path.as_ref()).map_err(|e| NetworkError::Io {
            operation: "open".into(),
            message: e.to_string(),
        })?;
        let snap: NetworkSnapshot<T> = bincode::deserialize_from(BufReader::new(file)).map_err(|e| NetworkError::Io {
            operation: "deserialize".into(),
            message: e.to_string(),
        })?;
        Ok(Self::from_snapshot(snap))
    }

    /// Serialize to a pretty-printed JSON file, for inspection or
    /// cross-language interop rather than round-trip performance.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> NetworkResult<()>
    where
        T: Serialize,
    {
        let file = File::create(path.as_ref()).map_err(|e| NetworkError::Io {
            operation: "create".into(),
            message: e.to_string(),
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_snapshot()).map_err(|e| NetworkError::Io {
            operation: "serialize".into(),
            message: e.to_string(),
        })
    }

    /// Load a network previously written by [`Network::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> NetworkResult<Self>
    where
        T: for<'de> Deserialize<'de>,
    {
        let file = File::open(path.as_ref()).map_err(|e| NetworkError::Io {
            operation: "open".into(),
            message: e.to_string(),
        })?;
        let snap: NetworkSnapshot<T> = serde_json::from_reader(BufReader::new(file)).map_err(|e| NetworkError::Io {
            operation: "deserialize".into(),
            message: e.to_string(),
        })?;
        Ok(Self::from_snapshot(snap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunc;

    fn trained_net() -> Network<f64> {
        let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
        net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
        net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
        net.randomize_weights(-0.3, 0.3);
        net
    }

    #[test]
    fn bincode_round_trip_preserves_weights_and_topology() {
        let net = trained_net();
        let path = std::env::temp_dir().join("cascade_net_io_round_trip.bin");

        net.save(&path).unwrap();
        let loaded = Network::<f64>::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(net.get_weights(), loaded.get_weights());
        assert_eq!(net.layer_array(), loaded.layer_array());
        assert_eq!(net.network_type, loaded.network_type);
    }

    #[test]
    fn json_round_trip_preserves_output_for_same_input() {
        let mut net = trained_net();
        let path = std::env::temp_dir().join("cascade_net_io_round_trip.json");

        net.save_json(&path).unwrap();
        let mut loaded = Network::<f64>::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let input = vec![0.3, -0.7];
        assert_eq!(net.run(&input).unwrap(), loaded.run(&input).unwrap());
    }
}
