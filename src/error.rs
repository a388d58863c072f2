//! Error taxonomy for network and dataset operations.
//!
//! Every fallible public operation returns a `Result` carrying one of these
//! variants, and networks additionally mirror the most recent error into an
//! object-local slot (`Network::last_error`) for parity with the diagnostic
//! workflow of C-style FANN bindings, where the error lives on the object
//! rather than only in the return channel.

use thiserror::Error;

/// Errors produced by network construction, inspection, and training.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Fewer than two layers were requested.
    #[error("a network needs at least 2 layers, got {0}")]
    TooFewLayers(usize),

    /// A layer in the topology vector has zero neurons.
    #[error("layer {index} has zero neurons")]
    EmptyLayer { index: usize },

    /// `connection_rate` was outside `(0, 1]`.
    #[error("connection rate {0} is outside (0, 1]")]
    InvalidConnectionRate(f64),

    /// Training was attempted with an activation function that has no
    /// derivative (`Threshold`, `ThresholdSymmetric`).
    #[error("activation function {0:?} cannot be used for training")]
    CantTrainActivation(crate::activation::ActivationFunc),

    /// A batch/incremental algorithm was requested during cascade training,
    /// where only iRPROP-, Quickprop, and SARPROP are supported.
    #[error("training algorithm {0:?} is not usable for cascade training")]
    UnsupportedCascadeAlgorithm(crate::training::TrainingAlgorithm),

    /// Cascade training was attempted on a network that was not built with
    /// `create_shortcut`.
    #[error("cascade training requires a shortcut-topology network")]
    CascadeRequiresShortcut,

    /// Dataset input/output width does not match the network's.
    #[error("data has {data_inputs} inputs / {data_outputs} outputs, network expects {net_inputs} / {net_outputs}")]
    DimensionMismatch {
        net_inputs: usize,
        net_outputs: usize,
        data_inputs: usize,
        data_outputs: usize,
    },

    /// A layer or neuron index was out of range.
    #[error("index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// An operation that requires scaling parameters was called before
    /// `set_scaling_params`.
    #[error("scaling parameters have not been set on this network")]
    ScalingParamsMissing,

    /// The weight array passed to `set_weights`/`set_weight_array` had the
    /// wrong length.
    #[error("expected {expected} weights, got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },

    /// I/O failure while reading or writing a network or dataset.
    #[error("I/O error during {operation}: {message}")]
    Io { operation: String, message: String },
}

/// Errors produced by `TrainingData` construction and manipulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("dataset is empty")]
    Empty,

    #[error("subset range {pos}..{}  is out of bounds for a dataset of length {len}", pos + len)]
    SubsetOutOfRange { pos: usize, len: usize },

    #[error("row {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot merge datasets with differing shapes: {0} inputs/outputs vs {1}")]
    ShapeMismatch(String, String),

    #[error("I/O error during {operation}: {message}")]
    Io { operation: String, message: String },
}

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type DataResult<T> = Result<T, DataError>;
