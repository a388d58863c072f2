//! A feed-forward neural network library with Cascade-Correlation topology
//! growth, generic over `f32`/`f64` via `num_traits::Float`.
//!
//! Networks are built with one of three topology constructors
//! ([`Network::create_standard`], [`Network::create_sparse`],
//! [`Network::create_shortcut`]), trained with one of five weight-update
//! rules ([`TrainingAlgorithm`]), and, for shortcut-wired networks, grown
//! neuron-by-neuron with [`Network::cascadetrain_on_data`].
//!
//! ```
//! use cascade_net::{ActivationFunc, Network, TrainingAlgorithm, TrainingData};
//!
//! let mut net = Network::<f64>::create_standard(&[2, 3, 1]).unwrap();
//! net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
//! net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
//! net.training_algorithm = TrainingAlgorithm::RProp;
//!
//! let data = TrainingData::create_train(
//!     vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
//!     vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
//! ).unwrap();
//!
//! for _ in 0..500 {
//!     net.train_epoch(&data).unwrap();
//! }
//! ```

pub mod activation;
pub mod cascade;
pub mod dataset;
pub mod error;
pub mod layer;
pub mod network;
pub mod neuron;
pub mod scalar;
pub mod training;

#[cfg(feature = "io")]
pub mod io;

pub use activation::ActivationFunc;
pub use cascade::CascadeParams;
pub use dataset::TrainingData;
pub use error::{DataError, DataResult, NetworkError, NetworkResult};
pub use layer::Layer;
pub use network::{Network, NetworkType, ScaleParams};
pub use neuron::Neuron;
pub use training::{CallbackControl, EpochReport, ErrorFunc, StopFunc, TrainingAlgorithm};
