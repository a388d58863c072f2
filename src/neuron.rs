//! A single neuron record in the flat arena (§3, §9).
//!
//! Neurons never own a graph of pointers to each other; `first_con`/`last_con`
//! are a half-open range into the network's weight (and, for sparse/shortcut
//! topologies, connection-source) arrays. A bias neuron has
//! `first_con == last_con` and a `value` pinned at one — but so does every
//! never-wired input neuron in layer 0, so bias-ness is tracked by its own
//! flag rather than inferred from the connection range.

use crate::scalar::Scalar;

use crate::activation::ActivationFunc;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neuron<T: Scalar> {
    /// First index (inclusive) into the weight / connection-source arrays.
    pub first_con: usize,
    /// Last index (exclusive).
    pub last_con: usize,
    /// Most recent pre-activation sum (post steepness-multiply and
    /// saturation, see §4.3 step 3).
    pub sum: T,
    /// Most recent post-activation output.
    pub value: T,
    pub activation_steepness: T,
    pub activation_function: ActivationFunc,
    is_bias: bool,
}

impl<T: Scalar> Neuron<T> {
    pub fn bias(con: usize) -> Self {
        Neuron {
            first_con: con,
            last_con: con,
            sum: T::zero(),
            value: T::one(),
            activation_steepness: T::one(),
            activation_function: ActivationFunc::Linear,
            is_bias: true,
        }
    }

    /// A never-wired placeholder, used for input neurons before wiring
    /// (`first_con`/`last_con` patched afterward). Not a bias: `is_bias()`
    /// returns `false`.
    pub fn unwired() -> Self {
        Neuron {
            first_con: 0,
            last_con: 0,
            sum: T::zero(),
            value: T::zero(),
            activation_steepness: T::one(),
            activation_function: ActivationFunc::SigmoidSymmetric,
            is_bias: false,
        }
    }

    /// A freshly-spliced, not-yet-wired ordinary neuron (e.g. a cascade
    /// candidate installed as a new hidden neuron). Not a bias.
    pub fn with_activation(activation_function: ActivationFunc, activation_steepness: T) -> Self {
        Neuron {
            first_con: 0,
            last_con: 0,
            sum: T::zero(),
            value: T::zero(),
            activation_steepness,
            activation_function,
            is_bias: false,
        }
    }

    #[inline]
    pub fn num_connections(&self) -> usize {
        self.last_con - self.first_con
    }

    #[inline]
    pub fn is_bias(&self) -> bool {
        self.is_bias
    }
}
