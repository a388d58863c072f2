//! Aggregate bound for the network's scalar type parameter.
//!
//! `Network<T>` and friends need more than `num_traits::Float` once training,
//! formatting, and weight randomization are taken into account; this trait
//! bundles those requirements in one place so every `impl`/`fn` signature
//! states the same bound. Blanket-implemented for any `T` that already
//! satisfies the individual bounds (in practice just `f32`/`f64`).
use num_traits::Float;

pub trait Scalar:
    Float
    + Default
    + std::fmt::Debug
    + std::ops::MulAssign
    + rand::distributions::uniform::SampleUniform
    + Send
    + Sync
{
}

impl<T> Scalar for T where
    T: Float
        + Default
        + std::fmt::Debug
        + std::ops::MulAssign
        + rand::distributions::uniform::SampleUniform
        + Send
        + Sync
{
}
