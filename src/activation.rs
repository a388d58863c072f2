//! The sixteen activation functions shared by every neuron, plus their
//! derivatives for backpropagation.
//!
//! Formulas and clipping constants are taken directly from the reference
//! implementation's `fann_activation.h` / `fann_train.c` so that stepwise and
//! smooth sigmoids agree at their breakpoints and saturated neurons do not
//! stall training with a zero derivative.

use crate::scalar::Scalar;

/// Tag identifying one of the sixteen supported nonlinearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationFunc {
    Linear,
    LinearPiece,
    LinearPieceSymmetric,
    Threshold,
    ThresholdSymmetric,
    Sigmoid,
    SigmoidStepwise,
    SigmoidSymmetric,
    SigmoidSymmetricStepwise,
    Gaussian,
    GaussianSymmetric,
    Elliot,
    ElliotSymmetric,
    Sin,
    Cos,
    SinSymmetric,
    CosSymmetric,
}

impl ActivationFunc {
    /// All sixteen tags, in declaration order. Used as the default cascade
    /// candidate activation-function pool.
    pub const ALL: [ActivationFunc; 17] = [
        ActivationFunc::Linear,
        ActivationFunc::LinearPiece,
        ActivationFunc::LinearPieceSymmetric,
        ActivationFunc::Threshold,
        ActivationFunc::ThresholdSymmetric,
        ActivationFunc::Sigmoid,
        ActivationFunc::SigmoidStepwise,
        ActivationFunc::SigmoidSymmetric,
        ActivationFunc::SigmoidSymmetricStepwise,
        ActivationFunc::Gaussian,
        ActivationFunc::GaussianSymmetric,
        ActivationFunc::Elliot,
        ActivationFunc::ElliotSymmetric,
        ActivationFunc::Sin,
        ActivationFunc::Cos,
        ActivationFunc::SinSymmetric,
        ActivationFunc::CosSymmetric,
    ];

    /// The ten non-threshold tags used to seed the default cascade candidate
    /// pool (threshold functions cannot be trained, so they are excluded).
    pub const CASCADE_DEFAULT: [ActivationFunc; 10] = [
        ActivationFunc::Sigmoid,
        ActivationFunc::SigmoidSymmetric,
        ActivationFunc::Gaussian,
        ActivationFunc::GaussianSymmetric,
        ActivationFunc::Elliot,
        ActivationFunc::ElliotSymmetric,
        ActivationFunc::Sin,
        ActivationFunc::Cos,
        ActivationFunc::SinSymmetric,
        ActivationFunc::CosSymmetric,
    ];

    /// True if this activation is symmetric about the origin, i.e. its range
    /// is `(-1, 1)` rather than `(0, 1)`. Symmetric MSE diffs are halved so a
    /// single `bit_fail_limit` applies to both families (§4.4).
    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            ActivationFunc::LinearPieceSymmetric
                | ActivationFunc::ThresholdSymmetric
                | ActivationFunc::SigmoidSymmetric
                | ActivationFunc::SigmoidSymmetricStepwise
                | ActivationFunc::GaussianSymmetric
                | ActivationFunc::ElliotSymmetric
                | ActivationFunc::SinSymmetric
                | ActivationFunc::CosSymmetric
        )
    }

    /// False for `Threshold`/`ThresholdSymmetric`, whose derivative does not
    /// exist; training must reject these with `CantTrainActivation`.
    pub fn is_trainable(self) -> bool {
        !matches!(self, ActivationFunc::Threshold | ActivationFunc::ThresholdSymmetric)
    }
}

#[inline]
fn clip<T: Scalar>(x: T, lo: T, hi: T) -> T {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Six-breakpoint piecewise-linear interpolation shared by the two stepwise
/// sigmoids, reproduced from `fann_stepwise` so it matches the smooth
/// sigmoid exactly at each breakpoint.
#[allow(clippy::too_many_arguments)]
#[inline]
fn stepwise<T: Scalar>(
    v: [T; 6],
    r: [T; 6],
    min: T,
    max: T,
    sum: T,
) -> T {
    let lerp = |x0: T, y0: T, x1: T, y1: T, x: T| y0 + (y1 - y0) * (x - x0) / (x1 - x0);
    if sum < v[4] {
        if sum < v[2] {
            if sum < v[1] {
                if sum < v[0] {
                    min
                } else {
                    lerp(v[0], r[0], v[1], r[1], sum)
                }
            } else {
                lerp(v[1], r[1], v[2], r[2], sum)
            }
        } else if sum < v[3] {
            lerp(v[2], r[2], v[3], r[3], sum)
        } else {
            lerp(v[3], r[3], v[4], r[4], sum)
        }
    } else if sum < v[5] {
        lerp(v[4], r[4], v[5], r[5], sum)
    } else {
        max
    }
}

fn sigmoid_breakpoints<T: Scalar>() -> [T; 6] {
    [
        T::from(-2.64665293693542480469e+00).unwrap(),
        T::from(-1.47221934795379638672e+00).unwrap(),
        T::from(-5.49306154251098632812e-01).unwrap(),
        T::from(5.49306154251098632812e-01).unwrap(),
        T::from(1.47221934795379638672e+00).unwrap(),
        T::from(2.64665293693542480469e+00).unwrap(),
    ]
}

/// Evaluate `activation(steepness * sum)`. `sum` is the neuron's raw weighted
/// sum, already saturated to `+-150/steepness` by the forward pass.
pub fn activate<T: Scalar>(func: ActivationFunc, steepness: T, sum: T) -> T {
    let x = steepness * sum;
    let one = T::one();
    let two = one + one;
    let half = one / two;
    match func {
        ActivationFunc::Linear => x,
        ActivationFunc::LinearPiece => clip(x, T::zero(), one),
        ActivationFunc::LinearPieceSymmetric => clip(x, -one, one),
        ActivationFunc::Threshold => {
            if x > T::zero() {
                one
            } else {
                T::zero()
            }
        }
        ActivationFunc::ThresholdSymmetric => {
            if x > T::zero() {
                one
            } else {
                -one
            }
        }
        ActivationFunc::Sigmoid => one / (one + (-two * x).exp()),
        ActivationFunc::SigmoidSymmetric => two / (one + (-two * x).exp()) - one,
        ActivationFunc::SigmoidStepwise => {
            let v = sigmoid_breakpoints();
            let r = [
                T::from(4.99999988824129104614e-03).unwrap(),
                T::from(5.00000007450580596924e-02).unwrap(),
                T::from(2.50000000000000000000e-01).unwrap(),
                T::from(7.50000000000000000000e-01).unwrap(),
                T::from(9.49999988079071044922e-01).unwrap(),
                T::from(9.95000004768371582031e-01).unwrap(),
            ];
            stepwise(v, r, T::zero(), one, x)
        }
        ActivationFunc::SigmoidSymmetricStepwise => {
            let v = sigmoid_breakpoints();
            let r = [
                T::from(-9.90000009536743164062e-01).unwrap(),
                T::from(-8.99999976158142089844e-01).unwrap(),
                T::from(-5.00000000000000000000e-01).unwrap(),
                T::from(5.00000000000000000000e-01).unwrap(),
                T::from(8.99999976158142089844e-01).unwrap(),
                T::from(9.90000009536743164062e-01).unwrap(),
            ];
            stepwise(v, r, -one, one, x)
        }
        ActivationFunc::Gaussian => (-x * x).exp(),
        ActivationFunc::GaussianSymmetric => two * (-x * x).exp() - one,
        ActivationFunc::Elliot => (x / two) / (one + x.abs()) + half,
        ActivationFunc::ElliotSymmetric => x / (one + x.abs()),
        ActivationFunc::Sin => x.sin() / two + half,
        ActivationFunc::Cos => x.cos() / two + half,
        ActivationFunc::SinSymmetric => x.sin(),
        ActivationFunc::CosSymmetric => x.cos(),
    }
}

/// Derivative of `activate` with respect to the pre-steepness sum, taking
/// the already-computed post-activation `value` (clipped per §4.1 to avoid
/// the zero-gradient saturation pathology) and raw `sum`.
pub fn derivative<T: Scalar>(
    func: ActivationFunc,
    steepness: T,
    value: T,
    sum: T,
) -> T {
    let one = T::one();
    let two = one + one;
    match func {
        ActivationFunc::Linear | ActivationFunc::LinearPiece | ActivationFunc::LinearPieceSymmetric => {
            steepness
        }
        ActivationFunc::Sigmoid | ActivationFunc::SigmoidStepwise => {
            let v = clip(value, T::from(0.01).unwrap(), T::from(0.99).unwrap());
            two * steepness * v * (one - v)
        }
        ActivationFunc::SigmoidSymmetric | ActivationFunc::SigmoidSymmetricStepwise => {
            let v = clip(value, T::from(-0.98).unwrap(), T::from(0.98).unwrap());
            steepness * (one - v * v)
        }
        ActivationFunc::Gaussian => -two * sum * value * steepness * steepness,
        ActivationFunc::GaussianSymmetric => -two * sum * (value + one) * steepness * steepness,
        ActivationFunc::Elliot => {
            let s = sum.abs();
            steepness * one / (two * (one + s) * (one + s))
        }
        ActivationFunc::ElliotSymmetric => {
            let s = sum.abs();
            steepness * one / ((one + s) * (one + s))
        }
        ActivationFunc::SinSymmetric => steepness * (steepness * sum).cos(),
        ActivationFunc::CosSymmetric => -steepness * (steepness * sum).sin(),
        ActivationFunc::Sin => steepness * (steepness * sum).cos() / two,
        ActivationFunc::Cos => -steepness * (steepness * sum).sin() / two,
        ActivationFunc::Threshold | ActivationFunc::ThresholdSymmetric => {
            // Callers must reject training before reaching here; §4.1.
            T::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_matches_reference_formula() {
        let s: f64 = activate(ActivationFunc::Sigmoid, 1.0, 0.5);
        assert_relative_eq!(s, 1.0 / (1.0 + (-1.0_f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn sigmoid_symmetric_is_tanh() {
        let s: f64 = activate(ActivationFunc::SigmoidSymmetric, 1.0, 0.5);
        assert_relative_eq!(s, (0.5_f64).tanh(), epsilon = 1e-12);
    }

    #[test]
    fn stepwise_sigmoid_agrees_at_breakpoints() {
        let v = sigmoid_breakpoints::<f64>();
        for &bp in &v {
            let smooth = activate(ActivationFunc::SigmoidSymmetric, 1.0, bp);
            let step = activate(ActivationFunc::SigmoidSymmetricStepwise, 1.0, bp);
            assert_relative_eq!(smooth, step, epsilon = 2e-3);
        }
    }

    #[test]
    fn threshold_has_no_derivative_but_does_not_panic() {
        assert!(!ActivationFunc::Threshold.is_trainable());
        assert_eq!(derivative(ActivationFunc::Threshold, 1.0_f64, 0.0, 0.0), 0.0);
    }

    #[test]
    fn gaussian_symmetric_range() {
        let v: f64 = activate(ActivationFunc::GaussianSymmetric, 1.0, 0.0);
        assert_relative_eq!(v, 1.0, epsilon = 1e-12);
    }
}
