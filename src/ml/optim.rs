// ============================================================
// Layer 5 — Optimizer Selection
// ============================================================
// Maps --optimizer_type onto a Burn optimizer config. Every
// optimizer clips gradients by L2 norm (max_gradient_norm);
// Burn clips each parameter tensor separately.
//
//   adam    — Kingma & Ba (2015), ε = 1e-8
//   rmsprop — Tieleman & Hinton (2012)
//   adagrad — Duchi et al. (2011)
//
// Burn has no Adadelta, so it is rejected up front rather than
// silently replaced.

use std::{fmt, str::FromStr};

use burn::optim::{
    AdaGradConfig, AdamConfig, RmsPropConfig,
};
use burn::grad_clipping::GradientClippingConfig;
use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    RmsProp,
    AdaGrad,
}

impl FromStr for OptimizerKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "rmsprop" => Ok(Self::RmsProp),
            "adagrad" => Ok(Self::AdaGrad),
            "adadelta" => Err(DataError::InvalidConfig(
                "adadelta is not available in Burn; use adam, rmsprop or adagrad".into(),
            )),
            other => Err(DataError::InvalidConfig(format!(
                "unknown optimizer '{other}' (expected adam, rmsprop or adagrad)"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Adam => "adam",
            Self::RmsProp => "rmsprop",
            Self::AdaGrad => "adagrad",
        };
        f.write_str(name)
    }
}

/// L2-norm clipping at `max_norm`, or None when max_norm ≤ 0.
///
/// Burn applies this to each parameter tensor on its own, so a step
/// can move the whole model by more than `max_norm` in total; there
/// is no clipping by the global norm across all parameters.
pub fn gradient_clipping(max_norm: f64) -> Option<GradientClippingConfig> {
    (max_norm > 0.0).then(|| GradientClippingConfig::Norm(max_norm as f32))
}

pub fn adam(max_norm: f64) -> AdamConfig {
    AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(gradient_clipping(max_norm))
}

pub fn rmsprop(max_norm: f64) -> RmsPropConfig {
    RmsPropConfig::new().with_grad_clipping(gradient_clipping(max_norm))
}

pub fn adagrad(max_norm: f64) -> AdaGradConfig {
    AdaGradConfig::new().with_grad_clipping(gradient_clipping(max_norm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("ADAM".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("RMSProp".parse::<OptimizerKind>().unwrap(), OptimizerKind::RmsProp);
        assert_eq!("adagrad".parse::<OptimizerKind>().unwrap(), OptimizerKind::AdaGrad);
    }

    #[test]
    fn test_adadelta_is_rejected_with_hint() {
        let err = "adadelta".parse::<OptimizerKind>().unwrap_err().to_string();
        assert!(err.contains("adadelta"));
        assert!(err.contains("adam"));
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [OptimizerKind::Adam, OptimizerKind::RmsProp, OptimizerKind::AdaGrad] {
            assert_eq!(kind.to_string().parse::<OptimizerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_non_positive_norm_disables_clipping() {
        assert!(gradient_clipping(0.0).is_none());
        assert!(matches!(gradient_clipping(1.0), Some(GradientClippingConfig::Norm(n)) if n == 1.0));
    }

    #[test]
    fn test_clipping_bounds_each_tensor_separately() {
        use burn::backend::NdArray;
        use burn::tensor::Tensor;

        let device = Default::default();
        let clipping = gradient_clipping(1.0).unwrap().init();
        let norm = |t: Tensor<NdArray, 1>| t.powf_scalar(2.0).sum().sqrt().into_scalar();

        // both have norm 2; the pair together has norm 2√2
        let a = Tensor::<NdArray, 1>::from_floats([2.0, 0.0], &device);
        let b = Tensor::<NdArray, 1>::from_floats([0.0, -2.0], &device);
        let (a, b) = (clipping.clip_gradient(a), clipping.clip_gradient(b));

        approx::assert_abs_diff_eq!(norm(a), 1.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(norm(b), 1.0, epsilon = 1e-4);
    }
}
