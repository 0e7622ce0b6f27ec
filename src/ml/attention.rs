// ============================================================
// Layer 5 — Attention
// ============================================================
// Scores every encoder position against the current decoder
// state and returns the attention distribution and the
// context vector (attention-weighted sum of encoder outputs).
//
// Bahdanau (additive), with coverage (See et al. eq. 11):
//   e_i = vᵀ tanh(W_h h_i + W_s s + w_c c_i + b)
//
// Luong (multiplicative, "general"):
//   e_i = sᵀ W_a h_i  (+ w_c c_i when coverage is on)
//
// W_h h_i (Bahdanau) and W_a h_i (Luong) do not depend on the
// decoder step, so they are computed once per batch into
// AttentionMemory.keys.
//
// Padded encoder positions are filled with a large negative
// score before the softmax, so they receive zero weight.
//
// Reference: Bahdanau et al. (2015), Luong et al. (2015),
//            See et al. (2017) §2.3

use std::str::FromStr;

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

const MASKED_SCORE: f32 = -1.0e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionType {
    Bahdanau,
    Luong,
}

impl FromStr for AttentionType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bahdanau" => Ok(Self::Bahdanau),
            "luong" => Ok(Self::Luong),
            other => Err(DataError::InvalidConfig(format!(
                "unknown attention type '{other}' (expected bahdanau or luong)"
            ))),
        }
    }
}

/// Per-batch encoder side of attention.
#[derive(Debug, Clone)]
pub struct AttentionMemory<B: Backend> {
    /// Projected encoder outputs: [batch, time, units]
    pub keys: Tensor<B, 3>,
    /// Raw encoder outputs: [batch, time, hidden]
    pub values: Tensor<B, 3>,
    /// 1 = real token: [batch, time]
    pub mask: Tensor<B, 2>,
}

impl<B: Backend> AttentionMemory<B> {
    pub fn time_steps(&self) -> usize {
        self.mask.dims()[1]
    }
}

#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    memory_layer: Linear<B>,
    /// Bahdanau only: W_s with the attention bias.
    query_layer: Option<Linear<B>>,
    /// Bahdanau only: v.
    score_layer: Option<Linear<B>>,
    /// Present when coverage is on.
    coverage_layer: Option<Linear<B>>,
}

impl<B: Backend> Attention<B> {
    pub fn new(
        attention_type: AttentionType,
        hidden_units: usize,
        attention_units: usize,
        coverage: bool,
        device: &B::Device,
    ) -> Self {
        match attention_type {
            AttentionType::Bahdanau => Self {
                memory_layer: LinearConfig::new(hidden_units, attention_units)
                    .with_bias(false)
                    .init(device),
                query_layer: Some(LinearConfig::new(hidden_units, attention_units).init(device)),
                score_layer: Some(
                    LinearConfig::new(attention_units, 1).with_bias(false).init(device),
                ),
                coverage_layer: coverage.then(|| {
                    LinearConfig::new(1, attention_units).with_bias(false).init(device)
                }),
            },
            AttentionType::Luong => Self {
                memory_layer: LinearConfig::new(hidden_units, hidden_units)
                    .with_bias(false)
                    .init(device),
                query_layer: None,
                score_layer: None,
                coverage_layer: coverage
                    .then(|| LinearConfig::new(1, 1).with_bias(false).init(device)),
            },
        }
    }

    pub fn uses_coverage(&self) -> bool {
        self.coverage_layer.is_some()
    }

    /// encoder_outputs: [batch, time, hidden], mask: [batch, time]
    pub fn memory(&self, encoder_outputs: Tensor<B, 3>, mask: Tensor<B, 2>) -> AttentionMemory<B> {
        AttentionMemory {
            keys: self.memory_layer.forward(encoder_outputs.clone()),
            values: encoder_outputs,
            mask,
        }
    }

    /// query: [batch, hidden], coverage: [batch, time]
    /// Returns (context [batch, hidden], attention [batch, time]).
    pub fn attend(
        &self,
        query: Tensor<B, 2>,
        coverage: Option<Tensor<B, 2>>,
        memory: &AttentionMemory<B>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, time, _] = memory.keys.dims();

        let scores = match (&self.query_layer, &self.score_layer) {
            (Some(query_layer), Some(score_layer)) => {
                let q = query_layer.forward(query).unsqueeze_dim::<3>(1);
                let mut features = memory.keys.clone() + q;
                if let (Some(layer), Some(cov)) = (&self.coverage_layer, coverage) {
                    features = features + layer.forward(cov.unsqueeze_dim::<3>(2));
                }
                score_layer.forward(features.tanh()).reshape([batch, time])
            }
            _ => {
                let mut scores = memory
                    .keys
                    .clone()
                    .matmul(query.unsqueeze_dim::<3>(2))
                    .reshape([batch, time]);
                if let (Some(layer), Some(cov)) = (&self.coverage_layer, coverage) {
                    scores = scores + layer.forward(cov.unsqueeze_dim::<3>(2)).reshape([batch, time]);
                }
                scores
            }
        };

        let padding = memory.mask.clone().lower_elem(0.5);
        let attention = softmax(scores.mask_fill(padding, MASKED_SCORE), 1);

        let hidden = memory.values.dims()[2];
        let context = attention
            .clone()
            .unsqueeze_dim::<3>(1)
            .matmul(memory.values.clone())
            .reshape([batch, hidden]);

        (context, attention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn memory(attn: &Attention<TestBackend>, device: &<TestBackend as Backend>::Device) -> AttentionMemory<TestBackend> {
        let outputs = Tensor::<TestBackend, 3>::random([2, 4, 6], Distribution::Default, device);
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0], [2, 4]),
            device,
        );
        attn.memory(outputs, mask)
    }

    fn check_distribution(attention: Tensor<TestBackend, 2>) {
        let values: Vec<f32> = attention.into_data().iter::<f32>().collect();
        let row0: f32 = values[0..4].iter().sum();
        let row1: f32 = values[4..8].iter().sum();
        approx::assert_abs_diff_eq!(row0, 1.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(row1, 1.0, epsilon = 1e-5);
        // padded positions
        assert!(values[3] < 1e-6);
        assert!(values[6] < 1e-6 && values[7] < 1e-6);
    }

    #[test]
    fn test_bahdanau_with_coverage() {
        let device = Default::default();
        let attn = Attention::<TestBackend>::new(AttentionType::Bahdanau, 6, 5, true, &device);
        let mem = memory(&attn, &device);
        let query = Tensor::random([2, 6], Distribution::Default, &device);
        let coverage = Tensor::random([2, 4], Distribution::Default, &device);

        let (context, attention) = attn.attend(query, Some(coverage), &mem);
        assert_eq!(context.dims(), [2, 6]);
        check_distribution(attention);
    }

    #[test]
    fn test_luong_without_coverage() {
        let device = Default::default();
        let attn = Attention::<TestBackend>::new(AttentionType::Luong, 6, 5, false, &device);
        assert!(!attn.uses_coverage());
        let mem = memory(&attn, &device);
        let query = Tensor::random([2, 6], Distribution::Default, &device);

        let (context, attention) = attn.attend(query, None, &mem);
        assert_eq!(context.dims(), [2, 6]);
        check_distribution(attention);
    }

    #[test]
    fn test_attention_type_parsing() {
        assert_eq!("Luong".parse::<AttentionType>().unwrap(), AttentionType::Luong);
        assert!("dot".parse::<AttentionType>().is_err());
    }
}
