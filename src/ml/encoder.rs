// ============================================================
// Layer 5 — Encoder
// ============================================================
//   ids [b, T] ─► embedding [b, T, E] ─► dense (no bias) [b, T, H]
//
// Unidirectional:
//   ─► encoder_depth-layer stack ─► outputs [b, T, H]
//
// Bidirectional:
//   ─► forward cell  ─┐
//   ─► backward cell ─┴► concat [b, T, 2H] ─► dense (no bias) [b, T, H]
//   ─► upper stack of (encoder_depth − 1) layers (if any)
//
//   final states = forward-cell state, then the upper stack's
//   states, so there is always one state per encoder layer.

use burn::{
    nn::{Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
};

use crate::ml::cell::{run_sequence, CellType, RnnState, StackSpec, StackedCell};

/// Uniform(−√3, √3) has unit variance.
pub fn embedding_initializer() -> Initializer {
    let bound = 3.0f64.sqrt();
    Initializer::Uniform { min: -bound, max: bound }
}

#[derive(Debug, Clone, Copy)]
pub struct EncoderSpec {
    pub vocab_size: usize,
    pub embedding_size: usize,
    pub hidden_units: usize,
    pub depth: usize,
    pub cell_type: CellType,
    pub bidirectional: bool,
    pub residual: bool,
    pub dropout: f64,
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub embedding: Embedding<B>,
    input_projection: Linear<B>,
    forward_cell: Option<StackedCell<B>>,
    backward_cell: Option<StackedCell<B>>,
    bi_projection: Option<Linear<B>>,
    stack: Option<StackedCell<B>>,
}

pub struct EncoderOutput<B: Backend> {
    /// [batch, time, hidden]
    pub outputs: Tensor<B, 3>,
    /// One state per encoder layer, bottom first.
    pub final_states: Vec<RnnState<B>>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(spec: EncoderSpec, device: &B::Device) -> Self {
        let embedding = EmbeddingConfig::new(spec.vocab_size, spec.embedding_size)
            .with_initializer(embedding_initializer())
            .init(device);
        let input_projection = LinearConfig::new(spec.embedding_size, spec.hidden_units)
            .with_bias(false)
            .init(device);

        let stack_spec = |depth: usize, d_input: usize| StackSpec {
            d_input,
            d_hidden: spec.hidden_units,
            depth,
            cell_type: spec.cell_type,
            dropout: spec.dropout,
            residual: spec.residual,
        };

        if spec.bidirectional {
            let upper = spec.depth.saturating_sub(1);
            Self {
                embedding,
                input_projection,
                forward_cell: Some(StackedCell::new(stack_spec(1, spec.hidden_units), device)),
                backward_cell: Some(StackedCell::new(stack_spec(1, spec.hidden_units), device)),
                bi_projection: Some(
                    LinearConfig::new(2 * spec.hidden_units, spec.hidden_units)
                        .with_bias(false)
                        .init(device),
                ),
                stack: (upper > 0).then(|| StackedCell::new(stack_spec(upper, spec.hidden_units), device)),
            }
        } else {
            Self {
                embedding,
                input_projection,
                forward_cell: None,
                backward_cell: None,
                bi_projection: None,
                stack: Some(StackedCell::new(stack_spec(spec.depth, spec.hidden_units), device)),
            }
        }
    }

    /// inputs: [batch, time] ids, mask: [batch, time]
    pub fn forward(&self, inputs: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> EncoderOutput<B> {
        let [batch, _] = inputs.dims();
        let device = inputs.device();

        let embedded = self.embedding.forward(inputs);
        let projected = self.input_projection.forward(embedded);

        match (&self.forward_cell, &self.backward_cell, &self.bi_projection) {
            (Some(fw), Some(bw), Some(proj)) => {
                let (fw_out, fw_states) =
                    run_sequence(fw, projected.clone(), mask.clone(), fw.zero_states(batch, &device), false);
                let (bw_out, _) =
                    run_sequence(bw, projected, mask.clone(), bw.zero_states(batch, &device), true);

                let merged = proj.forward(Tensor::cat(vec![fw_out, bw_out], 2));

                let mut final_states = fw_states;
                match &self.stack {
                    Some(upper) => {
                        let (outputs, upper_states) =
                            run_sequence(upper, merged, mask, upper.zero_states(batch, &device), false);
                        final_states.extend(upper_states);
                        EncoderOutput { outputs, final_states }
                    }
                    None => EncoderOutput { outputs: merged, final_states },
                }
            }
            _ => match &self.stack {
                Some(stack) => {
                    let (outputs, final_states) =
                        run_sequence(stack, projected, mask, stack.zero_states(batch, &device), false);
                    EncoderOutput { outputs, final_states }
                }
                None => EncoderOutput { outputs: projected, final_states: Vec::new() },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn spec(bidirectional: bool, depth: usize) -> EncoderSpec {
        EncoderSpec {
            vocab_size: 20,
            embedding_size: 6,
            hidden_units: 8,
            depth,
            cell_type: CellType::Gru,
            bidirectional,
            residual: false,
            dropout: 0.0,
        }
    }

    fn inputs(device: &<TestBackend as Backend>::Device) -> (Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 2>) {
        let ids = Tensor::from_data(TensorData::new(vec![4i64, 5, 6, 7, 8, 0], [2, 3]), device);
        let mask = Tensor::from_data(TensorData::new(vec![1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0], [2, 3]), device);
        (ids, mask)
    }

    #[test]
    fn test_unidirectional_shapes() {
        let device = Default::default();
        let enc = Encoder::<TestBackend>::new(spec(false, 3), &device);
        let (ids, mask) = inputs(&device);
        let out = enc.forward(ids, mask);
        assert_eq!(out.outputs.dims(), [2, 3, 8]);
        assert_eq!(out.final_states.len(), 3);
    }

    #[test]
    fn test_bidirectional_has_one_state_per_layer() {
        let device = Default::default();
        for depth in 1..=3 {
            let enc = Encoder::<TestBackend>::new(spec(true, depth), &device);
            let (ids, mask) = inputs(&device);
            let out = enc.forward(ids, mask);
            assert_eq!(out.outputs.dims(), [2, 3, 8]);
            assert_eq!(out.final_states.len(), depth);
        }
    }
}
