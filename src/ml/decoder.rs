// ============================================================
// Layer 5 — Attention Decoder with Pointer-Generator & Coverage
// ============================================================
// One decoder time step:
//
//   x_t      = embedding(y_{t-1})                       [b, E]
//   input    = dense([x_t ; c_{t-1}])                   [b, H]  (input feeding)
//   s_t      = stack(input, states)                     [b, H]
//   a_t, c_t = attention(s_t, coverage_t)               [b, T], [b, H]
//   o_t      = tanh(W_o [s_t ; c_t])                    [b, H]
//   P_vocab  = softmax(W_v o_t)                         [b, V]
//
// Pointer-generator (See et al. eq. 8–9):
//   p_gen    = σ(w [c_t ; s_t ; x_t])                   [b, 1]
//   P_final  = p_gen · [P_vocab, 0…0]  +  (1 − p_gen) · Σ_{i: src_i = w} a_t,i
//              over V + max_oovs ids; repeated source ids accumulate
//
// Coverage (See et al. eq. 10–12):
//   coverage_{t+1} = coverage_t + a_t          (coverage_0 = 0)
//   covloss_t      = Σ_i min(a_t,i , coverage_t,i)

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, softmax},
};

use crate::ml::attention::{Attention, AttentionMemory, AttentionType};
use crate::ml::cell::{CellType, RnnState, StackSpec, StackedCell};
use crate::ml::encoder::embedding_initializer;

#[derive(Debug, Clone, Copy)]
pub struct DecoderSpec {
    pub vocab_size: usize,
    pub embedding_size: usize,
    pub hidden_units: usize,
    pub attention_units: usize,
    pub depth: usize,
    pub cell_type: CellType,
    pub attention_type: AttentionType,
    pub residual: bool,
    pub dropout: f64,
    pub pointer_gen: bool,
    pub coverage: bool,
    /// Reuse the encoder embedding instead of owning one.
    pub share_embedding: bool,
}

/// Everything carried from one decoder step to the next.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub layers: Vec<RnnState<B>>,
    /// Previous context vector: [batch, hidden]
    pub context: Tensor<B, 2>,
    /// Sum of past attention: [batch, time]
    pub coverage: Option<Tensor<B, 2>>,
}

impl<B: Backend> DecoderState<B> {
    /// Reorder every row by `indices` (beam search).
    pub fn select(self, indices: Tensor<B, 1, Int>) -> Self {
        Self {
            layers: self.layers.into_iter().map(|s| s.select(indices.clone())).collect(),
            context: self.context.select(0, indices.clone()),
            coverage: self.coverage.map(|c| c.select(0, indices)),
        }
    }
}

pub struct StepOutput<B: Backend> {
    /// Final distribution: [batch, vocab + max_oovs] (or [batch, vocab]
    /// without pointer).
    pub distribution: Tensor<B, 2>,
    pub attention: Tensor<B, 2>,
    /// Generation probability: [batch, 1]
    pub p_gen: Option<Tensor<B, 2>>,
    /// Per-row coverage loss for this step: [batch]
    pub coverage_loss: Option<Tensor<B, 1>>,
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub embedding: Option<Embedding<B>>,
    input_projection: Linear<B>,
    stack: StackedCell<B>,
    pub attention: Attention<B>,
    attention_output: Linear<B>,
    vocab_projection: Linear<B>,
    pointer_switch: Option<Linear<B>>,
    vocab_size: usize,
    hidden_units: usize,
}

impl<B: Backend> Decoder<B> {
    pub fn new(spec: DecoderSpec, device: &B::Device) -> Self {
        let h = spec.hidden_units;
        let embedding = (!spec.share_embedding).then(|| {
            EmbeddingConfig::new(spec.vocab_size, spec.embedding_size)
                .with_initializer(embedding_initializer())
                .init(device)
        });
        Self {
            embedding,
            input_projection: LinearConfig::new(spec.embedding_size + h, h).init(device),
            stack: StackedCell::new(
                StackSpec {
                    d_input: h,
                    d_hidden: h,
                    depth: spec.depth,
                    cell_type: spec.cell_type,
                    dropout: spec.dropout,
                    residual: spec.residual,
                },
                device,
            ),
            attention: Attention::new(spec.attention_type, h, spec.attention_units, spec.coverage, device),
            attention_output: LinearConfig::new(2 * h, h).with_bias(false).init(device),
            vocab_projection: LinearConfig::new(h, spec.vocab_size).init(device),
            pointer_switch: spec
                .pointer_gen
                .then(|| LinearConfig::new(2 * h + spec.embedding_size, 1).init(device)),
            vocab_size: spec.vocab_size,
            hidden_units: h,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn uses_pointer(&self) -> bool {
        self.pointer_switch.is_some()
    }

    pub fn uses_coverage(&self) -> bool {
        self.attention.uses_coverage()
    }

    /// Initial state from the encoder's final states. Decoder layer
    /// l starts from encoder layer min(l, encoder_depth − 1); zeros
    /// when the encoder returned no states.
    pub fn initial_state(
        &self,
        encoder_states: &[RnnState<B>],
        memory: &AttentionMemory<B>,
    ) -> DecoderState<B> {
        let [batch, time] = memory.mask.dims();
        let device = memory.mask.device();

        let layers = if encoder_states.is_empty() {
            self.stack.zero_states(batch, &device)
        } else {
            (0..self.stack.depth())
                .map(|l| encoder_states[l.min(encoder_states.len() - 1)].clone())
                .collect()
        };

        DecoderState {
            layers,
            context: Tensor::zeros([batch, self.hidden_units], &device),
            coverage: self
                .uses_coverage()
                .then(|| Tensor::zeros([batch, time], &device)),
        }
    }

    /// embedded: [batch, embedding] for the previous output token.
    /// source_extended: [batch, time] ids in the extended vocabulary.
    pub fn step(
        &self,
        embedded: Tensor<B, 2>,
        state: DecoderState<B>,
        memory: &AttentionMemory<B>,
        source_extended: Tensor<B, 2, Int>,
        max_oovs: usize,
    ) -> (StepOutput<B>, DecoderState<B>) {
        let [batch, _] = embedded.dims();

        let cell_input = self
            .input_projection
            .forward(Tensor::cat(vec![embedded.clone(), state.context], 1));
        let (s_t, layers) = self.stack.step(cell_input, state.layers);

        let (context, attention) = self.attention.attend(s_t.clone(), state.coverage.clone(), memory);

        let coverage_loss = state.coverage.as_ref().map(|cov| {
            attention
                .clone()
                .min_pair(cov.clone())
                .sum_dim(1)
                .reshape([batch])
        });
        let coverage = state.coverage.map(|cov| cov + attention.clone());

        let output = self
            .attention_output
            .forward(Tensor::cat(vec![s_t.clone(), context.clone()], 1))
            .tanh();
        let vocab_dist = softmax(self.vocab_projection.forward(output), 1);

        let (distribution, p_gen) = match &self.pointer_switch {
            Some(switch) => {
                let p_gen = sigmoid(switch.forward(Tensor::cat(
                    vec![context.clone(), s_t, embedded],
                    1,
                )));
                let dist = mix_distributions(
                    vocab_dist,
                    attention.clone(),
                    p_gen.clone(),
                    source_extended,
                    max_oovs,
                );
                (dist, Some(p_gen))
            }
            None => (vocab_dist, None),
        };

        let next = DecoderState { layers, context, coverage };
        (
            StepOutput { distribution, attention, p_gen, coverage_loss },
            next,
        )
    }
}

/// p_gen · P_vocab (zero-extended) + (1 − p_gen) · copy distribution.
///
/// vocab_dist: [b, V], attention: [b, T], p_gen: [b, 1],
/// source_extended: [b, T] → [b, V + max_oovs]
///
/// The copy term is attention times a one-hot [b, T, V + max_oovs]
/// of the source ids, so repeated ids accumulate and the whole
/// mixture stays differentiable.
pub fn mix_distributions<B: Backend>(
    vocab_dist: Tensor<B, 2>,
    attention: Tensor<B, 2>,
    p_gen: Tensor<B, 2>,
    source_extended: Tensor<B, 2, Int>,
    max_oovs: usize,
) -> Tensor<B, 2> {
    let [batch, vocab] = vocab_dist.dims();
    let [_, time] = attention.dims();
    let extended = vocab + max_oovs;
    let device = vocab_dist.device();

    let mut generated = vocab_dist * p_gen.clone();
    if max_oovs > 0 {
        generated = Tensor::cat(vec![generated, Tensor::zeros([batch, max_oovs], &device)], 1);
    }

    let ids = Tensor::<B, 1, Int>::arange(0..extended as i64, &device)
        .reshape([1, 1, extended])
        .expand([batch, time, extended]);
    let one_hot = source_extended
        .unsqueeze_dim::<3>(2)
        .expand([batch, time, extended])
        .equal(ids)
        .float();

    let copy_weights = attention * p_gen.neg().add_scalar(1.0);
    let copied = copy_weights
        .unsqueeze_dim::<3>(1)
        .matmul(one_hot)
        .reshape([batch, extended]);

    generated + copied
}
