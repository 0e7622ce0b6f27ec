// ============================================================
// Layer 5 — Pointer-Generator Model
// ============================================================
// Encoder + attention decoder, trained with teacher forcing.
//
//   encoder_inputs ─► Encoder ─► outputs ─► AttentionMemory
//                              └► final states ─► DecoderState
//
//   for t in 0..T_dec:
//     <s> y_1 … y_{t-1} ─► Decoder::step ─► P_final(·), covloss_t
//
// Loss (averaged over valid target positions, EOS included):
//   nll      = Σ_t mask_t · −log(P_final(y_t) + ε) / Σ mask
//   coverage = Σ_t mask_t · covloss_t / Σ mask
//   loss     = nll + λ · coverage
//
// Reference: See, Liu & Manning (2017) Get To The Point

use burn::{
    nn::Embedding,
    prelude::*,
};

use crate::data::batcher::SummaryBatch;
use crate::domain::error::DataError;
use crate::domain::vocab::UNK;
use crate::ml::attention::{AttentionMemory, AttentionType};
use crate::ml::cell::CellType;
use crate::ml::decoder::{Decoder, DecoderSpec, DecoderState, StepOutput};
use crate::ml::encoder::{Encoder, EncoderSpec};

const LOG_EPSILON: f64 = 1e-12;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct PointerGeneratorConfig {
    pub source_vocab_size: usize,
    pub target_vocab_size: usize,
    #[config(default = 300)]
    pub embedding_size: usize,
    #[config(default = 500)]
    pub hidden_units: usize,
    #[config(default = 256)]
    pub attention_units: usize,
    #[config(default = 3)]
    pub encoder_depth: usize,
    #[config(default = 3)]
    pub decoder_depth: usize,
    #[config(default = "CellType::Gru")]
    pub cell_type: CellType,
    #[config(default = "AttentionType::Bahdanau")]
    pub attention_type: AttentionType,
    #[config(default = false)]
    pub bidirectional: bool,
    #[config(default = false)]
    pub residual: bool,
    /// Dropout on every recurrent layer output; 0 disables it.
    #[config(default = 0.0)]
    pub dropout: f64,
    #[config(default = true)]
    pub pointer_gen: bool,
    #[config(default = true)]
    pub coverage: bool,
    #[config(default = false)]
    pub share_embedding: bool,
    #[config(default = 1.0)]
    pub coverage_loss_weight: f64,
}

impl PointerGeneratorConfig {
    pub fn validate(&self) -> Result<(), DataError> {
        let sizes = [
            ("source_vocab_size", self.source_vocab_size),
            ("target_vocab_size", self.target_vocab_size),
            ("embedding_size", self.embedding_size),
            ("hidden_units", self.hidden_units),
            ("attention_units", self.attention_units),
            ("encoder_depth", self.encoder_depth),
            ("decoder_depth", self.decoder_depth),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(DataError::InvalidConfig(format!("{name} must be greater than zero")));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(DataError::InvalidConfig(format!(
                "dropout rate must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.share_embedding && self.source_vocab_size != self.target_vocab_size {
            return Err(DataError::InvalidConfig(format!(
                "share_embedding needs equal vocabulary sizes, got {} and {}",
                self.source_vocab_size, self.target_vocab_size
            )));
        }
        if self.coverage_loss_weight < 0.0 {
            return Err(DataError::InvalidConfig("coverage_loss_weight must not be negative".into()));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> PointerGeneratorModel<B> {
        let encoder = Encoder::new(
            EncoderSpec {
                vocab_size: self.source_vocab_size,
                embedding_size: self.embedding_size,
                hidden_units: self.hidden_units,
                depth: self.encoder_depth,
                cell_type: self.cell_type,
                bidirectional: self.bidirectional,
                residual: self.residual,
                dropout: self.dropout,
            },
            device,
        );
        let decoder = Decoder::new(
            DecoderSpec {
                vocab_size: self.target_vocab_size,
                embedding_size: self.embedding_size,
                hidden_units: self.hidden_units,
                attention_units: self.attention_units,
                depth: self.decoder_depth,
                cell_type: self.cell_type,
                attention_type: self.attention_type,
                residual: self.residual,
                dropout: self.dropout,
                pointer_gen: self.pointer_gen,
                coverage: self.coverage,
                share_embedding: self.share_embedding,
            },
            device,
        );
        PointerGeneratorModel {
            encoder,
            decoder,
            coverage_loss_weight: self.coverage_loss_weight,
        }
    }
}

#[derive(Module, Debug)]
pub struct PointerGeneratorModel<B: Backend> {
    pub encoder: Encoder<B>,
    pub decoder: Decoder<B>,
    pub coverage_loss_weight: f64,
}

pub struct TrainOutput<B: Backend> {
    /// nll + λ · coverage: [1]
    pub loss: Tensor<B, 1>,
    pub nll_loss: Tensor<B, 1>,
    pub coverage_loss: Option<Tensor<B, 1>>,
    /// Argmax per decoder step, extended ids: [batch, time]
    pub predictions: Tensor<B, 2, Int>,
}

impl<B: Backend> PointerGeneratorModel<B> {
    pub fn target_vocab_size(&self) -> usize {
        self.decoder.vocab_size()
    }

    pub fn uses_pointer(&self) -> bool {
        self.decoder.uses_pointer()
    }

    fn decoder_embedding(&self) -> &Embedding<B> {
        self.decoder.embedding.as_ref().unwrap_or(&self.encoder.embedding)
    }

    /// Runs the encoder and builds the attention memory and the
    /// initial decoder state.
    pub fn encode(
        &self,
        encoder_inputs: Tensor<B, 2, Int>,
        encoder_mask: Tensor<B, 2>,
    ) -> (AttentionMemory<B>, DecoderState<B>) {
        let encoded = self.encoder.forward(encoder_inputs, encoder_mask.clone());
        let memory = self.decoder.attention.memory(encoded.outputs, encoder_mask);
        let state = self.decoder.initial_state(&encoded.final_states, &memory);
        (memory, state)
    }

    /// One free-running decoder step. `input_ids` may hold extended
    /// (copied OOV) ids; they are fed back as UNK.
    pub fn decode_step(
        &self,
        input_ids: Tensor<B, 1, Int>,
        state: DecoderState<B>,
        memory: &AttentionMemory<B>,
        source_extended: Tensor<B, 2, Int>,
        max_oovs: usize,
    ) -> (StepOutput<B>, DecoderState<B>) {
        let [batch] = input_ids.dims();
        let out_of_vocab = input_ids.clone().greater_equal_elem(self.target_vocab_size() as i64);
        let ids = input_ids.mask_fill(out_of_vocab, UNK as i64);

        let embedded = self.decoder_embedding().forward(ids.unsqueeze_dim::<2>(1));
        let embedding_size = embedded.dims()[2];
        let embedded = embedded.reshape([batch, embedding_size]);

        let max_oovs = if self.uses_pointer() { max_oovs } else { 0 };
        self.decoder.step(embedded, state, memory, source_extended, max_oovs)
    }

    /// Teacher-forced pass over a whole batch.
    pub fn forward_train(&self, batch: &SummaryBatch<B>) -> TrainOutput<B> {
        let (memory, mut state) = self.encode(batch.encoder_inputs.clone(), batch.encoder_mask.clone());

        let [batch_size, steps] = batch.decoder_inputs.dims();
        let embedded = self.decoder_embedding().forward(batch.decoder_inputs.clone());
        let embedding_size = embedded.dims()[2];
        let max_oovs = if self.uses_pointer() { batch.max_oovs } else { 0 };

        let mut target_probs = Vec::with_capacity(steps);
        let mut coverage_losses = Vec::with_capacity(steps);
        let mut predictions = Vec::with_capacity(steps);

        for t in 0..steps {
            let x_t = embedded
                .clone()
                .slice([0..batch_size, t..t + 1, 0..embedding_size])
                .reshape([batch_size, embedding_size]);
            let (out, next) = self.decoder.step(
                x_t,
                state,
                &memory,
                batch.encoder_inputs_extended.clone(),
                max_oovs,
            );
            state = next;

            let target_t = batch.decoder_targets.clone().slice([0..batch_size, t..t + 1]);
            target_probs.push(out.distribution.clone().gather(1, target_t).reshape([batch_size]));
            predictions.push(out.distribution.argmax(1).reshape([batch_size]));
            if let Some(loss) = out.coverage_loss {
                coverage_losses.push(loss);
            }
        }

        let mask = batch.decoder_mask.clone();
        let valid_tokens = mask.clone().sum().clamp_min(1.0);

        let probs = Tensor::stack::<2>(target_probs, 1);
        let nll_loss = (probs.add_scalar(LOG_EPSILON).log().neg() * mask.clone()).sum() / valid_tokens.clone();

        let coverage_loss = (!coverage_losses.is_empty())
            .then(|| (Tensor::stack::<2>(coverage_losses, 1) * mask).sum() / valid_tokens);

        let loss = match &coverage_loss {
            Some(cov) => nll_loss.clone() + cov.clone().mul_scalar(self.coverage_loss_weight),
            None => nll_loss.clone(),
        };

        TrainOutput {
            loss,
            nll_loss,
            coverage_loss,
            predictions: Tensor::stack::<2>(predictions, 1),
        }
    }
}
