// ============================================================
// Layer 5 — Recurrent Cells
// ============================================================
// GRU and LSTM cells built from two Linear layers each, plus a
// stacked (multi-layer) cell with dropout and optional residual
// connections, and a sequence runner that honours per-row
// sequence lengths.
//
// GRU (Cho et al. 2014):
//   r = σ(W_ir x + W_hr h)
//   z = σ(W_iz x + W_hz h)
//   n = tanh(W_in x + r ⊙ (W_hn h))
//   h' = n + z ⊙ (h − n)              = (1 − z) ⊙ n + z ⊙ h
//
// LSTM (Hochreiter & Schmidhuber 1997):
//   [i f g o] = W_i x + W_h h
//   c' = σ(f) ⊙ c + σ(i) ⊙ tanh(g)
//   h' = σ(o) ⊙ tanh(c')
//
// Variable lengths: at padded steps the state is carried over
// unchanged and the output is zero, so the "last state" of a
// row is the state after its final real token.

use std::str::FromStr;

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Gru,
    Lstm,
}

impl FromStr for CellType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gru" => Ok(Self::Gru),
            "lstm" => Ok(Self::Lstm),
            other => Err(DataError::InvalidConfig(format!(
                "unknown cell type '{other}' (expected gru or lstm)"
            ))),
        }
    }
}

/// Recurrent state of one layer. `cell` is only present for LSTM.
#[derive(Debug, Clone)]
pub struct RnnState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell: Option<Tensor<B, 2>>,
}

impl<B: Backend> RnnState<B> {
    pub fn zeros(batch: usize, hidden: usize, cell_type: CellType, device: &B::Device) -> Self {
        let cell = match cell_type {
            CellType::Lstm => Some(Tensor::zeros([batch, hidden], device)),
            CellType::Gru => None,
        };
        Self { hidden: Tensor::zeros([batch, hidden], device), cell }
    }

    /// Keep `next` where mask is 1, `self` where it is 0.
    /// mask: [batch, 1]
    pub fn blend(self, next: Self, mask: Tensor<B, 2>) -> Self {
        let keep = mask.clone().neg().add_scalar(1.0);
        let hidden = next.hidden * mask.clone() + self.hidden * keep.clone();
        let cell = match (self.cell, next.cell) {
            (Some(old), Some(new)) => Some(new * mask + old * keep),
            _ => None,
        };
        Self { hidden, cell }
    }

    /// Reorder rows (beam search).
    pub fn select(self, indices: Tensor<B, 1, Int>) -> Self {
        Self {
            hidden: self.hidden.select(0, indices.clone()),
            cell: self.cell.map(|c| c.select(0, indices)),
        }
    }
}

// ─── Single cell ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    input_gates: Linear<B>,
    hidden_gates: Linear<B>,
    hidden_size: usize,
    is_lstm: bool,
}

impl<B: Backend> RecurrentCell<B> {
    pub fn new(d_input: usize, d_hidden: usize, cell_type: CellType, device: &B::Device) -> Self {
        let gates = match cell_type {
            CellType::Gru => 3,
            CellType::Lstm => 4,
        };
        Self {
            input_gates: LinearConfig::new(d_input, gates * d_hidden).init(device),
            hidden_gates: LinearConfig::new(d_hidden, gates * d_hidden).init(device),
            hidden_size: d_hidden,
            is_lstm: cell_type == CellType::Lstm,
        }
    }

    pub fn cell_type(&self) -> CellType {
        if self.is_lstm { CellType::Lstm } else { CellType::Gru }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// input: [batch, d_input] → next state
    pub fn step(&self, input: Tensor<B, 2>, state: RnnState<B>) -> RnnState<B> {
        if self.is_lstm {
            self.lstm_step(input, state)
        } else {
            self.gru_step(input, state)
        }
    }

    fn gru_step(&self, input: Tensor<B, 2>, state: RnnState<B>) -> RnnState<B> {
        let h = state.hidden;
        let gi = self.input_gates.forward(input);
        let gh = self.hidden_gates.forward(h.clone());

        let r = sigmoid(self.gate(&gi, 0) + self.gate(&gh, 0));
        let z = sigmoid(self.gate(&gi, 1) + self.gate(&gh, 1));
        let n = (self.gate(&gi, 2) + r * self.gate(&gh, 2)).tanh();
        let hidden = n.clone() + z * (h - n);

        RnnState { hidden, cell: None }
    }

    fn lstm_step(&self, input: Tensor<B, 2>, state: RnnState<B>) -> RnnState<B> {
        let h = state.hidden;
        let c = match state.cell {
            Some(c) => c,
            None => h.zeros_like(),
        };
        let gates = self.input_gates.forward(input) + self.hidden_gates.forward(h);

        let i = sigmoid(self.gate(&gates, 0));
        let f = sigmoid(self.gate(&gates, 1));
        let cand = self.gate(&gates, 2).tanh();
        let o = sigmoid(self.gate(&gates, 3));

        let cell = f * c + i * cand;
        let hidden = o * cell.clone().tanh();

        RnnState { hidden, cell: Some(cell) }
    }

    /// k-th block of hidden_size columns.
    fn gate(&self, gates: &Tensor<B, 2>, k: usize) -> Tensor<B, 2> {
        gates.clone().narrow(1, k * self.hidden_size, self.hidden_size)
    }
}

// ─── Stacked cell ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct StackedCell<B: Backend> {
    layers: Vec<RecurrentCell<B>>,
    dropout: Dropout,
    residual: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StackSpec {
    pub d_input: usize,
    pub d_hidden: usize,
    pub depth: usize,
    pub cell_type: CellType,
    /// 0.0 disables dropout
    pub dropout: f64,
    pub residual: bool,
}

impl<B: Backend> StackedCell<B> {
    pub fn new(spec: StackSpec, device: &B::Device) -> Self {
        let layers = (0..spec.depth)
            .map(|i| {
                let d_in = if i == 0 { spec.d_input } else { spec.d_hidden };
                RecurrentCell::new(d_in, spec.d_hidden, spec.cell_type, device)
            })
            .collect();
        Self {
            layers,
            dropout: DropoutConfig::new(spec.dropout).init(),
            residual: spec.residual,
        }
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn zero_states(&self, batch: usize, device: &B::Device) -> Vec<RnnState<B>> {
        self.layers
            .iter()
            .map(|l| RnnState::zeros(batch, l.hidden_size(), l.cell_type(), device))
            .collect()
    }

    /// One time step through every layer.
    /// Returns the top layer's output and every layer's new state.
    pub fn step(&self, input: Tensor<B, 2>, states: Vec<RnnState<B>>) -> (Tensor<B, 2>, Vec<RnnState<B>>) {
        let mut x = input;
        let mut next_states = Vec::with_capacity(states.len());

        for (i, (layer, state)) in self.layers.iter().zip(states).enumerate() {
            let next = layer.step(x.clone(), state);
            let mut out = self.dropout.forward(next.hidden.clone());
            if self.residual && i > 0 {
                out = out + x;
            }
            x = out;
            next_states.push(next);
        }

        (x, next_states)
    }
}

/// Run `stack` over a whole sequence.
///
/// inputs: [batch, time, d_input], mask: [batch, time] (1 = real token)
/// Returns outputs [batch, time, d_hidden] and the final states.
pub fn run_sequence<B: Backend>(
    stack: &StackedCell<B>,
    inputs: Tensor<B, 3>,
    mask: Tensor<B, 2>,
    initial: Vec<RnnState<B>>,
    reverse: bool,
) -> (Tensor<B, 3>, Vec<RnnState<B>>) {
    let [batch, time, d_input] = inputs.dims();
    let mut states = initial;
    let mut outputs: Vec<Option<Tensor<B, 2>>> = vec![None; time];

    let order: Vec<usize> = if reverse { (0..time).rev().collect() } else { (0..time).collect() };

    for t in order {
        let x_t = inputs
            .clone()
            .slice([0..batch, t..t + 1, 0..d_input])
            .reshape([batch, d_input]);
        let m_t = mask.clone().slice([0..batch, t..t + 1]);

        let (out, next) = stack.step(x_t, states.clone());
        states = states
            .into_iter()
            .zip(next)
            .map(|(old, new)| old.blend(new, m_t.clone()))
            .collect();
        outputs[t] = Some(out * m_t);
    }

    let outputs: Vec<Tensor<B, 2>> = outputs.into_iter().flatten().collect();
    (Tensor::stack::<3>(outputs, 1), states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn spec(cell_type: CellType, depth: usize, residual: bool) -> StackSpec {
        StackSpec { d_input: 3, d_hidden: 4, depth, cell_type, dropout: 0.0, residual }
    }

    #[test]
    fn test_cell_type_parsing() {
        assert_eq!("GRU".parse::<CellType>().unwrap(), CellType::Gru);
        assert_eq!("lstm".parse::<CellType>().unwrap(), CellType::Lstm);
        assert!("rnn".parse::<CellType>().is_err());
    }

    #[test]
    fn test_gru_step_shapes() {
        let device = Default::default();
        let cell = RecurrentCell::<TestBackend>::new(3, 4, CellType::Gru, &device);
        let state = RnnState::zeros(2, 4, CellType::Gru, &device);
        let next = cell.step(Tensor::ones([2, 3], &device), state);
        assert_eq!(next.hidden.dims(), [2, 4]);
        assert!(next.cell.is_none());
    }

    #[test]
    fn test_lstm_step_keeps_cell_state() {
        let device = Default::default();
        let cell = RecurrentCell::<TestBackend>::new(3, 4, CellType::Lstm, &device);
        let state = RnnState::zeros(2, 4, CellType::Lstm, &device);
        let next = cell.step(Tensor::ones([2, 3], &device), state);
        assert_eq!(next.cell.map(|c| c.dims()), Some([2, 4]));
        // |h| = |σ(o)·tanh(c)| < 1
        let max = next.hidden.abs().max().into_scalar();
        assert!(max < 1.0);
    }

    #[test]
    fn test_stack_with_residual() {
        let device = Default::default();
        let stack = StackedCell::<TestBackend>::new(spec(CellType::Gru, 3, true), &device);
        let states = stack.zero_states(2, &device);
        let (out, next) = stack.step(Tensor::ones([2, 3], &device), states);
        assert_eq!(out.dims(), [2, 4]);
        assert_eq!(next.len(), 3);
    }

    #[test]
    fn test_padded_steps_do_not_change_state() {
        let device = Default::default();
        let stack = StackedCell::<TestBackend>::new(spec(CellType::Lstm, 2, false), &device);
        let inputs = Tensor::<TestBackend, 3>::random([2, 4, 3], burn::tensor::Distribution::Default, &device);

        // row 0 has length 2, row 1 has length 4
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], [2, 4]),
            &device,
        );
        let (outputs, final_states) =
            run_sequence(&stack, inputs.clone(), mask, stack.zero_states(2, &device), false);

        // final state of row 0 equals the state after its 2nd step
        let short = inputs.slice([0..1, 0..2, 0..3]);
        let ones = Tensor::<TestBackend, 2>::ones([1, 2], &device);
        let (_, short_states) = run_sequence(&stack, short, ones, stack.zero_states(1, &device), false);

        let a: Vec<f32> = final_states[1].hidden.clone().slice([0..1, 0..4]).into_data().iter::<f32>().collect();
        let b: Vec<f32> = short_states[1].hidden.clone().into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }

        // outputs at padded steps are zero
        let padded = outputs.slice([0..1, 2..4, 0..4]).abs().sum().into_scalar();
        assert_eq!(padded, 0.0);
    }

    #[test]
    fn test_reverse_equals_running_reversed_input() {
        let device = Default::default();
        let stack = StackedCell::<TestBackend>::new(spec(CellType::Gru, 1, false), &device);
        let inputs = Tensor::<TestBackend, 3>::random([1, 3, 3], burn::tensor::Distribution::Default, &device);
        let ones = Tensor::<TestBackend, 2>::ones([1, 3], &device);

        let (_, backward) = run_sequence(&stack, inputs.clone(), ones.clone(), stack.zero_states(1, &device), true);
        let flipped = Tensor::cat(
            (0..3).rev().map(|t| inputs.clone().slice([0..1, t..t + 1, 0..3])).collect(),
            1,
        );
        let (_, forward) = run_sequence(&stack, flipped, ones, stack.zero_states(1, &device), false);

        let a: Vec<f32> = backward[0].hidden.clone().into_data().iter::<f32>().collect();
        let b: Vec<f32> = forward[0].hidden.clone().into_data().iter::<f32>().collect();
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }
    }
}
