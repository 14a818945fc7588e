//! Autoregressive sampling over a [`Gpt2Model`].

use candle_core::Result as CandleResult;
use candle_transformers::generation::{LogitsProcessor, Sampling};

use super::Gpt2Model;

/// Decoding knobs for one candidate sequence.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    /// Token budget for context plus new tokens.
    pub max_length: usize,
    pub top_k: usize,
    pub temperature: f64,
}

/// Sample tokens after `context` until end-of-text, `max_length`, or the
/// model's position limit. Returns only the new tokens; the end-of-text
/// token itself is never included.
///
/// A context already at or past the budget yields no tokens.
pub fn decode_tokens(
    model: &Gpt2Model,
    context: &[u32],
    params: &DecodeParams,
    seed: u64,
) -> CandleResult<Vec<u32>> {
    let limit = params.max_length.min(model.config().n_positions);
    let eos_token_id = model.config().eos_token_id;

    let mut processor = LogitsProcessor::from_sampling(
        seed,
        Sampling::TopK {
            k: params.top_k,
            temperature: params.temperature,
        },
    );

    let mut tokens = context.to_vec();
    let mut generated = Vec::new();

    while tokens.len() < limit {
        let logits = model.next_token_logits(&tokens)?;
        let next_token = processor.sample(&logits)?;
        if next_token == eos_token_id {
            break;
        }
        tokens.push(next_token);
        generated.push(next_token);
    }

    Ok(generated)
}
