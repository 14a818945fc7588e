//! Native text-generation model: GPT-2 network and its decoding loop.

pub mod decode;
pub mod gpt2;

pub use decode::{decode_tokens, DecodeParams};
pub use gpt2::{Gpt2Config, Gpt2Model};
