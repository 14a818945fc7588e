//! GPT-2 decoder on candle.
//!
//! Weight names follow the Hugging Face `gpt2` checkpoints (`wte`, `wpe`,
//! `h.{i}.attn.c_attn`, ...). The fused projections are stored as Conv1D
//! (`[in, out]`) and are transposed into `Linear` on load. The LM head is
//! tied to the token embedding.

use candle_core::{DType, Device, IndexOp, Module, Result as CandleResult, Tensor, D};
use candle_nn::{embedding, layer_norm, ops, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;

/// Subset of `config.json` the forward pass needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default = "default_n_embd")]
    pub n_embd: usize,
    #[serde(default = "default_n_layer")]
    pub n_layer: usize,
    #[serde(default = "default_n_head")]
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: u32,
}

fn default_vocab_size() -> usize {
    50257
}

fn default_n_positions() -> usize {
    1024
}

fn default_n_embd() -> usize {
    768
}

fn default_n_layer() -> usize {
    12
}

fn default_n_head() -> usize {
    12
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_eos_token_id() -> u32 {
    50256
}

impl Default for Gpt2Config {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
            n_positions: default_n_positions(),
            n_embd: default_n_embd(),
            n_layer: default_n_layer(),
            n_head: default_n_head(),
            layer_norm_epsilon: default_layer_norm_epsilon(),
            eos_token_id: default_eos_token_id(),
        }
    }
}

/// Load a Conv1D (`[in, out]` weight) as a `Linear` (`[out, in]`).
fn conv1d_as_linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> CandleResult<Linear> {
    let weight = vb.get((in_dim, out_dim), "weight")?.t()?.contiguous()?;
    let bias = vb.get(out_dim, "bias")?;
    Ok(Linear::new(weight, Some(bias)))
}

struct CausalSelfAttention {
    c_attn: Linear,
    c_proj: Linear,
    n_head: usize,
    n_embd: usize,
}

impl CausalSelfAttention {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> CandleResult<Self> {
        Ok(Self {
            c_attn: conv1d_as_linear(cfg.n_embd, 3 * cfg.n_embd, vb.pp("c_attn"))?,
            c_proj: conv1d_as_linear(cfg.n_embd, cfg.n_embd, vb.pp("c_proj"))?,
            n_head: cfg.n_head,
            n_embd: cfg.n_embd,
        })
    }

    fn forward(&self, xs: &Tensor, mask: &Tensor) -> CandleResult<Tensor> {
        let (b_sz, seq_len, _) = xs.dims3()?;
        let head_dim = self.n_embd / self.n_head;

        let qkv = self.c_attn.forward(xs)?;
        let split = |idx: usize| -> CandleResult<Tensor> {
            qkv.narrow(D::Minus1, idx * self.n_embd, self.n_embd)?
                .reshape((b_sz, seq_len, self.n_head, head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(0)?;
        let k = split(1)?;
        let v = split(2)?;

        // (b, heads, seq, seq)
        let scale = 1.0 / (head_dim as f64).sqrt();
        let att = (q.matmul(&k.t()?)? * scale)?;
        let att = masked_fill(&att, &mask.broadcast_as(att.dims())?, f32::NEG_INFINITY)?;
        let att = ops::softmax_last_dim(&att)?;

        let ys = att
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b_sz, seq_len, self.n_embd))?;
        self.c_proj.forward(&ys)
    }
}

struct Mlp {
    c_fc: Linear,
    c_proj: Linear,
}

impl Mlp {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> CandleResult<Self> {
        let hidden = 4 * cfg.n_embd;
        Ok(Self {
            c_fc: conv1d_as_linear(cfg.n_embd, hidden, vb.pp("c_fc"))?,
            c_proj: conv1d_as_linear(hidden, cfg.n_embd, vb.pp("c_proj"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> CandleResult<Tensor> {
        // gelu_new: tanh approximation
        self.c_proj.forward(&self.c_fc.forward(xs)?.gelu()?)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: CausalSelfAttention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> CandleResult<Self> {
        Ok(Self {
            ln_1: layer_norm(cfg.n_embd, cfg.layer_norm_epsilon, vb.pp("ln_1"))?,
            attn: CausalSelfAttention::load(cfg, vb.pp("attn"))?,
            ln_2: layer_norm(cfg.n_embd, cfg.layer_norm_epsilon, vb.pp("ln_2"))?,
            mlp: Mlp::load(cfg, vb.pp("mlp"))?,
        })
    }

    fn forward(&self, xs: &Tensor, mask: &Tensor) -> CandleResult<Tensor> {
        let xs = (xs + self.attn.forward(&self.ln_1.forward(xs)?, mask)?)?;
        &xs + self.mlp.forward(&self.ln_2.forward(&xs)?)?
    }
}

/// Read-only GPT-2 model. `forward` keeps no state between calls, so one
/// instance can serve concurrent requests.
pub struct Gpt2Model {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    config: Gpt2Config,
    device: Device,
}

impl Gpt2Model {
    pub fn load(config: Gpt2Config, vb: VarBuilder) -> CandleResult<Self> {
        // Some exports nest everything under `transformer.`
        let vb = if vb.contains_tensor("wte.weight") {
            vb
        } else {
            vb.pp("transformer")
        };

        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(&config, vb.pp(format!("h.{}", i))))
            .collect::<CandleResult<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            device: vb.device().clone(),
            config,
        })
    }

    pub fn config(&self) -> &Gpt2Config {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Logits for the token following `input_ids`, shape `(vocab_size,)`.
    pub fn next_token_logits(&self, input_ids: &[u32]) -> CandleResult<Tensor> {
        let seq_len = input_ids.len();
        if seq_len == 0 {
            candle_core::bail!("next_token_logits called with an empty context");
        }
        if seq_len > self.config.n_positions {
            candle_core::bail!(
                "context of {} tokens exceeds the model limit of {}",
                seq_len,
                self.config.n_positions
            );
        }

        let ids = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let positions = Tensor::arange(0u32, seq_len as u32, &self.device)?.unsqueeze(0)?;

        let mut xs = (self.wte.forward(&ids)? + self.wpe.forward(&positions)?)?;
        let mask = causal_mask(seq_len, &self.device)?;
        for block in &self.blocks {
            xs = block.forward(&xs, &mask)?;
        }

        let last = self.ln_f.forward(&xs)?.i((0, seq_len - 1))?;
        last.unsqueeze(0)?
            .matmul(&self.wte.embeddings().t()?)?
            .squeeze(0)?
            .to_dtype(DType::F32)
    }
}

/// `1` where position `j` lies in the future of position `i`.
fn causal_mask(seq_len: usize, device: &Device) -> CandleResult<Tensor> {
    let mask: Vec<u8> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| u8::from(j > i)))
        .collect();
    Tensor::from_slice(&mask, (seq_len, seq_len), device)
}

fn masked_fill(on_false: &Tensor, mask: &Tensor, on_true: f32) -> CandleResult<Tensor> {
    let on_true = Tensor::new(on_true, on_false.device())?
        .to_dtype(on_false.dtype())?
        .broadcast_as(mask.shape().dims())?;
    mask.where_cond(&on_true, on_false)
}
