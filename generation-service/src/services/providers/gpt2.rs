//! GPT-2 generator backed by the native candle model.

use super::{GeneratedSequence, GenerationParams, GeneratorError, TextGenerator};
use crate::config::{DeviceKind, ModelConfig};
use crate::llm::{decode_tokens, DecodeParams, Gpt2Config, Gpt2Model};
use async_trait::async_trait;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// On-disk locations of the files a GPT-2 checkpoint needs.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelArtifacts {
    /// Use a local checkpoint directory.
    pub fn from_dir(dir: &Path) -> Result<Self, GeneratorError> {
        let artifacts = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        };

        for path in [&artifacts.config, &artifacts.tokenizer, &artifacts.weights] {
            if !path.is_file() {
                return Err(GeneratorError::ModelLoad(format!(
                    "missing model file {}",
                    path.display()
                )));
            }
        }

        Ok(artifacts)
    }

    /// Fetch (or reuse the local cache of) a Hugging Face Hub checkpoint.
    pub fn from_hub(model_id: &str, revision: &str) -> Result<Self, GeneratorError> {
        let hub_error = |e: hf_hub::api::sync::ApiError| {
            GeneratorError::ModelLoad(format!("{}@{}: {}", model_id, revision, e))
        };

        let api = Api::new().map_err(hub_error)?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        Ok(Self {
            config: repo.get(CONFIG_FILE).map_err(hub_error)?,
            tokenizer: repo.get(TOKENIZER_FILE).map_err(hub_error)?,
            weights: repo.get(WEIGHTS_FILE).map_err(hub_error)?,
        })
    }
}

/// GPT-2 text generator. Cheap to share: the model and tokenizer sit
/// behind `Arc` and are never mutated after load.
pub struct Gpt2Generator {
    model: Arc<Gpt2Model>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
}

impl Gpt2Generator {
    /// Resolve artifacts and load the model. Blocking; call it from
    /// `spawn_blocking` inside a runtime.
    pub fn load(config: &ModelConfig) -> Result<Self, GeneratorError> {
        let (artifacts, model_name) = match &config.local_path {
            Some(dir) => (ModelArtifacts::from_dir(dir)?, dir.display().to_string()),
            None => (
                ModelArtifacts::from_hub(&config.model_id, &config.revision)?,
                format!("{}@{}", config.model_id, config.revision),
            ),
        };

        let device = match config.device {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda => Device::new_cuda(0)
                .map_err(|e| GeneratorError::ModelLoad(format!("CUDA device: {}", e)))?,
        };

        Self::from_artifacts(&artifacts, model_name, &device)
    }

    pub fn from_artifacts(
        artifacts: &ModelArtifacts,
        model_name: String,
        device: &Device,
    ) -> Result<Self, GeneratorError> {
        let load_error = |what: &str, e: &dyn std::fmt::Display| {
            GeneratorError::ModelLoad(format!("{} ({}): {}", what, model_name, e))
        };

        let raw_config = std::fs::read_to_string(&artifacts.config)
            .map_err(|e| load_error("reading config.json", &e))?;
        let model_config: Gpt2Config = serde_json::from_str(&raw_config)
            .map_err(|e| load_error("parsing config.json", &e))?;

        let tokenizer = Tokenizer::from_file(&artifacts.tokenizer)
            .map_err(|e| load_error("loading tokenizer", &e))?;

        // SAFETY: the checkpoint file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&artifacts.weights], DType::F32, device)
        }
        .map_err(|e| load_error("mapping weights", &e))?;

        let model =
            Gpt2Model::load(model_config, vb).map_err(|e| load_error("building model", &e))?;

        tracing::info!(
            model = %model_name,
            layers = model.config().n_layer,
            vocab_size = model.config().vocab_size,
            "Loaded GPT-2 model"
        );

        Ok(Self::new(model, tokenizer, model_name))
    }

    pub fn new(model: Gpt2Model, tokenizer: Tokenizer, model_name: String) -> Self {
        Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            model_name,
        }
    }
}

/// Run every candidate to completion on the calling thread.
fn generate_blocking(
    model: &Gpt2Model,
    tokenizer: &Tokenizer,
    prompt: &str,
    params: &GenerationParams,
) -> Result<Vec<GeneratedSequence>, GeneratorError> {
    let encoding = tokenizer
        .encode(prompt, false)
        .map_err(|e| GeneratorError::InvalidInput(format!("tokenization failed: {}", e)))?;
    let prompt_ids = encoding.get_ids().to_vec();
    let prompt_len = prompt_ids.len();

    // The model needs at least one token of context.
    let context = if prompt_ids.is_empty() {
        vec![model.config().eos_token_id]
    } else {
        prompt_ids
    };

    let decode_params = DecodeParams {
        max_length: params.max_length,
        top_k: params.top_k,
        temperature: params.temperature,
    };

    (0..params.num_return_sequences)
        .map(|i| {
            let seed = params
                .seed
                .map(|s| s.wrapping_add(i as u64))
                .unwrap_or_else(rand::random);

            let new_tokens = decode_tokens(model, &context, &decode_params, seed)?;
            let continuation = tokenizer
                .decode(&new_tokens, true)
                .map_err(|e| GeneratorError::Inference(format!("detokenization failed: {}", e)))?;

            Ok(GeneratedSequence {
                text: format!("{}{}", prompt, continuation),
                token_count: prompt_len + new_tokens.len(),
            })
        })
        .collect()
}

#[async_trait]
impl TextGenerator for Gpt2Generator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, GeneratorError> {
        let model = Arc::clone(&self.model);
        let tokenizer = Arc::clone(&self.tokenizer);
        let prompt = prompt.to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || generate_blocking(&model, &tokenizer, &prompt, &params))
            .await
            .map_err(|e| GeneratorError::Inference(format!("generation task failed: {}", e)))?
    }

    async fn health_check(&self) -> Result<(), GeneratorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::tiny_model;
    use candle_core::Tensor;
    use std::collections::HashMap;
    use std::str::FromStr;

    const WORDS: [&str; 16] = [
        "[UNK]", "hello", "world", "the", "a", "cat", "dog", "sat", "on", "mat", "and", "ran",
        "far", "away", "home", "<|endoftext|>",
    ];

    fn tiny_tokenizer_json() -> String {
        let vocab = WORDS
            .iter()
            .enumerate()
            .map(|(id, word)| format!("\"{}\": {}", word, id))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"{{
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [],
                "normalizer": null,
                "pre_tokenizer": {{"type": "Whitespace"}},
                "post_processor": null,
                "decoder": null,
                "model": {{"type": "WordLevel", "vocab": {{{}}}, "unk_token": "[UNK]"}}
            }}"#,
            vocab
        )
    }

    fn tiny_tokenizer() -> Tokenizer {
        Tokenizer::from_str(&tiny_tokenizer_json()).expect("tiny tokenizer parses")
    }

    const TINY_CONFIG_JSON: &str = r#"{
        "vocab_size": 16,
        "n_positions": 32,
        "n_embd": 8,
        "n_layer": 2,
        "n_head": 2,
        "eos_token_id": 15
    }"#;

    /// Tensors named and shaped like a Hugging Face GPT-2 export, with the
    /// projections in Conv1D `[in, out]` layout and no separate LM head.
    fn checkpoint_tensors(prefix: &str) -> HashMap<String, Tensor> {
        let device = Device::Cpu;
        let normal = |dims: &[usize]| Tensor::randn(0f32, 0.02, dims.to_vec(), &device).unwrap();
        let ones = |dims: &[usize]| Tensor::ones(dims.to_vec(), DType::F32, &device).unwrap();
        let zeros = |dims: &[usize]| Tensor::zeros(dims.to_vec(), DType::F32, &device).unwrap();
        let (vocab, positions, embd) = (16, 32, 8);

        let mut tensors = HashMap::new();
        let mut put = |name: String, tensor: Tensor| {
            tensors.insert(format!("{}{}", prefix, name), tensor);
        };

        put("wte.weight".into(), normal(&[vocab, embd]));
        put("wpe.weight".into(), normal(&[positions, embd]));
        for i in 0..2 {
            let layer = |name: &str| format!("h.{}.{}", i, name);
            put(layer("ln_1.weight"), ones(&[embd]));
            put(layer("ln_1.bias"), zeros(&[embd]));
            put(layer("attn.bias"), ones(&[1, 1, positions, positions]));
            put(layer("attn.c_attn.weight"), normal(&[embd, 3 * embd]));
            put(layer("attn.c_attn.bias"), zeros(&[3 * embd]));
            put(layer("attn.c_proj.weight"), normal(&[embd, embd]));
            put(layer("attn.c_proj.bias"), zeros(&[embd]));
            put(layer("ln_2.weight"), ones(&[embd]));
            put(layer("ln_2.bias"), zeros(&[embd]));
            put(layer("mlp.c_fc.weight"), normal(&[embd, 4 * embd]));
            put(layer("mlp.c_fc.bias"), zeros(&[4 * embd]));
            put(layer("mlp.c_proj.weight"), normal(&[4 * embd, embd]));
            put(layer("mlp.c_proj.bias"), zeros(&[embd]));
        }
        put("ln_f.weight".into(), ones(&[embd]));
        put("ln_f.bias".into(), zeros(&[embd]));

        tensors
    }

    fn write_checkpoint(dir: &Path, tensors: &HashMap<String, Tensor>) -> ModelArtifacts {
        std::fs::write(dir.join(CONFIG_FILE), TINY_CONFIG_JSON).unwrap();
        std::fs::write(dir.join(TOKENIZER_FILE), tiny_tokenizer_json()).unwrap();
        candle_core::safetensors::save(tensors, dir.join(WEIGHTS_FILE)).unwrap();
        ModelArtifacts::from_dir(dir).unwrap()
    }

    fn load_checkpoint(tensors: &HashMap<String, Tensor>) -> Result<Gpt2Generator, GeneratorError> {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_checkpoint(dir.path(), tensors);
        Gpt2Generator::from_artifacts(&artifacts, "tiny-checkpoint".to_string(), &Device::Cpu)
    }

    fn tiny_generator() -> Gpt2Generator {
        Gpt2Generator::new(tiny_model(), tiny_tokenizer(), "tiny".to_string())
    }

    fn params() -> GenerationParams {
        GenerationParams {
            max_length: 12,
            seed: Some(11),
            ..GenerationParams::default()
        }
    }

    #[tokio::test]
    async fn output_starts_with_prompt_and_respects_budget() {
        let generator = tiny_generator();
        let out = generator.generate("hello world", &params()).await.unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].text.starts_with("hello world"));
        assert!(out[0].token_count >= 2);
        assert!(out[0].token_count <= 12);
    }

    #[tokio::test]
    async fn empty_prompt_is_seeded() {
        let generator = tiny_generator();
        let out = generator.generate("", &params()).await.unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].token_count <= 12);
        assert!(!out[0].text.contains("<|endoftext|>"));
    }

    #[tokio::test]
    async fn returns_requested_number_of_candidates() {
        let generator = tiny_generator();
        let params = GenerationParams {
            num_return_sequences: 3,
            ..params()
        };
        let out = generator.generate("the cat", &params).await.unwrap();
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn fixed_seed_is_reproducible() {
        let generator = tiny_generator();
        let a = generator.generate("the dog", &params()).await.unwrap();
        let b = generator.generate("the dog", &params()).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn local_dir_without_files_fails_to_load() {
        let dir = std::env::temp_dir().join("generation-service-missing-model");
        let err = ModelArtifacts::from_dir(&dir).unwrap_err();
        assert!(matches!(err, GeneratorError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn loads_checkpoint_in_hub_layout() {
        let generator = load_checkpoint(&checkpoint_tensors("")).unwrap();

        let out = generator.generate("hello world", &params()).await.unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].text.starts_with("hello world"));
        assert!(out[0].token_count <= 12);
    }

    #[tokio::test]
    async fn loads_checkpoint_nested_under_transformer() {
        let generator = load_checkpoint(&checkpoint_tensors("transformer.")).unwrap();

        let out = generator.generate("the cat sat", &params()).await.unwrap();

        assert!(out[0].text.starts_with("the cat sat"));
    }

    #[test]
    fn rejects_projection_in_linear_layout() {
        let mut tensors = checkpoint_tensors("");
        let out_in = Tensor::zeros((24, 8), DType::F32, &Device::Cpu).unwrap();
        tensors.insert("h.0.attn.c_attn.weight".to_string(), out_in);

        let err = load_checkpoint(&tensors).err().expect("load must fail");

        assert!(matches!(err, GeneratorError::ModelLoad(_)));
    }

    #[test]
    fn rejects_checkpoint_missing_a_layer() {
        let mut tensors = checkpoint_tensors("");
        tensors.retain(|name, _| !name.starts_with("h.1."));

        let err = load_checkpoint(&tensors).err().expect("load must fail");

        assert!(matches!(err, GeneratorError::ModelLoad(_)));
    }
}
