//! ONNX Runtime sentence encoder for BERT-family checkpoints.
//!
//! Produces mean-pooled, L2-normalized features from the model's token
//! embeddings. The model must be an ONNX export taking `input_ids` and
//! `attention_mask` (plus `token_type_ids` when the export declares it) and
//! returning `[batch, seq, hidden]` as its first output.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};
use tracing::info;

use crate::encode::{Encode, normalize};

/// Frozen transformer encoder with its tokenizer.
pub struct Encoder {
    session: Session,
    tokenizer: Tokenizer,
    hidden_size: usize,
    uses_token_types: bool,
}

impl Encoder {
    /// Load an encoder from an ONNX file and a `tokenizer.json`.
    ///
    /// Inputs longer than `max_length` tokens are truncated.
    pub fn load(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "model not found: {model_path:?}");
        anyhow::ensure!(tokenizer_path.exists(), "tokenizer not found: {tokenizer_path:?}");

        let session = Session::builder()?.commit_from_file(model_path)?;

        // Dynamic hidden dims fall back to the BERT-base width.
        let hidden_size = infer_hidden_size(session.outputs()[0].dtype()).unwrap_or(768);
        let uses_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Batch-longest padding.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(
            hidden_size,
            max_length,
            model = %model_path.display(),
            "loaded encoder"
        );
        Ok(Self {
            session,
            tokenizer,
            hidden_size,
            uses_token_types,
        })
    }

    /// Load `model.onnx` and `tokenizer.json` from one directory.
    pub fn load_dir(dir: &Path, max_length: usize) -> anyhow::Result<Self> {
        Self::load(
            &dir.join(clausify_core::artifact::MODEL_FILE),
            &dir.join(clausify_core::artifact::TOKENIZER_FILE),
            max_length,
        )
    }
}

impl Encode for Encoder {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let rows = encodings.len();
        let width = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        anyhow::ensure!(width > 0, "tokenizer produced no tokens");
        let shape = [rows as i64, width as i64];

        let column = |field: fn(&Encoding) -> &[u32]| flatten(encodings.iter().map(field), width);
        let ids = Tensor::from_array((shape, column(Encoding::get_ids)))?;
        let mask = Tensor::from_array((shape, column(Encoding::get_attention_mask)))?;
        let outputs = if self.uses_token_types {
            let types = Tensor::from_array((shape, column(Encoding::get_type_ids)))?;
            self.session.run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
            ])?
        };

        let (out_shape, states) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = out_shape;
        let &[out_rows, out_len, out_hidden] = dims else {
            anyhow::bail!("expected a [batch, seq, hidden] output, got {dims:?}");
        };
        anyhow::ensure!(
            out_rows as usize == rows && out_len > 0 && out_hidden as usize == self.hidden_size,
            "output shape {dims:?} does not match {rows} inputs of hidden size {}",
            self.hidden_size
        );

        let per_row = out_len as usize * self.hidden_size;
        Ok(encodings
            .iter()
            .zip(states.chunks_exact(per_row))
            .map(|(encoding, row_states)| mean_pool(row_states, encoding.get_attention_mask(), self.hidden_size))
            .collect())
    }
}

/// Rows zero-padded to `width`, as a flat row-major `i64` buffer.
fn flatten<'a>(rows: impl ExactSizeIterator<Item = &'a [u32]>, width: usize) -> Box<[i64]> {
    let mut flat = vec![0i64; rows.len() * width];
    for (out, row) in flat.chunks_exact_mut(width).zip(rows) {
        for (slot, &v) in out.iter_mut().zip(row) {
            *slot = i64::from(v);
        }
    }
    flat.into_boxed_slice()
}

/// Average the hidden states of unmasked tokens, then scale to unit length.
fn mean_pool(states: &[f32], mask: &[u32], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut kept = 0usize;
    for (state, _) in states.chunks_exact(hidden).zip(mask).filter(|(_, m)| **m > 0) {
        for (p, &v) in pooled.iter_mut().zip(state) {
            *p += v;
        }
        kept += 1;
    }
    if kept > 0 {
        let scale = 1.0 / kept as f32;
        pooled.iter_mut().for_each(|p| *p *= scale);
    }
    normalize(&mut pooled);
    pooled
}

/// Hidden size from the last dimension of the model's first output, if static.
fn infer_hidden_size(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
