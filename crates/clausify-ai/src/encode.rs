//! The seam between text and the classification head.

/// Turns text into fixed-width feature vectors.
///
/// [`crate::Encoder`] implements this with ONNX Runtime. Implementations may
/// need `&mut self` because inference sessions are not shareable.
pub trait Encode {
    /// Width of every returned vector.
    fn hidden_size(&self) -> usize;

    /// Encode a batch, one vector per input text.
    fn encode_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Encode a single text.
    fn encode(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("encoder returned no vector"))
    }
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
