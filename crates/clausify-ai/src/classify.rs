use clausify_core::Prediction;

/// Anything that maps clause text to a label distribution.
///
/// The HTTP service holds a `Box<dyn Classify + Send>` so it can be tested
/// without a model on disk.
pub trait Classify {
    fn classify(&mut self, text: &str) -> anyhow::Result<Prediction>;

    /// Known labels in id order.
    fn labels(&self) -> Vec<String>;
}
