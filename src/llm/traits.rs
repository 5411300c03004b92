// Language model traits — the seams between the pipeline and the API.
//
// The default implementations call an OpenAI-compatible API. Tests plug in
// canned generators and embedders so the flows run without the network.

use anyhow::Result;
use async_trait::async_trait;

/// Produces text from a system instruction and a user prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Free-form completion.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;

    /// Completion constrained to a single JSON object. The returned string is
    /// the raw object; callers parse it into their own response type.
    ///
    /// Default implementation falls back to `generate` — providers can
    /// override it with a native JSON mode.
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate(system, prompt).await
    }
}

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Embed multiple texts, returning vectors in the same order.
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
