// Language model access — chat completions, embeddings, and prompts.

pub mod openai;
pub mod prompts;
pub mod rate_limiter;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{Embedder, TextGenerator};
