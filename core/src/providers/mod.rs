pub mod factory;
pub mod ollama;
pub mod openai;

pub use factory::{create_provider, create_provider_with};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
