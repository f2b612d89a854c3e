pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiGenerator;
pub use provider::Generator;
pub use types::{ChatMessage, ChatRequest};
