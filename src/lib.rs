pub mod config;
pub mod declaration;
pub mod error;
pub mod history;
pub mod llm;
pub mod synthesis;

pub use config::{ProjectConfig, SynthesisRequest};
pub use declaration::{DeclarationFile, DeclaredFunction, FunctionDeclaration, FunctionMetadata};
pub use error::SynthesisError;
pub use history::{HistoryStorage, SqliteHistory, SynthesisRecord, SynthesisStatus};
pub use llm::{
    AnthropicProvider, CompletionCache, Debugger, LlmProvider, LlmResponse, Message, MessageRole,
    OpenAIProvider,
};
pub use synthesis::{Helper, SynthesizedFunction, Synthesizer};
