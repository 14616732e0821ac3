mod defaults;
mod function;
mod helper;
mod loader;
mod prompt;
mod session;
mod synthesizer;
mod validator;

pub use function::SynthesizedFunction;
pub use helper::{Helper, Registrar};
pub use loader::{CandidateLoader, LoadFailure};
pub use prompt::{code_instruction, seed_conversation};
pub use session::{LoopState, SynthesisLoop};
pub use synthesizer::Synthesizer;
pub use validator::validate;
