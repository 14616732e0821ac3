mod project;
mod request;

pub use project::{DEFAULT_CACHE_DIR, PROJECT_CONFIG_FILE, ProjectConfig};
pub use request::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_OPERATIONS, DEFAULT_MODEL, DEFAULT_SKETCH, SynthesisRequest,
};
