use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{Helper, SynthesisLoop, SynthesizedFunction};
use crate::config::{DEFAULT_CACHE_DIR, SynthesisRequest};
use crate::declaration::{DeclaredFunction, FunctionDeclaration};
use crate::error::SynthesisError;
use crate::history::{HistoryStorage, SynthesisRecord};
use crate::llm::{CompletionCache, CompletionClient, Debugger, LlmProvider, StdinDebugger};

/// Entry point for turning declarations into working functions.
///
/// Holds only shared, read-only collaborators, so independent declarations can
/// be synthesized concurrently as long as their names differ.
pub struct Synthesizer {
    provider: Arc<dyn LlmProvider>,
    cache_root: PathBuf,
    completion_cache: bool,
    history: Option<Arc<dyn HistoryStorage>>,
    debugger: Arc<dyn Debugger>,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            cache_root: PathBuf::from(DEFAULT_CACHE_DIR),
            completion_cache: true,
            history: None,
            debugger: Arc::new(StdinDebugger),
        }
    }

    pub fn cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    /// Reuse cached completions for identical conversations (on by default)
    pub fn completion_cache(mut self, enabled: bool) -> Self {
        self.completion_cache = enabled;
        self
    }

    pub fn history(mut self, storage: Arc<dyn HistoryStorage>) -> Self {
        self.history = Some(storage);
        self
    }

    /// Debugger stepped through by requests with `debug` set
    pub fn debugger(mut self, debugger: Arc<dyn Debugger>) -> Self {
        self.debugger = debugger;
        self
    }

    pub fn root(&self) -> &Path {
        &self.cache_root
    }

    /// Synthesize `declaration` under `request`.
    ///
    /// A malformed request fails before the provider is contacted.
    pub async fn implement(
        &self,
        declaration: &FunctionDeclaration,
        request: SynthesisRequest,
    ) -> Result<SynthesizedFunction, SynthesisError> {
        request.validate(&declaration.name)?;
        super::defaults::check(declaration)?;

        let name = declaration.name.as_str();
        info!(
            function = name,
            model = %request.model,
            tests = request.tests.len(),
            helpers = request.helpers.len(),
            "starting synthesis"
        );

        let mut record =
            SynthesisRecord::new(name, declaration.signature(), request.model.as_str());
        self.save(&record).await?;

        let mut client = CompletionClient::new(self.provider.as_ref(), request.model.as_str())
            .tag(format!("implementor ({})", name))
            .log(request.log || request.debug);
        if self.completion_cache {
            client = client.cache(CompletionCache::new(&self.cache_root));
        }
        if request.debug {
            client = client.debugger(self.debugger.as_ref());
        }

        let mut synthesis = SynthesisLoop::new(declaration.clone(), request, &self.cache_root);
        let result = synthesis.run(&client).await;
        record.set_attempts(synthesis.attempts().to_vec());

        match result {
            Ok(function) => {
                record.accept();
                self.save(&record).await?;
                info!(
                    function = name,
                    attempts = function.attempts(),
                    path = %function.source_path().display(),
                    "synthesis finished"
                );
                Ok(function)
            }
            Err(e) => {
                record.abort(e.to_string());
                if let Err(save_err) = self.save(&record).await {
                    warn!(function = name, error = %save_err, "failed to record aborted synthesis");
                }
                Err(e)
            }
        }
    }

    /// Synthesize a function read from a declaration file.
    ///
    /// `helpers` resolves the helper names listed in its `synthesis` table;
    /// `default_model` applies when the table names no model.
    pub async fn implement_declared(
        &self,
        declared: &DeclaredFunction,
        default_model: &str,
        helpers: &HashMap<String, Helper>,
    ) -> Result<SynthesizedFunction, SynthesisError> {
        let request = declared.request(default_model, helpers)?;
        self.implement(&declared.declaration, request).await
    }

    async fn save(&self, record: &SynthesisRecord) -> Result<(), SynthesisError> {
        match &self.history {
            Some(history) => history
                .save(record)
                .await
                .map_err(|e| SynthesisError::Storage(format!("{:#}", e))),
            None => Ok(()),
        }
    }
}
