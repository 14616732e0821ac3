use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rhai::Dynamic;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fnsynth::config::DEFAULT_CACHE_DIR;
use fnsynth::history::HistoryStorage;
use fnsynth::synthesis::SynthesisLoop;
use fnsynth::{
    AnthropicProvider, DeclarationFile, Helper, LlmProvider, OpenAIProvider, ProjectConfig,
    SqliteHistory, SynthesisStatus, Synthesizer,
};

#[derive(Parser)]
#[command(name = "fnsynth")]
#[command(version)]
#[command(about = "Synthesize Rhai functions from declarations with an LLM", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// LLM provider to use (anthropic, openai)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model used when a declaration does not name one
    #[arg(long, global = true)]
    model: Option<String>,

    /// Root for cached completions, implementations and history
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Always ask the provider, ignoring cached completions
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize every function declared in the given files
    Run {
        /// Declaration files or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the seed conversation for a declared function
    Prompt {
        /// Declaration file
        file: PathBuf,
        /// Name of the declared function
        name: String,
    },
    /// List recorded syntheses
    History {
        /// Only show syntheses with this status (in_progress, accepted, aborted)
        #[arg(long)]
        status: Option<SynthesisStatus>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive("info".parse().expect("valid log directive"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the provider and the model it uses when none is configured
fn create_provider(provider: &str) -> Result<(Arc<dyn LlmProvider>, &'static str)> {
    match provider {
        "anthropic" => Ok((
            Arc::new(AnthropicProvider::from_env()?),
            AnthropicProvider::default_model(),
        )),
        "openai" => Ok((
            Arc::new(OpenAIProvider::from_env()?),
            OpenAIProvider::default_model(),
        )),
        _ => anyhow::bail!("unknown provider: {}", provider),
    }
}

/// Expand glob patterns; a pattern without matches is an error.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .with_context(|| format!("invalid pattern: {}", pattern))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("failed to expand pattern: {}", pattern))?;
        if matches.is_empty() {
            anyhow::bail!("no declaration files match {}", pattern);
        }
        paths.extend(matches);
    }
    Ok(paths)
}

async fn run(cli: &Cli, config: &ProjectConfig, patterns: &[String]) -> Result<()> {
    let paths = expand_paths(patterns)?;
    let files = paths
        .iter()
        .map(|path| DeclarationFile::load(path).map(|file| (path, file)))
        .collect::<Result<Vec<_>>>()?;

    let provider_name = cli
        .provider
        .clone()
        .or_else(|| config.provider.clone())
        .unwrap_or_else(|| "openai".to_string());
    let (provider, provider_model) =
        create_provider(&provider_name).context("failed to create LLM provider")?;
    let default_model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| provider_model.to_string());

    let cache_root = cli.cache_dir.clone().unwrap_or_else(|| config.cache_root());
    let mut synthesizer = Synthesizer::new(provider)
        .cache_root(&cache_root)
        .completion_cache(!cli.no_cache && config.is_completion_cache());
    if config.is_save_history() {
        let history = SqliteHistory::in_cache_root(&cache_root)
            .context("failed to open synthesis history")?;
        synthesizer = synthesizer.history(Arc::new(history));
    }

    info!(
        provider = %provider_name,
        model = %default_model,
        cache = %cache_root.display(),
        files = files.len(),
        "synthesizing declarations"
    );

    // Declared helpers, then every accepted function, are visible to later declarations
    let mut helpers: HashMap<String, Helper> = HashMap::new();
    for (path, file) in &files {
        for source in &file.helpers {
            let helper = source
                .to_helper()
                .with_context(|| format!("invalid helper in {}", path.display()))?;
            helpers.insert(helper.name().to_string(), helper);
        }

        for declared in &file.functions {
            let function = synthesizer
                .implement_declared(declared, &default_model, &helpers)
                .await?;

            println!("{}", function.signature());
            for example in &declared.examples {
                match function.eval::<Dynamic>(example) {
                    Ok(value) => println!("  {} => {}", example, value),
                    Err(e) => println!("  {} => error: {}", example, e),
                }
            }

            helpers.insert(function.name().to_string(), Helper::from(&function));
        }
    }

    Ok(())
}

fn prompt(cli: &Cli, config: &ProjectConfig, file: &Path, name: &str) -> Result<()> {
    let declarations = DeclarationFile::load(file)?;
    let declared = declarations
        .function(name)
        .with_context(|| format!("no function named {:?} in {}", name, file.display()))?;

    // Earlier functions are only needed for their declarations here
    let mut helpers: HashMap<String, Helper> = HashMap::new();
    for source in &declarations.helpers {
        helpers.insert(source.declaration.name.clone(), source.to_helper()?);
    }
    for earlier in declarations
        .functions
        .iter()
        .take_while(|f| f.declaration.name != name)
    {
        helpers.insert(
            earlier.declaration.name.clone(),
            Helper::native(earlier.declaration.clone(), |_| {}),
        );
    }

    let model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| fnsynth::config::DEFAULT_MODEL.to_string());
    let request = declared.request(&model, &helpers)?;
    request.validate(name)?;

    let synthesis = SynthesisLoop::new(declared.declaration.clone(), request, DEFAULT_CACHE_DIR);
    for message in synthesis.conversation() {
        println!("--- {} ---\n{}\n", message.role, message.content);
    }

    Ok(())
}

async fn history(cli: &Cli, config: &ProjectConfig, status: Option<SynthesisStatus>) -> Result<()> {
    let cache_root = cli.cache_dir.clone().unwrap_or_else(|| config.cache_root());
    let storage = SqliteHistory::in_cache_root(&cache_root)?;

    let records: Vec<_> = storage
        .list()
        .await?
        .into_iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect();

    if records.is_empty() {
        println!("No syntheses recorded.");
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:<9} {:<20} FUNCTION",
        "ID", "STATUS", "ATTEMPTS", "MODEL"
    );
    for record in records {
        println!("{}", record);
        if let Some(error) = &record.error {
            println!("{:<10} {}", "", error);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ProjectConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring invalid configuration");
        ProjectConfig::default()
    });

    let result = match &cli.command {
        Commands::Run { paths } => run(&cli, &config, paths).await,
        Commands::Prompt { file, name } => prompt(&cli, &config, file, name),
        Commands::History { status } => history(&cli, &config, *status).await,
    };

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "command failed");
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
