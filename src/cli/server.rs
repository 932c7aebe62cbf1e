//! Command line entry point of the HTTP server

use crate::{
    config::{ExecutionProvider, ServerConfig},
    models::ModelId,
};
use clap::Parser;
use std::path::PathBuf;

/// Serve background removal over HTTP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bg-remover-server")]
pub struct ServerCli {
    /// Interface to bind
    #[arg(long, env = "BG_REMOVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "BG_REMOVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Model loaded at startup and used when a request names none
    #[arg(short, long, env = "BG_REMOVER_MODEL", value_enum, default_value_t = ModelId::U2net)]
    pub model: ModelId,

    /// Non-default model sessions kept loaded (0 = load per request)
    #[arg(long, env = "BG_REMOVER_SESSION_CACHE_SIZE", default_value_t = 2)]
    pub session_cache_size: usize,

    /// Maximum number of files accepted by /remove-batch
    #[arg(long, env = "BG_REMOVER_MAX_BATCH_FILES", default_value_t = 10)]
    pub max_batch_files: usize,

    /// Maximum request body size in MiB
    #[arg(long, env = "BG_REMOVER_MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: usize,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(long, env = "BG_REMOVER_EXECUTION_PROVIDER", default_value_t = ExecutionProvider::Auto)]
    pub execution_provider: ExecutionProvider,

    /// Number of inference threads (0 = auto)
    #[arg(short, long, env = "BG_REMOVER_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Use custom model cache directory
    #[arg(long, env = "BG_REMOVER_CACHE_DIR", value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ServerCli {
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            default_model: self.model,
            max_batch_files: self.max_batch_files,
            session_cache_capacity: self.session_cache_size,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
        }
    }
}

/// Load the default model, then serve until Ctrl-C
///
/// # Errors
/// - Invalid configuration
/// - The default model cannot be loaded
/// - The address cannot be bound
#[cfg(feature = "onnx")]
pub async fn main() -> anyhow::Result<()> {
    use crate::{
        cache::ModelCache,
        config::BackendConfig,
        server::{serve, AppState},
        session::{OnnxSessionFactory, SessionFactory},
        session_cache::SessionCache,
    };
    use anyhow::Context;
    use std::sync::Arc;

    let cli = ServerCli::parse();
    let session_id = crate::tracing_config::init_cli_tracing(cli.verbose)?;
    let config = cli.server_config();
    config.validate().context("Invalid server configuration")?;

    let cache = match &cli.cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir),
        None => ModelCache::new(),
    }
    .context("Failed to initialize model cache")?;

    let backend_config = BackendConfig {
        execution_provider: cli.execution_provider,
        intra_threads: cli.threads,
        inter_threads: cli.threads,
    };
    let factory: Arc<dyn SessionFactory> = Arc::new(
        OnnxSessionFactory::new(cache, backend_config)
            .context("Failed to create session factory")?
            .with_progress(true),
    );

    tracing::info!(session_id = %session_id, model = %config.default_model, "loading default model");
    let default_session = factory
        .create_session(config.default_model)
        .await
        .with_context(|| format!("Failed to load default model {}", config.default_model))?;

    let sessions = Arc::new(SessionCache::new(
        Arc::new(default_session),
        factory,
        config.session_cache_capacity,
    ));
    serve(AppState::new(sessions, config))
        .await
        .context("Server error")
}
