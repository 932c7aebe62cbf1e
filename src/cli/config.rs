//! Conversion of parsed CLI arguments into library configuration

use crate::cli::main_impl::Cli;
use crate::{
    cache::ModelCache,
    config::{BackendConfig, RemovalOptions},
    processor::normalize_extensions,
};
use anyhow::{Context, Result};
use std::io::Write;

pub(crate) const CONFLICTING_FLAGS_WARNING: &str =
    "Warning: --only-mask and --alpha-matting cannot be used together";

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Removal flags for this run; mask-only wins over alpha matting, with a warning on `out`
    pub(crate) fn removal_options<W: Write>(cli: &Cli, out: &mut W) -> RemovalOptions {
        let mut alpha_matting = cli.alpha_matting;
        if cli.only_mask && alpha_matting {
            if let Err(e) = writeln!(out, "{CONFLICTING_FLAGS_WARNING}") {
                log::debug!("Failed to write warning: {}", e);
            }
            alpha_matting = false;
        }
        RemovalOptions {
            alpha_matting,
            only_mask: cli.only_mask,
            ..RemovalOptions::default()
        }
    }

    /// Same thread count for intra and inter op parallelism
    pub(crate) fn backend_config(cli: &Cli) -> BackendConfig {
        BackendConfig {
            execution_provider: cli.execution_provider,
            intra_threads: cli.threads,
            inter_threads: cli.threads,
        }
    }

    pub(crate) fn extensions(cli: &Cli) -> Vec<String> {
        normalize_extensions(&cli.extensions)
    }

    pub(crate) fn model_cache(cli: &Cli) -> Result<ModelCache> {
        match &cli.cache_dir {
            Some(dir) => ModelCache::with_custom_cache_dir(dir)
                .with_context(|| format!("Failed to use cache directory {}", dir.display())),
            None => ModelCache::new().context("Failed to initialize model cache"),
        }
    }
}
