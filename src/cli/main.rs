//! Background removal CLI
//!
//! A single command: an image path runs the single-image pipeline, a directory (or
//! `--directory`) runs the batch pipeline over its immediate image files.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, ModelCache},
    config::ExecutionProvider,
    models::ModelId,
    processor::{BackgroundRemover, DEFAULT_EXTENSIONS},
    services::ConsoleProgressReporter,
    session::SessionFactory,
};
use anyhow::Context;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

/// Remove backgrounds from images using U²-Net models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bg-remover")]
#[command(after_help = "Examples:
  bg-remover input.jpg
  bg-remover input.jpg -o output.png
  bg-remover ./images --directory
  bg-remover input.jpg --model u2net_human_seg
  bg-remover input.jpg --alpha-matting
  bg-remover input.jpg --only-mask")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image file or directory path
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = ["list_models", "clear_cache", "show_cache_dir", "show_providers"]
    )]
    pub input: Option<PathBuf>,

    /// Output file or directory path
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Process all images in a directory
    #[arg(short, long)]
    pub directory: bool,

    /// Model to use for background removal
    #[arg(short, long, value_enum, default_value_t = ModelId::U2net)]
    pub model: ModelId,

    /// Enable alpha matting for better edge quality
    #[arg(short, long)]
    pub alpha_matting: bool,

    /// Output only the mask instead of transparent image (also applies in directory mode)
    #[arg(long)]
    pub only_mask: bool,

    /// Image extensions to process when using directory mode
    #[arg(short, long, num_args = 1.., value_name = "EXT", default_values = DEFAULT_EXTENSIONS)]
    pub extensions: Vec<String>,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(long, default_value_t = ExecutionProvider::Auto)]
    pub execution_provider: ExecutionProvider,

    /// Number of inference threads (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// List available models and their cache state, then exit
    #[arg(long)]
    pub list_models: bool,

    /// Remove every downloaded model from the cache, then exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Print the model cache directory, then exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// List ONNX Runtime execution providers and their availability, then exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse arguments, build the ONNX session factory and run
///
/// # Errors
/// - Tracing or cache setup failures, before any image work starts
#[cfg(feature = "onnx")]
pub async fn main() -> anyhow::Result<std::process::ExitCode> {
    use crate::session::OnnxSessionFactory;

    let cli = Cli::parse();
    let session_id = crate::tracing_config::init_cli_tracing(cli.verbose)?;
    tracing::debug!(session_id = %session_id, model = %cli.model, "starting bg-remover");

    let cache = CliConfigBuilder::model_cache(&cli)?;

    let mut stdout = io::stdout().lock();
    if cli.show_providers {
        show_providers(&mut stdout).context("Failed to list execution providers")?;
        return Ok(std::process::ExitCode::SUCCESS);
    }
    if cli.show_cache_dir {
        writeln!(stdout, "{}", cache.cache_dir().display())?;
        return Ok(std::process::ExitCode::SUCCESS);
    }
    if cli.clear_cache {
        clear_cache(&cache, &mut stdout)?;
        return Ok(std::process::ExitCode::SUCCESS);
    }
    if cli.list_models {
        list_models(&cache, &mut stdout).context("Failed to list models")?;
        return Ok(std::process::ExitCode::SUCCESS);
    }
    drop(stdout);

    let factory = OnnxSessionFactory::new(cache, CliConfigBuilder::backend_config(&cli))
        .context("Failed to create session factory")?
        .with_progress(true);

    let code = execute(&cli, &factory, &mut io::stdout(), &mut io::stderr()).await;
    Ok(std::process::ExitCode::from(code))
}

/// Run one CLI invocation against `factory`, writing status to `out` and errors to `err`
///
/// Returns the process exit code: 1 on a missing input, a model that fails to load, a
/// non-directory in directory mode or a processing error; 0 otherwise.
pub async fn execute<O, E>(cli: &Cli, factory: &dyn SessionFactory, out: &mut O, err: &mut E) -> u8
where
    O: Write + Send,
    E: Write,
{
    match run(cli, factory, out).await {
        Ok(()) => 0,
        Err(message) => {
            if let Err(e) = writeln!(err, "{message}") {
                log::debug!("Failed to write error: {}", e);
            }
            1
        },
    }
}

/// Body of [`execute`]; the error is the full line printed to stderr
async fn run<O: Write + Send>(
    cli: &Cli,
    factory: &dyn SessionFactory,
    out: &mut O,
) -> Result<(), String> {
    let Some(input) = cli.input.as_deref() else {
        return Err("Error: an input path is required".to_string());
    };
    if !input.exists() {
        return Err(format!("Error: Input path does not exist: {}", input.display()));
    }

    let options = CliConfigBuilder::removal_options(cli, out);

    status(out, &format!("Initializing background remover with model: {}", cli.model));
    let remover = BackgroundRemover::from_factory(factory, cli.model)
        .await
        .map_err(|e| format!("Error initializing remover: {e}"))?;

    if cli.directory || input.is_dir() {
        if !input.is_dir() {
            return Err(format!("Error: {} is not a directory", input.display()));
        }

        let extensions = CliConfigBuilder::extensions(cli);
        let report = {
            let reporter = ConsoleProgressReporter::new(&mut *out);
            remover.process_directory_with_progress(
                input,
                cli.output.as_deref(),
                &extensions,
                &options,
                &reporter,
            )
        }
        .map_err(|e| format!("Error: {e}"))?;

        let successful = report.successful();
        if successful == 0 {
            status(out, "No images were processed");
        } else {
            status(out, &format!("\nSuccessfully processed {successful} images"));
            let destination = cli.output.as_ref().map_or_else(
                || format!("{}/no_bg/", input.display()),
                |o| o.display().to_string(),
            );
            status(out, &format!("Output saved to: {destination}"));
        }
        return Ok(());
    }

    let output = remover
        .remove_background(input, cli.output.as_deref(), &options)
        .map_err(|e| format!("Error: {e}"))?;
    status(out, "Background removed successfully!");
    status(out, &format!("Output saved to: {}", output.display()));
    Ok(())
}

fn status<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{line}") {
        log::debug!("Failed to write status line: {}", e);
    }
}

/// Print the supported models with their cache state
///
/// # Errors
/// - Write failures on `out`
pub fn list_models<W: Write>(cache: &ModelCache, out: &mut W) -> anyhow::Result<()> {
    let cached = cache.scan_cached_models()?;
    writeln!(out, "Available models:")?;
    for model in ModelId::ALL {
        let state = cached.iter().find(|info| info.model == model).map_or_else(
            || "not downloaded".to_string(),
            |info| format!("cached, {}", format_size(info.size_bytes)),
        );
        writeln!(
            out,
            "  {:<16} {} [{state}]",
            model.as_str(),
            model.description()
        )?;
    }
    writeln!(out, "\nCache directory: {}", cache.cache_dir().display())?;
    Ok(())
}

/// Delete every cached model and report what was removed
///
/// # Errors
/// - Failed to remove a weight file
/// - Write failures on `out`
pub fn clear_cache<W: Write>(cache: &ModelCache, out: &mut W) -> anyhow::Result<()> {
    let removed = cache
        .clear_all()
        .with_context(|| format!("Failed to clear cache at {}", cache.cache_dir().display()))?;
    if removed.is_empty() {
        writeln!(out, "No cached models in {}", cache.cache_dir().display())?;
    } else {
        for model in &removed {
            writeln!(out, "Removed {model}")?;
        }
        writeln!(
            out,
            "Cleared {} model(s) from {}",
            removed.len(),
            cache.cache_dir().display()
        )?;
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn show_providers<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Execution providers:")?;
    for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
        let state = if available { "available" } else { "unavailable" };
        writeln!(out, "  {name:<8} [{state}] {description}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bg-remover", "photo.jpg"]).unwrap();
        assert_eq!(cli.model, ModelId::U2net);
        assert_eq!(cli.extensions, DEFAULT_EXTENSIONS.to_vec());
        assert_eq!(cli.execution_provider, ExecutionProvider::Auto);
        assert!(!cli.directory && !cli.alpha_matting && !cli.only_mask);
    }

    #[test]
    fn test_model_choices_are_fixed() {
        let cli = Cli::try_parse_from(["bg-remover", "x.png", "-m", "u2net_cloth_seg"]).unwrap();
        assert_eq!(cli.model, ModelId::U2netClothSeg);
        assert!(Cli::try_parse_from(["bg-remover", "x.png", "-m", "isnet"]).is_err());
    }

    #[test]
    fn test_input_required_unless_listing() {
        assert!(Cli::try_parse_from(["bg-remover"]).is_err());
        for flag in ["--list-models", "--clear-cache", "--show-cache-dir", "--show-providers"] {
            assert!(Cli::try_parse_from(["bg-remover", flag]).is_ok(), "{flag}");
        }
    }

    #[test]
    fn test_only_mask_help_mentions_directories() {
        use clap::CommandFactory;

        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "only_mask")
            .and_then(|arg| arg.get_help())
            .map(ToString::to_string)
            .unwrap();
        assert!(help.contains("also applies in directory mode"));
    }

    #[test]
    fn test_clear_cache_removes_models_and_sidecars() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(dir.path()).unwrap();
        std::fs::write(cache.model_path(ModelId::U2net), b"a").unwrap();
        std::fs::write(cache.checksum_path(ModelId::U2net), "abc\n").unwrap();
        std::fs::write(cache.model_path(ModelId::U2netClothSeg), b"b").unwrap();

        let mut out = Vec::new();
        clear_cache(&cache, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Removed u2net\n"));
        assert!(text.contains("Removed u2net_cloth_seg\n"));
        assert!(text.contains("Cleared 2 model(s)"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let mut out = Vec::new();
        clear_cache(&cache, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("No cached models in"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_show_providers_always_lists_cpu() {
        let mut out = Vec::new();
        show_providers(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l.contains("CPU") && l.contains("[available]")));
    }

    #[test]
    fn test_list_models_reports_cache_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(dir.path()).unwrap();
        std::fs::write(cache.model_path(ModelId::U2netp), vec![0u8; 2048]).unwrap();

        let mut out = Vec::new();
        list_models(&cache, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("u2net_cloth_seg"));
        assert!(text.lines().any(|l| l.contains("u2netp ") && l.contains("cached")));
        assert!(text.lines().any(|l| l.trim_start().starts_with("u2net ") && l.contains("not downloaded")));
    }
}
