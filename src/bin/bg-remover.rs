//! Background removal CLI
//!
//! Removes backgrounds from a single image or from every image in a directory.

use bg_remover::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    cli::main().await
}
