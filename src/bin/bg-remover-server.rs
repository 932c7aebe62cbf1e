//! Background removal HTTP server
//!
//! Listens on 0.0.0.0:8000 by default; see `--help` for the environment overrides.

use bg_remover::cli::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::main().await
}
