//! Command-line frontends
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "onnx")]
pub use main_impl::main;
pub use main_impl::{execute, list_models, Cli};
