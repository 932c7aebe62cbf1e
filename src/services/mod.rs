//! Service layer separating presentation concerns from removal logic

pub mod format;
pub mod progress;

pub use format::OutputFormatHandler;
pub use progress::{
    BatchProgressReporter, ConsoleProgressReporter, TracingProgressReporter,
};
