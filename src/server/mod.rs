//! HTTP surface for background removal
//!
//! # Endpoints
//!
//! - `GET /` - API information
//! - `GET /models` - The four supported models
//! - `POST /remove` - Remove the background of one uploaded image (multipart `file`)
//! - `POST /remove-batch` - Remove the background of up to ten images (multipart `files`)
//!
//! The default session is loaded by the caller and injected through [`AppState`]; other
//! models are served from a bounded [`SessionCache`](crate::session_cache::SessionCache).
//!
//! ```bash
//! curl -F "file=@photo.jpg" -F "output_format=webp" http://localhost:8000/remove -o out.webp
//! curl -F "files=@a.jpg" -F "files=@b.png" -F "model=u2netp" http://localhost:8000/remove-batch
//! ```

mod app;
mod error;
mod handlers;
mod types;

pub use app::{create_router, serve};
pub use error::ApiError;
pub use types::{
    AppState, BatchItem, BatchResponse, ErrorResponse, ModelEntry, ModelsResponse, RootResponse,
};
