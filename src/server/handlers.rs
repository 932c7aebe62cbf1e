//! Request handlers
//!
//! Every upload is checked (MIME type, output format, model name, flags) while it is
//! still in memory. Temporary files only exist inside the blocking task that processes an
//! accepted upload and are removed when their guards drop.

use super::{
    error::ApiError,
    types::{AppState, BatchItem, BatchResponse, ModelEntry, ModelsResponse, RootResponse},
};
use crate::{
    config::{OutputFormat, RemovalOptions},
    error::{BgRemovalError, Result},
    models::ModelId,
    processor::BackgroundRemover,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;

const NOT_AN_IMAGE: &str = "File must be an image";

/// One uploaded file held in memory
#[derive(Debug)]
struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

impl Upload {
    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }

    fn stem(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned())
    }

    /// Extension of the uploaded name including the dot, or empty
    fn suffix(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }
}

/// Multipart fields shared by both removal endpoints
#[derive(Debug, Default)]
struct RemovalForm {
    uploads: Vec<Upload>,
    model: Option<String>,
    alpha_matting: Option<String>,
    only_mask: Option<String>,
    output_format: Option<String>,
}

impl RemovalForm {
    async fn read(mut multipart: Multipart, file_field: &str) -> std::result::Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.uploads.push(Upload {
                    filename,
                    content_type,
                    bytes,
                });
                continue;
            }

            let value = field.text().await.map_err(multipart_error)?;
            match name.as_str() {
                "model" => form.model = Some(value),
                "alpha_matting" => form.alpha_matting = Some(value),
                "only_mask" => form.only_mask = Some(value),
                "output_format" => form.output_format = Some(value),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    fn model(&self, default: ModelId) -> std::result::Result<ModelId, ApiError> {
        match self.model.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(name) => name.parse().map_err(ApiError::from),
        }
    }

    fn output_format(&self) -> std::result::Result<OutputFormat, ApiError> {
        self.output_format
            .as_deref()
            .map_or(Ok(OutputFormat::Png), str::parse::<OutputFormat>)
            .map_err(ApiError::from)
    }

    fn options(&self, output_format: OutputFormat) -> std::result::Result<RemovalOptions, ApiError> {
        Ok(RemovalOptions {
            alpha_matting: parse_bool("alpha_matting", self.alpha_matting.as_deref())?,
            only_mask: parse_bool("only_mask", self.only_mask.as_deref())?,
            output_format,
            ..RemovalOptions::default()
        })
    }
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {}", error.body_text()))
}

/// Form boolean: true/false, 1/0, yes/no, on/off; absent means false
fn parse_bool(name: &str, value: Option<&str>) -> std::result::Result<bool, ApiError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ApiError::bad_request(format!(
            "Invalid boolean value for {name}: {value}"
        ))),
    }
}

pub async fn root() -> Json<RootResponse> {
    let endpoints = [
        ("/", "API information"),
        ("/models", "List available models"),
        ("/remove", "Remove background from single image"),
        ("/remove-batch", "Remove background from multiple images"),
    ]
    .into_iter()
    .map(|(path, description)| (path.to_string(), description.to_string()))
    .collect::<BTreeMap<_, _>>();

    Json(RootResponse {
        message: "Background Remover API".to_string(),
        endpoints,
    })
}

pub async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: ModelId::ALL.into_iter().map(ModelEntry::from).collect(),
    })
}

/// `POST /remove`
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let form = RemovalForm::read(multipart, "file").await?;
    let Some(upload) = form.uploads.first() else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    if !upload.is_image() {
        return Err(ApiError::bad_request(NOT_AN_IMAGE));
    }
    let output_format = form.output_format()?;
    let model = form.model(state.sessions.default_model())?;
    let options = form.options(output_format)?;

    let session = state
        .sessions
        .get(model)
        .await
        .map_err(|e| ApiError::processing(&e))?;
    let remover = BackgroundRemover::new(session);

    tracing::info!(
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        model = %model,
        "processing upload"
    );

    let bytes = upload.bytes.clone();
    let suffix = upload.suffix();
    let temp_dir = state.temp_dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        process_upload(&remover, &bytes, &suffix, &options, temp_dir.as_deref())
    })
    .await
    .map_err(|e| ApiError::processing(&BgRemovalError::internal(format!("Processing task failed: {e}"))))?
    .map_err(|e| ApiError::processing(&e))?;

    let extension = output_format.extension();
    let headers = [
        (header::CONTENT_TYPE, output_format.mime_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}_no_bg.{extension}", upload.stem()),
        ),
    ];
    Ok((headers, output).into_response())
}

/// `POST /remove-batch`
#[instrument(skip_all)]
pub async fn remove_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Json<BatchResponse>, ApiError> {
    let form = RemovalForm::read(multipart, "files").await?;

    let max_files = state.config.max_batch_files;
    if form.uploads.len() > max_files {
        return Err(ApiError::bad_request(format!(
            "Maximum {max_files} images per batch"
        )));
    }
    if form.uploads.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let model = form.model(state.sessions.default_model())?;
    // Batch output is always PNG
    let options = form.options(OutputFormat::Png)?;

    let session = state
        .sessions
        .get(model)
        .await
        .map_err(|e| ApiError::processing(&e))?;
    let remover = BackgroundRemover::new(session);

    let mut results = Vec::with_capacity(form.uploads.len());
    for upload in form.uploads {
        if !upload.is_image() {
            results.push(BatchItem::failed(upload.filename, NOT_AN_IMAGE));
            continue;
        }

        let remover = remover.clone();
        let suffix = upload.suffix();
        let temp_dir = state.temp_dir.clone();
        let bytes = upload.bytes;
        let outcome = tokio::task::spawn_blocking(move || {
            process_upload(&remover, &bytes, &suffix, &options, temp_dir.as_deref())
        })
        .await
        .unwrap_or_else(|e| Err(BgRemovalError::internal(format!("Processing task failed: {e}"))));

        results.push(match outcome {
            Ok(output) => BatchItem::succeeded(upload.filename, output.len() as u64),
            Err(e) => {
                tracing::warn!(filename = %upload.filename, error = %e, "batch item failed");
                BatchItem::failed(upload.filename, e.to_string())
            },
        });
    }

    Ok(Json(BatchResponse::from(results)))
}

/// Run the single-image pipeline between two temporary files and return the output bytes
fn process_upload(
    remover: &BackgroundRemover,
    bytes: &[u8],
    input_suffix: &str,
    options: &RemovalOptions,
    temp_dir: Option<&Path>,
) -> Result<Vec<u8>> {
    let mut input = temp_file(temp_dir, input_suffix)?;
    input.write_all(bytes)?;
    input.flush()?;

    let output = temp_file(temp_dir, &format!(".{}", options.output_format.extension()))?;
    let written = remover.remove_background(input.path(), Some(output.path()), options)?;
    fs::read(&written).map_err(|e| BgRemovalError::file_io_error("read", &written, &e))
}

fn temp_file(dir: Option<&Path>, suffix: &str) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("bg-remover-").suffix(suffix);
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    file.map_err(|e| {
        BgRemovalError::file_io_error(
            "create temporary file in",
            dir.map_or_else(std::env::temp_dir, PathBuf::from),
            &e,
        )
    })
}
