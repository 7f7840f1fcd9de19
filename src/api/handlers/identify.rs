use crate::AppState;
use crate::api::error::AppError;
use crate::services::uploads::{UploadError, UploadRecord};
use crate::utils::validation::ValidationError;
use crate::views::{Identification, PageView, render_page};
use axum::{
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::Html,
};

/// Form field the page submits the photo under.
pub const FILE_FIELD: &str = "image";

pub const TOO_LARGE_MESSAGE: &str = "The image is larger than the allowed upload size.";

pub async fn index() -> Html<String> {
    Html(render_page(&PageView::empty()))
}

fn multipart_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::Invalid(ValidationError {
            code: "FILE_TOO_LARGE",
            message: TOO_LARGE_MESSAGE.to_string(),
        })
    } else {
        UploadError::Malformed(e.body_text())
    }
}

/// Stages the first file field of the form.
async fn stage_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadRecord, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let is_file = field.name() == Some(FILE_FIELD) || field.file_name().is_some();
        if !is_file {
            continue;
        }

        let original_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(multipart_error)?;

        let record = state
            .uploads
            .save(original_name.as_deref(), content_type.as_deref(), &data)
            .await?;
        return Ok(record);
    }

    Err(UploadError::MissingFile.into())
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    let multipart = multipart.map_err(|e| UploadError::Malformed(e.body_text()))?;
    let record = stage_upload(&state, multipart).await?;

    // The staged file is left for the sweeper if analysis fails.
    let text = state.analyzer.identify(&record).await?;

    tracing::info!(file = %record.file_name, "✅ Plant identified");

    Ok(Html(render_page(&PageView::with_result(Identification {
        text,
        image_path: record.public_path(),
    }))))
}
