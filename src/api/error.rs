use crate::services::analysis::AnalysisError;
use crate::services::uploads::UploadError;
use crate::views::{PageView, render_page};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

pub const GENERIC_ANALYSIS_MESSAGE: &str =
    "Something went wrong while identifying your plant. Please try again later.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

impl AppError {
    /// Text shown to the user. Analysis details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upload(UploadError::MissingFile) => {
                "Please choose an image to upload.".to_string()
            }
            AppError::Upload(UploadError::Invalid(e)) => e.message.clone(),
            AppError::Upload(UploadError::Malformed(_)) => {
                "The upload could not be read. Please try again.".to_string()
            }
            AppError::Upload(UploadError::Write(_)) => {
                "The image could not be saved. Please try again.".to_string()
            }
            AppError::Analysis(AnalysisError::Timeout) => {
                "Identification took too long. Please try again later.".to_string()
            }
            AppError::Analysis(_) => GENERIC_ANALYSIS_MESSAGE.to_string(),
        }
    }
}

// Failures render the regular page with a message; the status stays 200.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upload(UploadError::Write(e)) => {
                tracing::error!("Upload write error: {:?}", e);
            }
            AppError::Upload(e) => tracing::warn!("Rejected upload: {}", e),
            AppError::Analysis(e) => tracing::error!("Analysis error: {}", e),
        }

        let page = render_page(&PageView::with_error(self.user_message()));
        (StatusCode::OK, Html(page)).into_response()
    }
}
