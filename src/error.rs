//! Prediction error taxonomy

use thiserror::Error;

pub type PredictResult<T> = Result<T, PredictError>;

/// Failure of a single prediction request.
///
/// The first four variants are caller input problems and carry the exact
/// message returned to the client. `Detection` covers everything else.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("No image data provided")]
    EmptyImage,

    #[error("Invalid image data")]
    InvalidData { cause: String },

    #[error("Invalid image format")]
    InvalidFormat,

    #[error("Image resolution too low")]
    ResolutionTooLow { width: u32, height: u32 },

    #[error("{0:#}")]
    Detection(#[from] anyhow::Error),
}

impl PredictError {
    pub fn invalid_data(cause: impl ToString) -> Self {
        Self::InvalidData {
            cause: cause.to_string(),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, PredictError::Detection(_))
    }
}
