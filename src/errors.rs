use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::editor::EditError;
use crate::export::ExportError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Model(String),
    #[error("{0}")]
    Processing(String),
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Model(_) | AppError::Processing(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }
        HttpResponse::build(status).json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<EditError> for AppError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::Validation(msg) => AppError::Validation(msg),
            EditError::Model(_) => AppError::Model(e.to_string()),
            EditError::Extraction(_) | EditError::EmptyContent => AppError::Processing(e.to_string()),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::EmptyPresentation => AppError::Validation(e.to_string()),
            _ => AppError::Processing(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_errors_map_to_status_classes() {
        let validation: AppError = EditError::Validation("bad".into()).into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let model: AppError = EditError::Model(anyhow::anyhow!("timeout")).into();
        assert_eq!(model.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let empty: AppError = EditError::EmptyContent.into();
        assert_eq!(empty.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(empty.to_string(), "Model did not return valid bullet points");
    }
}
