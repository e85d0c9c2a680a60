use axum::{body::Bytes, extract::{rejection::PathRejection, Path}};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

pub mod pagos;
pub mod tarjetas;

// Bodies and path parameters that do not fit the expected shape are
// rejected with 422 before anything reaches the store.
fn parse_body<T: DeserializeOwned>(payload: &Bytes) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| AppError::Validation(e.to_string()))
}

fn path_param<T>(path: std::result::Result<Path<T>, PathRejection>) -> Result<T> {
    path.map(|Path(value)| value)
        .map_err(|e| AppError::Validation(e.body_text()))
}
