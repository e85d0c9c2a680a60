use std::{num::IntErrorKind, sync::Arc};

use axum::{body::Bytes, extract::{rejection::PathRejection, Path, State}, Json};
use serde::Deserialize;

use crate::{error::{AppError, Result}, store::Tarjeta, AppState};

use super::{parse_body, path_param};

#[derive(Deserialize)]
struct PagoDTO {
    pub pago: f64,
}

pub async fn agregar(
    id: std::result::Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
    payload: Bytes,
) -> Result<Json<Tarjeta>> {
    let id = path_param(id)?;
    let PagoDTO { pago } = parse_body(&payload)?;
    Ok(Json(app_state.store.append_payment(id, pago).await?))
}

pub async fn eliminar(
    params: std::result::Result<Path<(i64, String)>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Tarjeta>> {
    let (id, index) = path_param(params)?;
    let index = parse_index(&index)?;
    Ok(Json(app_state.store.remove_payment_at(id, index).await?))
}

// Integers too wide for i64 saturate: they are still integers, just never a
// position in `pagos`, so the store rejects them after the id lookup.
fn parse_index(raw: &str) -> Result<i64> {
    raw.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(AppError::Validation(format!("invalid payment index {raw:?}: {e}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing() {
        assert_eq!(parse_index("3").unwrap(), 3);
        assert_eq!(parse_index("-1").unwrap(), -1);
        assert_eq!(parse_index("99999999999999999999").unwrap(), i64::MAX);
        assert_eq!(parse_index("-99999999999999999999").unwrap(), i64::MIN);
        assert!(matches!(parse_index("uno"), Err(AppError::Validation(_))));
        assert!(matches!(parse_index(""), Err(AppError::Validation(_))));
    }
}
