use std::sync::Arc;

use axum::{body::Bytes, extract::{rejection::PathRejection, Path, State}, Json};
use serde::Serialize;

use crate::{error::Result, store::{NuevaTarjeta, Tarjeta, TarjetaUpdate}, AppState};

use super::{parse_body, path_param};

#[derive(Serialize)]
pub struct BorradoDTO {
    pub ok: bool,
}

pub async fn crear(
    State(app_state): State<Arc<AppState>>,
    payload: Bytes,
) -> Result<Json<Tarjeta>> {
    let nueva = parse_body::<NuevaTarjeta>(&payload)?;
    Ok(Json(app_state.store.create(nueva).await?))
}

pub async fn listar(State(app_state): State<Arc<AppState>>) -> Result<Json<Vec<Tarjeta>>> {
    Ok(Json(app_state.store.list().await?))
}

pub async fn obtener(
    id: std::result::Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Tarjeta>> {
    let id = path_param(id)?;
    Ok(Json(app_state.store.get(id).await?))
}

pub async fn actualizar(
    id: std::result::Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
    payload: Bytes,
) -> Result<Json<Tarjeta>> {
    let id = path_param(id)?;
    let update = parse_body::<TarjetaUpdate>(&payload)?;
    Ok(Json(app_state.store.update(id, update).await?))
}

pub async fn borrar(
    id: std::result::Result<Path<i64>, PathRejection>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<BorradoDTO>> {
    let id = path_param(id)?;
    app_state.store.delete(id).await?;
    Ok(Json(BorradoDTO { ok: true }))
}
