use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};

const COLUMNS: &str = "id, banco, tarjeta, monto_total, pago_minimo, CAST(pagos AS TEXT) AS pagos";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tarjeta {
    pub id: i64,
    pub banco: String,
    pub tarjeta: String,
    pub monto_total: f64,
    pub pago_minimo: f64,
    pub pagos: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NuevaTarjeta {
    pub banco: String,
    pub tarjeta: String,
    pub monto_total: f64,
    pub pago_minimo: f64,
}

/// Full replacement of every mutable field, `pagos` included.
#[derive(Debug, Clone, Deserialize)]
pub struct TarjetaUpdate {
    pub banco: String,
    pub tarjeta: String,
    pub monto_total: f64,
    pub pago_minimo: f64,
    pub pagos: Vec<f64>,
}

#[derive(sqlx::FromRow)]
struct TarjetaRow {
    id: i64,
    banco: String,
    tarjeta: String,
    monto_total: f64,
    pago_minimo: f64,
    pagos: Option<String>,
}

impl From<TarjetaRow> for Tarjeta {
    fn from(row: TarjetaRow) -> Tarjeta {
        let pagos = parse_pagos(row.id, row.pagos.as_deref());
        Tarjeta {
            id: row.id,
            banco: row.banco,
            tarjeta: row.tarjeta,
            monto_total: row.monto_total,
            pago_minimo: row.pago_minimo,
            pagos,
        }
    }
}

// Legacy rows may hold NULL, an object or a mixed array in `pagos`.
// Anything that is not an array of numbers reads as empty.
fn parse_pagos(id: i64, raw: Option<&str>) -> Vec<f64> {
    let Some(raw) = raw else {
        tracing::warn!(id, "pagos is NULL, treating as empty");
        return Vec::new();
    };
    match serde_json::from_str::<Vec<f64>>(raw) {
        Ok(pagos) => pagos,
        Err(e) => {
            tracing::warn!(id, error = %e, "pagos is not a list of numbers, treating as empty");
            Vec::new()
        }
    }
}

fn encode_pagos(pagos: &[f64]) -> Result<String> {
    Ok(serde_json::to_string(pagos)?)
}

/// Owns every Tarjeta record. Each call checks a connection out of the pool
/// and returns it when the call ends, on success or failure.
#[derive(Clone)]
pub struct TarjetaStore {
    pool: SqlitePool,
}

impl TarjetaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, nueva: NuevaTarjeta) -> Result<Tarjeta> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, TarjetaRow>(&format!("
            INSERT INTO tarjetas (banco, tarjeta, monto_total, pago_minimo, pagos)
            VALUES (?, ?, ?, ?, '[]')
            RETURNING {COLUMNS}
        "))
        .bind(&nueva.banco)
        .bind(&nueva.tarjeta)
        .bind(nueva.monto_total)
        .bind(nueva.pago_minimo)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(id = row.id, banco = %row.banco, "tarjeta created");
        Ok(row.into())
    }

    pub async fn list(&self) -> Result<Vec<Tarjeta>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, TarjetaRow>(&format!("SELECT {COLUMNS} FROM tarjetas ORDER BY id"))
            .fetch_all(&mut *conn)
            .await?;

        tracing::debug!(count = rows.len(), "listed tarjetas");
        Ok(rows.into_iter().map(Tarjeta::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Tarjeta> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query_as::<_, TarjetaRow>(&format!("SELECT {COLUMNS} FROM tarjetas WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Tarjeta::from)
            .ok_or(AppError::NotFound)
    }

    pub async fn update(&self, id: i64, update: TarjetaUpdate) -> Result<Tarjeta> {
        let pagos = encode_pagos(&update.pagos)?;
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, TarjetaRow>(&format!("
            UPDATE tarjetas
            SET banco = ?, tarjeta = ?, monto_total = ?, pago_minimo = ?, pagos = ?
            WHERE id = ?
            RETURNING {COLUMNS}
        "))
        .bind(&update.banco)
        .bind(&update.tarjeta)
        .bind(update.monto_total)
        .bind(update.pago_minimo)
        .bind(pagos)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;

        tracing::info!(id, "tarjeta updated");
        Ok(row.into())
    }

    pub async fn append_payment(&self, id: i64, pago: f64) -> Result<Tarjeta> {
        self.modify_pagos(id, |pagos| {
            pagos.push(pago);
            Ok(())
        })
        .await
    }

    pub async fn remove_payment_at(&self, id: i64, index: i64) -> Result<Tarjeta> {
        self.modify_pagos(id, |pagos| {
            let index = usize::try_from(index).map_err(|_| AppError::InvalidPaymentIndex)?;
            if index >= pagos.len() {
                return Err(AppError::InvalidPaymentIndex);
            }
            pagos.remove(index);
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("DELETE FROM tarjetas WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!(id, "tarjeta deleted");
        Ok(())
    }

    // Read, mutate and write back `pagos` inside one transaction. IMMEDIATE
    // takes the write lock up front so concurrent writers queue on the busy
    // timeout instead of failing the lock upgrade. A rejected mutation drops
    // the transaction, which rolls it back.
    async fn modify_pagos<F>(&self, id: i64, mutate: F) -> Result<Tarjeta>
    where
        F: FnOnce(&mut Vec<f64>) -> Result<()>,
    {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let mut tarjeta: Tarjeta = sqlx::query_as::<_, TarjetaRow>(&format!("SELECT {COLUMNS} FROM tarjetas WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?
            .into();

        mutate(&mut tarjeta.pagos)?;

        sqlx::query("UPDATE tarjetas SET pagos = ? WHERE id = ?")
            .bind(encode_pagos(&tarjeta.pagos)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(id, pagos = tarjeta.pagos.len(), "pagos updated");
        Ok(tarjeta)
    }
}
