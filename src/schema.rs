use sqlx::SqlitePool;

pub async fn mount(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql("
        CREATE TABLE IF NOT EXISTS tarjetas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            banco TEXT NOT NULL,
            tarjeta TEXT NOT NULL,
            monto_total REAL NOT NULL,
            pago_minimo REAL NOT NULL,
            pagos TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_tarjetas_banco ON tarjetas (banco);
        CREATE INDEX IF NOT EXISTS idx_tarjetas_tarjeta ON tarjetas (tarjeta);
    ").execute(pool).await?;
    Ok(())
}
