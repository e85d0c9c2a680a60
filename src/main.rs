use std::sync::Arc;

use anyhow::Context;
use axum::{routing::{delete, get, post}, Router};
use config::{Config, Listen};
use sqlx::sqlite::SqlitePoolOptions;
use store::TarjetaStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod config;
mod error;
mod handlers;
mod logger;
mod schema;
mod store;

pub struct AppState {
    store: TarjetaStore,
}

fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tarjetas", get(handlers::tarjetas::listar).post(handlers::tarjetas::crear))
        .route("/tarjetas/", get(handlers::tarjetas::listar).post(handlers::tarjetas::crear))
        .route("/tarjetas/{id}", get(handlers::tarjetas::obtener)
            .put(handlers::tarjetas::actualizar)
            .delete(handlers::tarjetas::borrar))
        .route("/tarjetas/{id}/pagos", post(handlers::pagos::agregar))
        .route("/tarjetas/{id}/pagos/{index}", delete(handlers::pagos::eliminar))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logger::init(config.json_logs);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool_size)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("error connecting to {}", config.database_url))?;
    schema::mount(&pool).await.context("error creating schema")?;

    let app = app(Arc::new(AppState { store: TarjetaStore::new(pool) }));

    match config.listen {
        Listen::Tcp(addr) => {
            let listener = tokio::net::TcpListener::bind(addr).await
                .with_context(|| format!("error listening on {addr}"))?;
            tracing::info!(%addr, "tarjetas service listening");
            axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        }
        Listen::Unix(socket_path) => {
            if let Err(e) = tokio::fs::remove_file(&socket_path).await {
                tracing::warn!(path = %socket_path.display(), error = %e, "unable to unlink socket path");
            }
            let listener = tokio::net::UnixListener::bind(&socket_path)
                .with_context(|| format!("error listening to socket {}", socket_path.display()))?;
            tracing::info!(path = %socket_path.display(), "tarjetas service listening");
            axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        }
    }

    tracing::info!("tarjetas service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{header, Method, Request, StatusCode}};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let pool = store::tests::memory_pool().await;
        app(Arc::new(AppState { store: TarjetaStore::new(pool) }))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn visa() -> Value {
        json!({"banco": "BancoX", "tarjeta": "Visa", "monto_total": 1000.0, "pago_minimo": 50})
    }

    #[tokio::test]
    async fn full_walkthrough() {
        let app = test_app().await;

        let (status, body) = send(&app, Method::POST, "/tarjetas/", Some(visa())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({
            "id": 1, "banco": "BancoX", "tarjeta": "Visa",
            "monto_total": 1000.0, "pago_minimo": 50.0, "pagos": []
        }));

        let (_, body) = send(&app, Method::POST, "/tarjetas/1/pagos", Some(json!({"pago": 100.0}))).await;
        assert_eq!(body["pagos"], json!([100.0]));
        let (_, body) = send(&app, Method::POST, "/tarjetas/1/pagos", Some(json!({"pago": 50}))).await;
        assert_eq!(body["pagos"], json!([100.0, 50.0]));
        let (status, body) = send(&app, Method::DELETE, "/tarjetas/1/pagos/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagos"], json!([50.0]));

        let (_, body) = send(&app, Method::GET, "/tarjetas/", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, Method::DELETE, "/tarjetas/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (status, body) = send(&app, Method::GET, "/tarjetas/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Tarjeta no encontrada"}));
    }

    #[tokio::test]
    async fn update_replaces_pagos() {
        let app = test_app().await;
        send(&app, Method::POST, "/tarjetas", Some(visa())).await;
        send(&app, Method::POST, "/tarjetas/1/pagos", Some(json!({"pago": 1.0}))).await;

        let update = json!({
            "banco": "BancoY", "tarjeta": "Amex",
            "monto_total": 10, "pago_minimo": 2.5, "pagos": [7.0, 8.0]
        });
        let (status, body) = send(&app, Method::PUT, "/tarjetas/1", Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["banco"], "BancoY");
        assert_eq!(body["pagos"], json!([7.0, 8.0]));

        let (_, body) = send(&app, Method::GET, "/tarjetas/", None).await;
        assert_eq!(body[0]["tarjeta"], "Amex");
        assert_eq!(body[0]["monto_total"], json!(10.0));
        assert_eq!(body[0]["pagos"], json!([7.0, 8.0]));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = test_app().await;
        send(&app, Method::POST, "/tarjetas/", Some(visa())).await;

        let (status, body) = send(&app, Method::DELETE, "/tarjetas/1/pagos/0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"detail": "Índice de pago no válido"}));

        let (status, _) = send(&app, Method::DELETE, "/tarjetas/1/pagos/-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::DELETE, "/tarjetas/1/pagos/99999999999999999999", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"detail": "Índice de pago no válido"}));

        let (status, _) = send(&app, Method::DELETE, "/tarjetas/9/pagos/99999999999999999999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/tarjetas/1/pagos/primero", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::DELETE, "/tarjetas/9/pagos/0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::POST, "/tarjetas/9/pagos", Some(json!({"pago": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/tarjetas/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let update = json!({"banco": "B", "tarjeta": "T", "monto_total": 1, "pago_minimo": 1, "pagos": []});
        let (status, _) = send(&app, Method::PUT, "/tarjetas/9", Some(update)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_input_is_unprocessable() {
        let app = test_app().await;

        let (status, _) = send(&app, Method::POST, "/tarjetas/", Some(json!({"banco": "B"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let bad_type = json!({"banco": "B", "tarjeta": "T", "monto_total": "mucho", "pago_minimo": 1});
        let (status, _) = send(&app, Method::POST, "/tarjetas/", Some(bad_type)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        send(&app, Method::POST, "/tarjetas/", Some(visa())).await;
        let missing_pagos = json!({"banco": "B", "tarjeta": "T", "monto_total": 1, "pago_minimo": 1});
        let (status, _) = send(&app, Method::PUT, "/tarjetas/1", Some(missing_pagos)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::POST, "/tarjetas/1/pagos", Some(json!({"pago": null}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::GET, "/tarjetas/abc", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = send(&app, Method::GET, "/tarjetas/1", None).await;
        assert!(body["pagos"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let app = test_app().await;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/tarjetas/")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://example.com"
        );
    }
}
