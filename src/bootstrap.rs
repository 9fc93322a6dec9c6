//! Process wiring shared by the binaries.

use anyhow::Context;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;

use bookshelf_db::DatabaseModule;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// Register the `db` core module and every application module over `pool`.
pub fn build_registry(pool: &SqlitePool) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    registry.register_core(Arc::new(DatabaseModule::new(pool.clone())))?;
    modules::register_all(&mut registry, pool)?;

    tracing::info!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "modules registered"
    );
    Ok(registry)
}

/// Initialize modules, apply pending migrations, then start modules.
pub async fn prepare(
    registry: &ModuleRegistry,
    pool: &SqlitePool,
    settings: &Settings,
) -> anyhow::Result<()> {
    let ctx = InitCtx::new(settings);
    registry.init_all(&ctx).await?;

    let applied = bookshelf_db::run_migrations(pool, &registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");

    registry.start_all(&ctx).await?;
    Ok(())
}

/// Run the HTTP service until a shutdown signal arrives.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookshelf bootstrap starting"
    );

    let pool = bookshelf_db::connect(&settings.database).await?;
    let registry = build_registry(&pool)?;
    prepare(&registry, &pool, settings).await?;

    tracing::info!("bookshelf bootstrap complete");
    let served = bookshelf_http::start_server(&registry, settings).await;

    registry
        .stop_all()
        .await
        .context("module shutdown failed")?;
    served
}

/// Apply pending migrations and exit.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let pool = bookshelf_db::connect(&settings.database).await?;
    let registry = build_registry(&pool)?;

    let applied = bookshelf_db::run_migrations(&pool, &registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    pool.close().await;
    Ok(applied)
}

/// The merged OpenAPI document. Does not open a database connection.
pub fn openapi_document(settings: &Settings) -> anyhow::Result<Value> {
    let pool = bookshelf_db::connect_lazy(&settings.database)?;
    let registry = build_registry(&pool)?;
    Ok(bookshelf_http::openapi::merged_document(&registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call(app: &axum::Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn full_stack_book_lifecycle() {
        let settings = Settings::default();
        let pool = bookshelf_db::connect_in_memory().await.unwrap();
        let registry = build_registry(&pool).unwrap();
        prepare(&registry, &pool, &settings).await.unwrap();
        let app = bookshelf_http::build_router(&registry, &settings);

        let (status, created) =
            call(&app, "POST", "/api/books", r#"{"title":"Go 101","author":"A"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, book) = call(&app, "GET", &format!("/api/books/{id}"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            book,
            serde_json::json!({"id": id, "title": "Go 101", "author": "A"})
        );

        let (status, listed) = call(&app, "GET", "/api/books", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, _) = call(&app, "DELETE", &format!("/api/books/{id}"), "").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "GET", &format!("/api/books/{id}"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        registry.stop_all().await.unwrap();
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn prepare_is_repeatable() {
        let settings = Settings::default();
        let pool = bookshelf_db::connect_in_memory().await.unwrap();
        let registry = build_registry(&pool).unwrap();

        prepare(&registry, &pool, &settings).await.unwrap();
        let reapplied = bookshelf_db::run_migrations(&pool, &registry.collect_migrations())
            .await
            .unwrap();
        assert_eq!(reapplied, 0);
    }

    #[tokio::test]
    async fn openapi_document_lists_book_routes() {
        let document = openapi_document(&Settings::default()).unwrap();

        assert!(document["paths"]["/api/books"]["post"].is_object());
        assert!(document["paths"]["/api/books/{id}"]["delete"].is_object());
        assert!(document["components"]["schemas"]["Book"].is_object());
    }
}
