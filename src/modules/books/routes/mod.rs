//! HTTP handlers for the books resource.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use bookshelf_http::error::AppError;

use super::models::{BookDto, BookForm, CreatedBook, DeletedBook};
use super::repository::BookRepository;

/// Shared handler state; cloned per request.
#[derive(Clone)]
pub struct BooksState {
    pub repository: Arc<dyn BookRepository>,
}

/// Routes relative to the module mount point.
pub fn router(repository: Arc<dyn BookRepository>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(read_book).put(update_book).delete(delete_book))
        .with_state(BooksState { repository })
}

/// Resolve the `{id}` segment. Segments that are not valid percent-encoded
/// UTF-8 are rejected the same way as malformed UUIDs.
fn parse_id(path: Result<Path<String>, PathRejection>) -> Result<Uuid, AppError> {
    let Path(raw) = path.map_err(|rejection| AppError::invalid_param(rejection.body_text()))?;
    Uuid::parse_str(&raw).map_err(|_| AppError::invalid_param(raw))
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<Vec<BookDto>>, AppError> {
    let books = state.repository.list().await?;
    Ok(Json(books.iter().map(BookDto::from).collect()))
}

async fn create_book(
    State(state): State<BooksState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let form = BookForm::parse(&body)?;
    let book = form.into_record(Uuid::new_v4());

    let id = state.repository.create(&book).await?;
    tracing::info!(book_id = %id, "book created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/books/{id}"))],
        Json(CreatedBook { id: id.to_string() }),
    ))
}

async fn read_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<BookDto>, AppError> {
    let id = parse_id(path)?;
    let book = state.repository.read(id).await?;
    Ok(Json(BookDto::from(&book)))
}

async fn update_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Json<BookDto>, AppError> {
    let id = parse_id(path)?;
    let book = BookForm::parse(&body)?.into_record(id);

    let rows = state.repository.update(&book).await?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(book_id = %id, "book updated");
    Ok(Json(BookDto::from(&book)))
}

async fn delete_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DeletedBook>, AppError> {
    let id = parse_id(path)?;

    let rows = state.repository.delete(id).await?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(book_id = %id, "book deleted");
    Ok(Json(DeletedBook {
        id: id.to_string(),
        status: "deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::Book;
    use crate::modules::books::repository::{SqlxBookRepository, StoreError, StoreResult};
    use crate::modules::books::BooksModule;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use bookshelf_kernel::Module;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    async fn app() -> Router {
        let pool = bookshelf_db::connect_in_memory().await.unwrap();
        let module = BooksModule::new(Arc::new(SqlxBookRepository::new(pool.clone())));
        let migrations: Vec<_> = module
            .migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        bookshelf_db::run_migrations(&pool, &migrations).await.unwrap();
        module.routes()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |text| Body::from(text.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Repository that counts calls and stores nothing.
    #[derive(Default)]
    struct CountingRepository {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BookRepository for CountingRepository {
        async fn list(&self) -> StoreResult<Vec<Book>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn create(&self, book: &Book) -> StoreResult<Uuid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(book.id)
        }

        async fn read(&self, _id: Uuid) -> StoreResult<Book> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::NotFound)
        }

        async fn update(&self, _book: &Book) -> StoreResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn delete(&self, _id: Uuid) -> StoreResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    /// Repository whose every call fails as the driver would.
    struct BrokenRepository;

    fn driver_failure() -> StoreError {
        StoreError::Access(sqlx::Error::Protocol(
            "database disk image is malformed".to_string(),
        ))
    }

    #[async_trait]
    impl BookRepository for BrokenRepository {
        async fn list(&self) -> StoreResult<Vec<Book>> {
            Err(driver_failure())
        }

        async fn create(&self, _book: &Book) -> StoreResult<Uuid> {
            Err(driver_failure())
        }

        async fn read(&self, _id: Uuid) -> StoreResult<Book> {
            Err(driver_failure())
        }

        async fn update(&self, _book: &Book) -> StoreResult<u64> {
            Err(driver_failure())
        }

        async fn delete(&self, _id: Uuid) -> StoreResult<u64> {
            Err(driver_failure())
        }
    }

    #[tokio::test]
    async fn create_read_delete_scenario() {
        let app = app().await;

        let (status, created) =
            send(&app, "POST", "/", Some(r#"{"title":"Go 101","author":"A"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let (status, book) = send(&app, "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book, json!({"id": id, "title": "Go 101", "author": "A"}));

        let (status, deleted) = send(&app, "DELETE", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["status"], "deleted");

        let (status, body) = send(&app, "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no data found");
    }

    #[tokio::test]
    async fn create_sets_location_header() {
        let app = app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"title":"T","author":"A"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/api/books/"));
    }

    #[tokio::test]
    async fn list_on_empty_store_is_empty_array() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn list_returns_created_books() {
        let app = app().await;
        send(&app, "POST", "/", Some(r#"{"title":"One","author":"A"}"#)).await;
        send(&app, "POST", "/", Some(r#"{"title":"Two","author":"B"}"#)).await;

        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn update_replaces_and_is_idempotent() {
        let app = app().await;
        let (_, created) = send(
            &app,
            "POST",
            "/",
            Some(r#"{"title":"Draft","author":"A","description":"rough"}"#),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let form = r#"{"title":"Final","author":"B","published_date":"2020-02-29"}"#;

        let (status, first) = send(&app, "PUT", &format!("/{id}"), Some(form)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            first,
            json!({"id": id, "title": "Final", "author": "B", "published_date": "2020-02-29"})
        );

        let (status, second) = send(&app, "PUT", &format!("/{id}"), Some(form)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);

        let (_, stored) = send(&app, "GET", &format!("/{id}"), None).await;
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found_everywhere() {
        let app = app().await;
        let ghost = Uuid::new_v4();
        let form = r#"{"title":"T","author":"A"}"#;

        let (status, _) = send(&app, "GET", &format!("/{ghost}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "PUT", &format!("/{ghost}"), Some(form)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send(&app, "DELETE", &format!("/{ghost}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn malformed_identifier_never_reaches_the_store() {
        let repository = Arc::new(CountingRepository::default());
        let app = router(repository.clone());
        let form = r#"{"title":"T","author":"A"}"#;

        for (method, body) in [("GET", None), ("PUT", Some(form)), ("DELETE", None)] {
            let (status, response) = send(&app, method, "/not-a-uuid", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
            assert_eq!(response["error"], "invalid url param-id");
            assert_eq!(response["code"], "validation_failed");
        }

        assert_eq!(repository.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_form_reports_every_violation() {
        let repository = Arc::new(CountingRepository::default());
        let app = router(repository.clone());

        let (status, body) = send(&app, "POST", "/", Some(r#"{"image_url":"nope"}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["errors"],
            json!([
                "title is a required field",
                "author is a required field",
                "image_url must be a valid http or https URL"
            ])
        );
        assert_eq!(repository.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_failure() {
        let app = app().await;
        let (status, body) = send(&app, "POST", "/", Some("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "json decode failure");
        assert_eq!(body["code"], "decode_failed");
    }

    #[tokio::test]
    async fn storage_failure_on_read_is_a_server_error() {
        let app = router(Arc::new(BrokenRepository));

        let (status, body) = send(&app, "GET", &format!("/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "db data access failure");
        assert_eq!(body["code"], "storage_access_failed");
        assert!(!body.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn undecodable_identifier_uses_the_error_envelope() {
        let repository = Arc::new(CountingRepository::default());
        let app = router(repository.clone());

        for method in ["GET", "DELETE"] {
            let (status, body) = send(&app, method, "/%FF", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
            assert_eq!(body["error"], "invalid url param-id");
            assert_eq!(body["code"], "validation_failed");
        }
        assert_eq!(repository.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_with_zero_rows_is_not_found() {
        let repository = Arc::new(CountingRepository::default());
        let app = router(repository.clone());

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/{}", Uuid::new_v4()),
            Some(r#"{"title":"T","author":"A"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(repository.calls.load(Ordering::SeqCst), 1);
    }
}
