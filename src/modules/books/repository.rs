//! Persistence for books.
//!
//! Handlers only see the [`BookRepository`] trait; [`SqlxBookRepository`] is the
//! SQLite implementation wired in at startup.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use bookshelf_http::error::{AppError, WriteOp};

use super::models::{format_date, parse_date, Book};

/// Outcome of a failed storage call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("book not found")]
    NotFound,

    /// A read or query failed, or a stored row could not be decoded.
    #[error("book query failed")]
    Access(#[source] sqlx::Error),

    /// An insert, update or delete failed.
    #[error("book write failed ({op:?})")]
    Write {
        op: WriteOp,
        #[source]
        source: sqlx::Error,
    },
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => AppError::NotFound,
            StoreError::Access(source) => AppError::storage_access(source),
            StoreError::Write { op, source } => AppError::storage_write(op, source),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operations for the books resource.
///
/// `update` and `delete` report the number of affected rows; zero means the
/// identifier does not exist and is not an error at this layer.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Book>>;
    async fn create(&self, book: &Book) -> StoreResult<Uuid>;
    async fn read(&self, id: Uuid) -> StoreResult<Book>;
    async fn update(&self, book: &Book) -> StoreResult<u64>;
    async fn delete(&self, id: Uuid) -> StoreResult<u64>;
}

#[derive(Debug, FromRow)]
struct BookRow {
    id: String,
    title: String,
    author: String,
    published_date: Option<String>,
    image_url: Option<String>,
    description: Option<String>,
}

impl TryFrom<BookRow> for Book {
    type Error = StoreError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|error| StoreError::Access(sqlx::Error::Decode(Box::new(error))))?;
        let published_date = row
            .published_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(|error| StoreError::Access(sqlx::Error::Decode(Box::new(error))))?;

        Ok(Book {
            id,
            title: row.title,
            author: row.author,
            published_date,
            image_url: row.image_url,
            description: row.description,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, author, published_date, image_url, description FROM books";

/// [`BookRepository`] over a SQLite pool. Ids are stored as hyphenated text.
#[derive(Clone)]
pub struct SqlxBookRepository {
    pool: SqlitePool,
}

impl SqlxBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for SqlxBookRepository {
    async fn list(&self) -> StoreResult<Vec<Book>> {
        let rows: Vec<BookRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Access)?;

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn create(&self, book: &Book) -> StoreResult<Uuid> {
        sqlx::query(
            "INSERT INTO books (id, title, author, published_date, image_url, description) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(book.id.to_string())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.published_date.map(format_date))
        .bind(&book.image_url)
        .bind(&book.description)
        .execute(&self.pool)
        .await
        .map_err(|source| StoreError::Write {
            op: WriteOp::Insert,
            source,
        })?;

        Ok(book.id)
    }

    async fn read(&self, id: Uuid) -> StoreResult<Book> {
        let row: Option<BookRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Access)?;

        match row {
            Some(row) => Book::try_from(row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn update(&self, book: &Book) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE books SET title = ?, author = ?, published_date = ?, image_url = ?, \
             description = ? WHERE id = ?",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.published_date.map(format_date))
        .bind(&book.image_url)
        .bind(&book.description)
        .bind(book.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|source| StoreError::Write {
            op: WriteOp::Update,
            source,
        })?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Write {
                op: WriteOp::Remove,
                source,
            })?;

        Ok(result.rows_affected())
    }
}
