use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};
use uuid::Uuid;

use bookshelf_http::error::AppError;

pub const TITLE_MAX_CHARS: usize = 255;
pub const AUTHOR_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value, DATE_FORMAT)
}

/// Render a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    // The format only has numeric components, which cannot fail to render.
    date.format(DATE_FORMAT).unwrap_or_default()
}

/// Persisted book record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub published_date: Option<Date>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Client-facing view of a [`Book`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDto {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Book> for BookDto {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.to_string(),
            title: book.title.clone(),
            author: book.author.clone(),
            published_date: book.published_date.map(format_date),
            image_url: book.image_url.clone(),
            description: book.description.clone(),
        }
    }
}

/// Body of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBook {
    pub id: String,
}

/// Body of a successful delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedBook {
    pub id: String,
    pub status: String,
}

/// Wire shape before validation; every field may be missing.
#[derive(Debug, Default, Deserialize)]
struct RawBookForm {
    title: Option<String>,
    author: Option<String>,
    published_date: Option<String>,
    image_url: Option<String>,
    description: Option<String>,
}

/// Validated create/update input. Never carries the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    pub published_date: Option<Date>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

impl BookForm {
    /// Decode and validate a request body.
    ///
    /// Malformed JSON, or JSON of the wrong shape, is a decode failure. Field
    /// constraint violations are all collected before failing.
    pub fn parse(raw: &[u8]) -> Result<Self, AppError> {
        let raw: RawBookForm = serde_json::from_slice(raw).map_err(AppError::Decode)?;
        let mut errors = Vec::new();

        let title = required_text(raw.title, "title", TITLE_MAX_CHARS, &mut errors);
        let author = required_text(raw.author, "author", AUTHOR_MAX_CHARS, &mut errors);

        let published_date = raw
            .published_date
            .and_then(|value| match parse_date(&value) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(
                        "published_date must be a valid date in YYYY-MM-DD format".to_string(),
                    );
                    None
                }
            });

        let image_url = raw.image_url.filter(|value| {
            let valid = url::Url::parse(value)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                errors.push("image_url must be a valid http or https URL".to_string());
            }
            valid
        });

        let description = raw.description.filter(|value| {
            let fits = value.chars().count() <= DESCRIPTION_MAX_CHARS;
            if !fits {
                errors.push(format!(
                    "description must be a maximum of {DESCRIPTION_MAX_CHARS} characters in length"
                ));
            }
            fits
        });

        match (title, author) {
            (Some(title), Some(author)) if errors.is_empty() => Ok(Self {
                title,
                author,
                published_date,
                image_url,
                description,
            }),
            _ => Err(AppError::validation(errors)),
        }
    }

    /// Attach an identifier, producing the record to persist.
    pub fn into_record(self, id: Uuid) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            published_date: self.published_date,
            image_url: self.image_url,
            description: self.description,
        }
    }
}

fn required_text(
    value: Option<String>,
    field: &str,
    max_chars: usize,
    errors: &mut Vec<String>,
) -> Option<String> {
    match value {
        None => {
            errors.push(format!("{field} is a required field"));
            None
        }
        Some(text) if text.trim().is_empty() => {
            errors.push(format!("{field} must not be blank"));
            None
        }
        Some(text) if text.chars().count() > max_chars => {
            errors.push(format!(
                "{field} must be a maximum of {max_chars} characters in length"
            ));
            None
        }
        Some(text) => Some(text),
    }
}
