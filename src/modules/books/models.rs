use bookshelf_db::Entity;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A persisted book.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Book {
    pub id: Uuid,
    /// Title of the book, indexed for lookups
    pub title: String,
    /// Free-form text; may hold partial dates such as "12 Januari 1994"
    pub publication_year: String,
    pub author: String,
    pub description: String,
    pub publisher: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Entity for Book {
    const TABLE: &'static str = "book";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("id", "id"),
        ("title", "title"),
        ("publication_year", "publication_year"),
        ("author", "author"),
        ("description", "description"),
        ("publisher", "publisher"),
        ("createdAt", "created_at"),
        ("updatedAt", "updated_at"),
    ];
    const DEFAULT_SORT: &'static str = "createdAt";
}

/// Fields for a new book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub publication_year: String,
    pub author: String,
    pub description: String,
    pub publisher: String,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub publication_year: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.publication_year.is_none()
            && self.author.is_none()
            && self.description.is_none()
            && self.publisher.is_none()
    }
}

/// API representation of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDto {
    pub id: Uuid,
    pub title: String,
    pub publication_year: String,
    pub author: String,
    pub description: String,
    pub publisher: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Book> for BookDto {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            publication_year: book.publication_year,
            author: book.author,
            description: book.description,
            publisher: book.publisher,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}
