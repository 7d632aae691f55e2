//! Book persistence operations.

use bookshelf_db::{paginate, Database, DbError, Filter, Page, QueryOptions};
use bookshelf_http::error::AppError;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::models::{Book, BookPatch, NewBook};

#[derive(Error, Debug)]
pub enum BookError {
    #[error("book {id} not found")]
    NotFound { id: Uuid },

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl From<sqlx::Error> for BookError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(DbError::from(err))
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound { .. } => AppError::not_found("Book not found"),
            BookError::Storage(DbError::UnknownField(field))
            | BookError::Storage(DbError::UnknownSortField(field)) => AppError::validation(
                vec![serde_json::json!({"field": field})],
                format!("cannot filter or sort by '{}'", field),
            ),
            BookError::Storage(other) => AppError::Internal(other.into()),
        }
    }
}

pub type BookResult<T> = Result<T, BookError>;

#[derive(Debug, Clone)]
pub struct BookService {
    db: Database,
}

impl BookService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_book(&self, new_book: NewBook) -> BookResult<Book> {
        let now = OffsetDateTime::now_utc();
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO book (id, title, publication_year, author, description, publisher, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&new_book.title)
        .bind(&new_book.publication_year)
        .bind(&new_book.author)
        .bind(&new_book.description)
        .bind(&new_book.publisher)
        .bind(now)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(book_id = %book.id, title = %book.title, "book created");
        Ok(book)
    }

    /// Absence is not an error here; callers decide.
    pub async fn get_book_by_id(&self, id: Uuid) -> BookResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM book WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    /// Oldest book whose title matches exactly.
    pub async fn get_book_by_title(&self, title: &str) -> BookResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT * FROM book WHERE title = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(title)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(book)
    }

    pub async fn query_books(&self, filter: &Filter, options: &QueryOptions) -> BookResult<Page<Book>> {
        Ok(paginate::<Book>(self.db.pool(), filter, options).await?)
    }

    /// Merge the supplied fields in SQL and advance `updated_at`.
    ///
    /// The transaction opens with a write, so concurrent patches serialize.
    pub async fn update_book_by_id(&self, id: Uuid, patch: BookPatch) -> BookResult<Book> {
        if patch.is_empty() {
            return self
                .get_book_by_id(id)
                .await?
                .ok_or(BookError::NotFound { id });
        }

        let mut tx = self.db.pool().begin().await?;

        let merged = sqlx::query_as::<_, Book>(
            r#"
            UPDATE book
            SET title = COALESCE(?, title),
                publication_year = COALESCE(?, publication_year),
                author = COALESCE(?, author),
                description = COALESCE(?, description),
                publisher = COALESCE(?, publisher)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(patch.title)
        .bind(patch.publication_year)
        .bind(patch.author)
        .bind(patch.description)
        .bind(patch.publisher)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookError::NotFound { id })?;

        let book = sqlx::query_as::<_, Book>("UPDATE book SET updated_at = ? WHERE id = ? RETURNING *")
            .bind(next_timestamp(merged.updated_at))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(book_id = %id, "book updated");
        Ok(book)
    }

    /// Hard delete; returns the record as it was.
    pub async fn delete_book_by_id(&self, id: Uuid) -> BookResult<Book> {
        let book = sqlx::query_as::<_, Book>("DELETE FROM book WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(BookError::NotFound { id })?;

        tracing::info!(book_id = %id, "book deleted");
        Ok(book)
    }
}

/// Current time, nudged forward so `updatedAt` strictly increases.
fn next_timestamp(previous: OffsetDateTime) -> OffsetDateTime {
    OffsetDateTime::now_utc().max(previous + Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let future = OffsetDateTime::now_utc() + Duration::hours(1);
        assert!(next_timestamp(future) > future);

        let past = OffsetDateTime::now_utc() - Duration::hours(1);
        assert!(next_timestamp(past) > past + Duration::minutes(59));
    }

    #[test]
    fn not_found_maps_to_404_error() {
        let err = AppError::from(BookError::NotFound { id: Uuid::nil() });
        assert!(matches!(err, AppError::NotFound { ref message, .. } if message == "Book not found"));
    }
}
