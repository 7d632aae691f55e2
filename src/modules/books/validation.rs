//! Request shapes accepted by the book routes.

use std::borrow::Cow;

use bookshelf_db::{Entity, Filter, QueryOptions, SortBy};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::models::{Book, BookPatch, NewBook};

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub title: String,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub publication_year: String,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub author: String,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub description: String,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub publisher: String,
}

impl From<CreateBookRequest> for NewBook {
    fn from(req: CreateBookRequest) -> Self {
        Self {
            title: req.title,
            publication_year: req.publication_year,
            author: req.author,
            description: req.description,
            publisher: req.publisher,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub publication_year: Option<String>,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub author: Option<String>,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub publisher: Option<String>,
}

impl From<UpdateBookRequest> for BookPatch {
    fn from(req: UpdateBookRequest) -> Self {
        Self {
            title: req.title,
            publication_year: req.publication_year,
            author: req.author,
            description: req.description,
            publisher: req.publisher,
        }
    }
}

/// `GET /books` query string.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListBooksQuery {
    #[validate(length(min = 1, message = "must be a non-empty string"))]
    pub title: Option<String>,
    #[serde(rename = "sortBy")]
    #[validate(custom(function = "validate_sort_by"))]
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListBooksQuery {
    pub fn filter(&self) -> Filter {
        Filter::new().eq_opt("title", self.title.clone())
    }

    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            sort_by: self.sort_by.clone(),
            limit: self.limit,
            page: self.page,
        }
    }
}

/// `/books/{bookId}` path parameters.
#[derive(Debug, Deserialize)]
pub struct BookIdParams {
    #[serde(rename = "bookId")]
    pub book_id: Uuid,
}

fn validate_sort_by(value: &str) -> Result<(), ValidationError> {
    let sort_by = SortBy::parse(value);
    if sort_by.keys().is_empty() {
        let mut err = ValidationError::new("sort_by");
        err.message = Some(Cow::Borrowed("must name at least one field"));
        return Err(err);
    }

    for key in sort_by.keys() {
        if Book::column(&key.field).is_none() {
            let mut err = ValidationError::new("sort_field");
            err.message = Some(Cow::Owned(format!("cannot sort by '{}'", key.field)));
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_every_field_non_empty() {
        let ok: CreateBookRequest = serde_json::from_value(serde_json::json!({
            "title": "T",
            "publication_year": "1999",
            "author": "A",
            "description": "D",
            "publisher": "P"
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let missing = serde_json::from_value::<CreateBookRequest>(serde_json::json!({
            "title": "T",
            "publication_year": "1999",
            "author": "A",
            "description": "D"
        }));
        assert!(missing.is_err());

        let blank = CreateBookRequest {
            author: String::new(),
            ..ok
        };
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("author"));
    }

    #[test]
    fn update_accepts_any_subset() {
        let req: UpdateBookRequest =
            serde_json::from_value(serde_json::json!({ "author": "X" })).unwrap();
        assert!(req.validate().is_ok());

        let patch = BookPatch::from(req);
        assert_eq!(patch.author.as_deref(), Some("X"));
        assert!(patch.title.is_none());

        let blank = UpdateBookRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let unknown =
            serde_json::from_value::<UpdateBookRequest>(serde_json::json!({ "isbn": "123" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn sort_by_must_name_book_fields() {
        let valid = ListBooksQuery {
            sort_by: Some("title:desc,createdAt:asc".into()),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());

        let invalid = ListBooksQuery {
            sort_by: Some("password:asc".into()),
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let empty = ListBooksQuery {
            sort_by: Some(",".into()),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn query_maps_to_filter_and_options() {
        let query = ListBooksQuery {
            title: Some("Dune".into()),
            sort_by: None,
            limit: Some(5),
            page: Some(2),
        };

        assert_eq!(query.filter(), Filter::new().eq("title", "Dune"));
        assert_eq!(query.options().limit(), 5);
        assert_eq!(query.options().page(), 2);
        assert!(ListBooksQuery::default().filter().is_empty());
    }
}
