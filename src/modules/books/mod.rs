pub mod models;
pub mod routes;
pub mod service;
pub mod validation;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use bookshelf_authz::Authz;
use bookshelf_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;

use service::BookService;

pub const MANAGE_BOOKS: &str = "manageBooks";
pub const GET_USERS: &str = "getUsers";

/// Dependencies shared by the book handlers.
#[derive(Clone)]
pub struct BooksState {
    pub service: BookService,
    pub authz: Arc<Authz>,
}

/// Book catalogue: CRUD over `/v1/books`.
pub struct BooksModule {
    state: OnceCell<BooksState>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    pub fn service(&self) -> Option<&BookService> {
        self.state.get().map(|state| &state.service)
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let state = BooksState {
            service: BookService::new(ctx.db.clone()),
            authz: ctx.authz.clone(),
        };
        self.state
            .set(state)
            .map_err(|_| anyhow!("books module initialized twice"))?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> anyhow::Result<Router> {
        let state = self
            .state
            .get()
            .ok_or_else(|| anyhow!("books module routes requested before init"))?;
        Ok(routes::router(state.clone()))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE book (
                    id               BLOB PRIMARY KEY NOT NULL,
                    title            TEXT NOT NULL,
                    publication_year TEXT NOT NULL,
                    author           TEXT NOT NULL,
                    description      TEXT NOT NULL,
                    publisher        TEXT NOT NULL,
                    created_at       TEXT NOT NULL,
                    updated_at       TEXT NOT NULL
                );
                CREATE INDEX book_title_idx ON book (title);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_body(schema: &str) -> serde_json::Value {
    serde_json::json!({
        "application/json": {
            "schema": { "$ref": format!("#/components/schemas/{}", schema) }
        }
    })
}

fn query_param(name: &str, description: &str, schema: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": schema
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_id = serde_json::json!({
        "name": "bookId",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    });
    let security = serde_json::json!([{ "bearerAuth": [] }]);

    let content_field = serde_json::json!({ "type": "string", "minLength": 1 });
    let content_fields = serde_json::json!({
        "title": content_field,
        "publication_year": content_field,
        "author": content_field,
        "description": content_field,
        "publisher": content_field
    });

    let mut book_fields = content_fields.clone();
    book_fields["id"] = serde_json::json!({ "type": "string", "format": "uuid" });
    book_fields["createdAt"] = serde_json::json!({ "type": "string", "format": "date-time" });
    book_fields["updatedAt"] = serde_json::json!({ "type": "string", "format": "date-time" });

    serde_json::json!({
        "paths": {
            "/": {
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "security": security,
                    "requestBody": { "required": true, "content": json_body("CreateBook") },
                    "responses": {
                        "201": { "description": "Book created", "content": json_body("Book") },
                        "400": error_response("Validation error"),
                        "401": error_response("Please authenticate"),
                        "403": error_response("Forbidden")
                    }
                },
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [
                        query_param("title", "Exact title match", serde_json::json!({ "type": "string" })),
                        query_param(
                            "sortBy",
                            "field:asc|desc, comma separated",
                            serde_json::json!({ "type": "string" }),
                        ),
                        query_param(
                            "limit",
                            "Results per page",
                            serde_json::json!({ "type": "integer", "default": 10 }),
                        ),
                        query_param(
                            "page",
                            "1-indexed page",
                            serde_json::json!({ "type": "integer", "default": 1 }),
                        )
                    ],
                    "responses": {
                        "200": { "description": "A page of books", "content": json_body("BookPage") },
                        "400": error_response("Validation error"),
                        "401": error_response("Please authenticate"),
                        "403": error_response("Forbidden")
                    }
                }
            },
            "/{bookId}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [book_id],
                    "responses": {
                        "200": { "description": "The book", "content": json_body("Book") },
                        "400": error_response("Validation error"),
                        "401": error_response("Please authenticate"),
                        "403": error_response("Forbidden"),
                        "404": error_response("Book not found")
                    }
                },
                "patch": {
                    "summary": "Update a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [book_id],
                    "requestBody": { "required": true, "content": json_body("UpdateBook") },
                    "responses": {
                        "200": { "description": "Updated book", "content": json_body("Book") },
                        "400": error_response("Validation error"),
                        "401": error_response("Please authenticate"),
                        "403": error_response("Forbidden"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [book_id],
                    "responses": {
                        "204": { "description": "Book deleted" },
                        "400": error_response("Validation error"),
                        "401": error_response("Please authenticate"),
                        "403": error_response("Forbidden"),
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": book_fields,
                    "required": [
                        "id", "title", "publication_year", "author",
                        "description", "publisher", "createdAt", "updatedAt"
                    ]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": content_fields,
                    "required": ["title", "publication_year", "author", "description", "publisher"],
                    "additionalProperties": false
                },
                "UpdateBook": {
                    "type": "object",
                    "properties": content_fields,
                    "minProperties": 0,
                    "additionalProperties": false
                },
                "BookPage": {
                    "type": "object",
                    "properties": {
                        "results": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } },
                        "page": { "type": "integer" },
                        "limit": { "type": "integer" },
                        "totalPages": { "type": "integer" },
                        "totalResults": { "type": "integer" }
                    },
                    "required": ["results", "page", "limit", "totalPages", "totalResults"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
