pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::{json, Value};

use repository::BookRepository;

/// CRUD module for the `books` resource.
pub struct BooksModule {
    repository: Arc<dyn BookRepository>,
}

impl BooksModule {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(Arc::clone(&self.repository))
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id             TEXT PRIMARY KEY NOT NULL,
                    title          TEXT NOT NULL CHECK (title <> ''),
                    author         TEXT NOT NULL CHECK (author <> ''),
                    published_date TEXT,
                    image_url      TEXT,
                    description    TEXT
                );
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

fn error_response(description: &str, schema: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn id_parameter() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "Book ID",
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn form_body() -> Value {
    json!({
        "required": true,
        "description": "Book form",
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookForm" }
            }
        }
    })
}

fn book_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn openapi_fragment() -> Value {
    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "operationId": "listBooks",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "List of books, empty when none exist",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "500": error_response("Storage failure", "ErrorResponse")
                    }
                },
                "post": {
                    "summary": "Create book",
                    "operationId": "createBook",
                    "tags": ["Books"],
                    "requestBody": form_body(),
                    "responses": {
                        "201": {
                            "description": "Created; body carries the new identifier",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreatedBook" }
                                }
                            }
                        },
                        "400": error_response("Malformed JSON body", "ErrorResponse"),
                        "422": error_response("Validation failed", "ValidationErrorResponse"),
                        "500": error_response("Storage failure", "ErrorResponse")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Read book",
                    "operationId": "readBook",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": book_response("The book"),
                        "400": error_response("Malformed identifier", "ErrorResponse"),
                        "404": error_response("No such book", "ErrorResponse"),
                        "500": error_response("Storage failure", "ErrorResponse")
                    }
                },
                "put": {
                    "summary": "Update book",
                    "operationId": "updateBook",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": form_body(),
                    "responses": {
                        "200": book_response("The book after replacement"),
                        "400": error_response("Malformed identifier or JSON body", "ErrorResponse"),
                        "404": error_response("No such book", "ErrorResponse"),
                        "422": error_response("Validation failed", "ValidationErrorResponse"),
                        "500": error_response("Storage failure", "ErrorResponse")
                    }
                },
                "delete": {
                    "summary": "Delete book",
                    "operationId": "deleteBook",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": {
                            "description": "Deleted",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/DeletedBook" }
                                }
                            }
                        },
                        "400": error_response("Malformed identifier", "ErrorResponse"),
                        "404": error_response("No such book", "ErrorResponse"),
                        "500": error_response("Storage failure", "ErrorResponse")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "published_date": { "type": "string", "format": "date" },
                        "image_url": { "type": "string", "format": "uri" },
                        "description": { "type": "string" }
                    },
                    "required": ["id", "title", "author"]
                },
                "BookForm": {
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "minLength": 1,
                            "maxLength": models::TITLE_MAX_CHARS
                        },
                        "author": {
                            "type": "string",
                            "minLength": 1,
                            "maxLength": models::AUTHOR_MAX_CHARS
                        },
                        "published_date": { "type": "string", "format": "date" },
                        "image_url": { "type": "string", "format": "uri" },
                        "description": {
                            "type": "string",
                            "maxLength": models::DESCRIPTION_MAX_CHARS
                        }
                    },
                    "required": ["title", "author"]
                },
                "CreatedBook": {
                    "type": "object",
                    "properties": { "id": { "type": "string", "format": "uuid" } },
                    "required": ["id"]
                },
                "DeletedBook": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "status": { "type": "string" }
                    },
                    "required": ["id", "status"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module(repository: Arc<dyn BookRepository>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(repository))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_documents_every_operation() {
        let fragment = openapi_fragment();
        let paths = &fragment["paths"];

        for method in ["get", "post"] {
            assert!(paths["/"][method].is_object(), "missing {method} /");
        }
        for method in ["get", "put", "delete"] {
            assert!(paths["/{id}"][method].is_object(), "missing {method} /{{id}}");
        }
        assert_eq!(
            fragment["components"]["schemas"]["BookForm"]["required"],
            json!(["title", "author"])
        );
    }
}
