//! OpenAPI document assembly from module fragments.

use serde_json::{json, Value};

use bookshelf_kernel::ModuleRegistry;

pub const API_TITLE: &str = "Bookshelf API";
pub const API_VERSION: &str = "1.0.0";

fn base_document() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": API_TITLE,
            "version": API_VERSION,
            "description": "RESTful CRUD API for books"
        },
        "paths": {
            "/livez": {
                "get": {
                    "summary": "Liveness probe",
                    "tags": ["Health"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            },
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "tags": ["Health"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "properties": {
                        "error": { "type": "string" },
                        "code": { "type": "string" },
                        "trace_id": { "type": "string", "format": "uuid" },
                        "timestamp": { "type": "string" }
                    },
                    "required": ["error", "code", "trace_id", "timestamp"]
                },
                "ValidationErrorResponse": {
                    "type": "object",
                    "properties": {
                        "errors": { "type": "array", "items": { "type": "string" } },
                        "code": { "type": "string" },
                        "trace_id": { "type": "string", "format": "uuid" },
                        "timestamp": { "type": "string" }
                    },
                    "required": ["errors", "code", "trace_id", "timestamp"]
                }
            }
        }
    })
}

/// Merge every module fragment into one document.
///
/// Module paths are prefixed with `/api/{module}`; a module path of `/` maps to
/// the bare prefix. Schemas share one global namespace, later modules win.
pub fn merged_document(registry: &ModuleRegistry) -> Value {
    let mut document = base_document();

    for module in registry.modules() {
        let Some(fragment) = module.openapi() else {
            continue;
        };

        if let Some(paths) = fragment.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                let prefixed = match path.as_str() {
                    "/" => format!("/api/{}", module.name()),
                    other => format!("/api/{}{}", module.name(), other),
                };
                document["paths"][prefixed] = item.clone();
            }
        }

        if let Some(schemas) = fragment
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(Value::as_object)
        {
            for (name, schema) in schemas {
                document["components"]["schemas"][name] = schema.clone();
            }
        }
    }

    document
}

/// Typed view of the merged document for Swagger UI.
///
/// Falls back to an empty document carrying only the title when the merged
/// JSON does not match the OpenAPI model.
pub fn to_openapi(document: &Value) -> utoipa::openapi::OpenApi {
    serde_json::from_value(document.clone()).unwrap_or_else(|error| {
        tracing::warn!(%error, "merged OpenAPI document rejected, serving empty document");
        utoipa::openapi::OpenApiBuilder::new()
            .info(
                utoipa::openapi::InfoBuilder::new()
                    .title(API_TITLE)
                    .version(API_VERSION)
                    .build(),
            )
            .build()
    })
}
