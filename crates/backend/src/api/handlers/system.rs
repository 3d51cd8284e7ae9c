use axum::Json;
use serde_json::{json, Value};

/// GET /routes — debug helper listing the registered routes.
pub async fn routes() -> Json<Value> {
    Json(json!([
        { "methods": ["GET"], "path": "/healthz" },
        { "methods": ["GET"], "path": "/routes" },
        { "methods": ["POST"], "path": "/import" },
    ]))
}
