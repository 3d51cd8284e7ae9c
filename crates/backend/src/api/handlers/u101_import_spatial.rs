use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use contracts::usecases::u101_import_spatial::request::{coerce_flag, coerce_srid, ImportRequest};
use contracts::usecases::u101_import_spatial::response::ImportErrorResponse;

use crate::shared::config::PgConfig;
use crate::usecases::u101_import_spatial::{self as pipeline, source_resolver, ImportError};

const UPLOAD_FALLBACK_FILENAME: &str = "upload.bin";

/// POST /import — body is either JSON or a multipart form with a binary
/// `data`/`file` part next to the same text fields.
pub async fn import(req: Request) -> Response {
    // Fail fast on missing PG* credentials, before the body is touched.
    let config = match PgConfig::from_env() {
        Ok(config) => config,
        Err(e) => return error_response(ImportError::Config(e)),
    };

    let (request, uploaded) = match parse_request(req).await {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    match pipeline::run_import(&config, &request, uploaded).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Any other method on /import.
pub async fn method_not_allowed(method: Method) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({
            "error": "Method Not Allowed",
            "method": method.as_str(),
        })),
    )
        .into_response()
}

async fn parse_request(req: Request) -> Result<(ImportRequest, Option<PathBuf>), Response> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?;
        parse_multipart(multipart).await
    } else {
        let Json(request) = Json::<ImportRequest>::from_request(req, &())
            .await
            .map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?;
        Ok((request, None))
    }
}

/// Walk the multipart fields, materializing the first `data`/`file` part
/// into the scratch area and applying the documented coercion rules to the
/// text fields.
async fn parse_multipart(
    mut multipart: Multipart,
) -> Result<(ImportRequest, Option<PathBuf>), Response> {
    let mut request = ImportRequest::default();
    let mut uploaded: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "data" | "file" => {
                let filename = field
                    .file_name()
                    .unwrap_or(UPLOAD_FALLBACK_FILENAME)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
                if uploaded.is_some() {
                    continue; // first binary part wins
                }
                tracing::info!("received upload {} ({} bytes)", filename, bytes.len());
                let path = save_upload(&filename, &bytes).await.map_err(|e| {
                    error_response(ImportError::Internal(format!(
                        "failed to store upload: {}",
                        e
                    )))
                })?;
                uploaded = Some(path);
            }
            "sourceUrl" => {
                request.source_url = Some(field_text(field).await?).filter(|v| !v.is_empty());
            }
            "table" => {
                let value = field_text(field).await?;
                if !value.is_empty() {
                    request.table = value;
                }
            }
            "srid" => {
                let value = field_text(field).await?;
                if !value.is_empty() {
                    request.srid = coerce_srid(&value)
                        .ok_or_else(|| bad_request(format!("invalid srid: {:?}", value)))?;
                }
            }
            "promoteToMulti" => {
                request.promote_to_multi = coerce_flag(&field_text(field).await?);
            }
            "layerName" => {
                request.layer_name = Some(field_text(field).await?).filter(|v| !v.is_empty());
            }
            _ => {}
        }
    }

    Ok((request, uploaded))
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, Response> {
    field
        .text()
        .await
        .map(|v| v.trim().to_string())
        .map_err(|e| bad_request(format!("invalid multipart field: {}", e)))
}

async fn save_upload(filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let dir = source_resolver::scratch_dir().join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&dir).await?;

    // Client filenames can carry directory components; keep the leaf only.
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(UPLOAD_FALLBACK_FILENAME);
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

fn bad_request(message: String) -> Response {
    error_response(ImportError::Validation(message))
}

fn error_response(err: ImportError) -> Response {
    let status = match &err {
        ImportError::Validation(_) | ImportError::Upstream(_) => StatusCode::BAD_REQUEST,
        ImportError::Config(_) | ImportError::Conversion { .. } | ImportError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = match err {
        ImportError::Conversion {
            message,
            cmd,
            stdout,
            stderr,
        } => ImportErrorResponse {
            error: message,
            ok: Some(false),
            cmd: Some(cmd),
            stdout: Some(stdout),
            stderr: Some(stderr),
        },
        other => ImportErrorResponse::message(other.to_string()),
    };

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_responses_map_the_taxonomy_to_status_codes() {
        let cases = [
            (ImportError::Validation("no source".into()), 400),
            (ImportError::Upstream("HTML page".into()), 400),
            (
                ImportError::Config(crate::shared::config::MissingVar("PGHOST")),
                500,
            ),
            (
                ImportError::Conversion {
                    message: "ogr2ogr exited with 1".into(),
                    cmd: "ogr2ogr ...".into(),
                    stdout: String::new(),
                    stderr: "ERROR 1".into(),
                },
                500,
            ),
            (ImportError::Internal("disk full".into()), 500),
        ];

        for (err, expected) in cases {
            let response = error_response(err);
            assert_eq!(response.status().as_u16(), expected);
        }
    }

    #[tokio::test]
    async fn method_not_allowed_names_the_method() {
        let response = method_not_allowed(Method::GET).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Method Not Allowed");
        assert_eq!(body["method"], "GET");
    }

    #[tokio::test]
    async fn save_upload_keeps_only_the_leaf_filename() {
        let path = save_upload("../../etc/walls.gml", b"<gml/>").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "walls.gml");
        assert!(path.starts_with(source_resolver::scratch_dir()));

        std::fs::remove_file(&path).unwrap();
        std::fs::remove_dir(path.parent().unwrap()).unwrap();
    }
}
