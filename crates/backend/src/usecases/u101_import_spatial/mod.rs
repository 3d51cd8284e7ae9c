//! U101: load a spatial source (upload or URL) into PostGIS via ogr2ogr.
//!
//! The pipeline is strictly sequential: resolve the source, probe it for a
//! declared SRS, assemble the ogr2ogr invocation, run it bounded, report.
//! A downloaded source is removed once the run finishes, success or not.

pub mod command_builder;
pub mod process_executor;
pub mod source_resolver;
pub mod srs_detector;

use std::path::PathBuf;

use thiserror::Error;

use contracts::usecases::u101_import_spatial::request::ImportRequest;
use contracts::usecases::u101_import_spatial::response::ImportResponse;

use crate::shared::config::{MissingVar, PgConfig};

#[derive(Debug, Error)]
pub enum ImportError {
    /// Malformed request (no source, unusable fields). HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Destination credentials missing from the environment. HTTP 500.
    #[error("{0}")]
    Config(#[from] MissingVar),

    /// The remote source could not be fetched, or fetched something that is
    /// not data (HTML login wall). HTTP 400.
    #[error("{0}")]
    Upstream(String),

    /// ogr2ogr failed: non-zero exit, timeout or spawn failure. HTTP 500,
    /// with the attempted command and captured output for reproduction.
    #[error("{message}")]
    Conversion {
        message: String,
        cmd: String,
        stdout: String,
        stderr: String,
    },

    /// Local I/O trouble while staging the source. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

/// Run one import end to end.
///
/// `uploaded` is the path of an already-received multipart file, if any.
/// Exactly one of it and `sourceUrl` must be present; an uploaded file is
/// never deleted here.
pub async fn run_import(
    config: &PgConfig,
    request: &ImportRequest,
    uploaded: Option<PathBuf>,
) -> Result<ImportResponse, ImportError> {
    let source = source_resolver::resolve(request, uploaded).await?;

    let ogr_source = command_builder::ogr_source_path(source.path());
    let source_has_srs =
        srs_detector::source_declares_srs(&ogr_source, request.layer_name.as_deref()).await;
    tracing::info!(
        "source {} declares SRS: {}",
        source.path().display(),
        source_has_srs
    );

    let command = command_builder::build(config, request, source.path(), source_has_srs);
    let cmd_line = command.display();
    tracing::info!("running {}", cmd_line);

    let outcome = process_executor::run(&command).await;

    // Cleanup of an owned download fires here, whatever the outcome was.
    drop(source);

    if outcome.success {
        if !outcome.stderr.is_empty() {
            tracing::warn!("ogr2ogr succeeded with warnings: {}", outcome.stderr);
        }
        Ok(ImportResponse {
            ok: true,
            cmd: cmd_line,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        })
    } else {
        let message = outcome
            .error
            .unwrap_or_else(|| "ogr2ogr failed".to_string());
        tracing::error!(
            "{}; cmd: {}; stderr: {}",
            message,
            cmd_line,
            if outcome.stderr.is_empty() {
                &outcome.stdout
            } else {
                &outcome.stderr
            }
        );
        Err(ImportError::Conversion {
            message,
            cmd: cmd_line,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PgConfig {
        PgConfig {
            host: "db".into(),
            port: "5432".into(),
            database: "gis".into(),
            user: "loader".into(),
            password: "pw".into(),
            sslmode: None,
        }
    }

    #[tokio::test]
    async fn missing_source_fails_validation_before_any_run() {
        let err = run_import(&test_config(), &ImportRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }

    #[tokio::test]
    async fn conversion_failure_carries_the_attempted_command() {
        // ogr2ogr is not expected on the test host; either a spawn failure
        // or a real non-zero exit must surface as Conversion with the cmd.
        let request = ImportRequest::default();
        let err = run_import(
            &test_config(),
            &request,
            Some(PathBuf::from("/nonexistent/source.gml")),
        )
        .await
        .unwrap_err();

        match err {
            ImportError::Conversion { cmd, .. } => {
                assert!(cmd.starts_with("ogr2ogr"));
                assert!(cmd.contains("-t_srs EPSG:25830"));
            }
            other => panic!("expected conversion error, got {:?}", other),
        }
    }
}
