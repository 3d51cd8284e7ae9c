use serde::{Deserialize, Serialize};

/// Outcome of a completed conversion run, echoed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub ok: bool,
    /// The exact ogr2ogr invocation that was executed.
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
}

/// Error payload for failed imports.
///
/// For conversion failures the diagnostic fields carry the attempted command
/// and its captured output so the operator can reproduce the run by hand; for
/// validation/config/download errors only `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ImportErrorResponse {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ok: None,
            cmd: None,
            stdout: None,
            stderr: None,
        }
    }
}
