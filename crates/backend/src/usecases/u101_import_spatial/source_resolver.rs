use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::header;
use uuid::Uuid;

use contracts::usecases::u101_import_spatial::request::ImportRequest;

use super::ImportError;

/// Download budget for one remote source.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_REDIRECTS: usize = 5;
const FALLBACK_FILENAME: &str = "file.gml";

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .expect("failed to build HTTP client")
});

/// Scratch area for per-request source files. Each request gets its own
/// UUID subdirectory, so concurrent imports of same-named files never
/// collide.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("gdal-import")
}

/// The single local file fed to the converter.
///
/// Files the pipeline downloaded itself are owned and removed on drop, on
/// every exit path. Uploaded files belong to the upload side of the handler
/// and are left alone.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    owned_temp: bool,
}

impl ResolvedSource {
    pub fn uploaded(path: PathBuf) -> Self {
        Self {
            path,
            owned_temp: false,
        }
    }

    fn downloaded(path: PathBuf) -> Self {
        Self {
            path,
            owned_temp: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned_temp(&self) -> bool {
        self.owned_temp
    }
}

impl Drop for ResolvedSource {
    fn drop(&mut self) {
        if !self.owned_temp {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove temp file {}: {}", self.path.display(), e);
            }
            return;
        }
        // The per-request UUID directory is empty now.
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::remove_dir(parent);
        }
    }
}

/// Decide where the source bytes come from: an already-materialized upload,
/// or a fresh download of `sourceUrl`. Exactly one must be present.
pub async fn resolve(
    request: &ImportRequest,
    uploaded: Option<PathBuf>,
) -> Result<ResolvedSource, ImportError> {
    let url = request
        .source_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    match (uploaded, url) {
        (Some(path), None) => Ok(ResolvedSource::uploaded(path)),
        (None, Some(url)) => download(url).await,
        (Some(_), Some(_)) => Err(ImportError::Validation(
            "send either \"sourceUrl\" or a file (field \"data\"/\"file\"), not both".to_string(),
        )),
        (None, None) => Err(ImportError::Validation(
            "send \"sourceUrl\" or a file (field \"data\"/\"file\")".to_string(),
        )),
    }
}

async fn download(url: &str) -> Result<ResolvedSource, ImportError> {
    tracing::info!("downloading {}", url);

    let response = HTTP
        .get(url)
        .send()
        .await
        .map_err(|e| ImportError::Upstream(format!("download failed: {}", e)))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Rejected responses are never read past the headers, so nothing of
    // them ever reaches the scratch dir.
    if let Some(reason) = reject_reason(status, &content_type) {
        return Err(ImportError::Upstream(reason));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImportError::Upstream(format!("download failed: {}", e)))?;

    let dir = scratch_dir().join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ImportError::Internal(format!("failed to create scratch dir: {}", e)))?;

    // Guard created before the write so a half-written file is still
    // cleaned up if the write fails.
    let source = ResolvedSource::downloaded(dir.join(filename_from_url(url)));
    tokio::fs::write(source.path(), &bytes)
        .await
        .map_err(|e| ImportError::Internal(format!("failed to store download: {}", e)))?;

    tracing::info!(
        "saved {} ({} bytes) content-type={}",
        source.path().display(),
        bytes.len(),
        content_type
    );
    Ok(source)
}

/// Acceptance rule for a download response, decided on the headers alone:
/// only statuses 200–399 pass, and a `text/html` body is refused outright —
/// login walls and corporate AV pages answer 200 with HTML where the data
/// should be.
fn reject_reason(status: u16, content_type: &str) -> Option<String> {
    if !(200..400).contains(&status) {
        return Some(format!("download failed: HTTP {}", status));
    }
    if content_type.contains("text/html") {
        return Some(
            "URL returned an HTML page (login/antivirus screen); send the file as binary instead"
                .to_string(),
        );
    }
    None
}

/// Derive a local filename from the URL's path component, ignoring query and
/// fragment. Falls back to a generic name when the path ends in `/` or the
/// URL does not parse.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}
