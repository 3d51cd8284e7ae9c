use std::time::Duration;

use super::command_builder::ConversionCommand;
use super::process_executor;

/// Textual markers that ogrinfo prints when a layer carries a coordinate
/// system (WKT block or EPSG authority reference).
const SRS_MARKERS: [&str; 4] = ["Layer SRS WKT", "PROJCS", "GEOGCS", "EPSG"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_OUTPUT_CAP: usize = 16 * 1024 * 1024;

/// Best-effort probe: does the source already declare an SRS?
///
/// Runs `ogrinfo -ro -so -al` (read-only, summary-only) against the source.
/// Any failure — ogrinfo missing, timeout, unreadable source — degrades to
/// `false`, which makes the command builder assign the target SRS
/// explicitly. Detection never fails an import.
pub async fn source_declares_srs(ogr_source: &str, layer_name: Option<&str>) -> bool {
    let mut args: Vec<String> = vec!["-ro".into(), "-so".into(), "-al".into(), ogr_source.into()];
    if let Some(layer) = layer_name {
        args.push(layer.to_string());
    }
    let probe = ConversionCommand {
        program: "ogrinfo",
        args,
    };

    let outcome = process_executor::run_with_limits(&probe, PROBE_TIMEOUT, PROBE_OUTPUT_CAP).await;
    if let Some(error) = &outcome.error {
        tracing::debug!("SRS probe inconclusive ({}), assuming no SRS", error);
    }
    // ogrinfo sometimes exits non-zero after printing usable schema output,
    // so the markers are matched on whatever came back either way.
    output_declares_srs(&outcome.stdout)
}

fn output_declares_srs(info: &str) -> bool {
    SRS_MARKERS.iter().any(|marker| info.contains(marker))
}
