use std::path::Path;

use contracts::usecases::u101_import_spatial::request::ImportRequest;

use crate::shared::config::PgConfig;

/// Geometry column created in every destination table.
pub const GEOMETRY_COLUMN: &str = "geom";

/// An external invocation: argv plus a faithful printable rendering.
///
/// The child is spawned directly from `program`/`args` (no shell), so the
/// printable form is purely diagnostic — but it is rendered from the same
/// argv, with quoting only added where an argument contains whitespace or
/// quotes, so it can be pasted into a shell and reproduce the exact run.
#[derive(Debug, Clone)]
pub struct ConversionCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl ConversionCommand {
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string()];
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let needs_quoting =
        arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || matches!(c, '\'' | '"'));
    if needs_quoting {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// The path handed to GDAL: zip archives go through the /vsizip/ virtual
/// filesystem, anything else is read directly.
pub fn ogr_source_path(path: &Path) -> String {
    let is_zip = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        format!("/vsizip/{}", path.display())
    } else {
        path.display().to_string()
    }
}

/// Assemble the full ogr2ogr invocation for one import.
///
/// `source_has_srs` comes from the detector: a source with a recognized SRS
/// is only reprojected (`-t_srs`); a source without one is first assigned the
/// target SRS (`-a_srs`) so the reprojection has a defined input.
pub fn build(
    config: &PgConfig,
    request: &ImportRequest,
    source_path: &Path,
    source_has_srs: bool,
) -> ConversionCommand {
    let mut args: Vec<String> = vec![
        "-f".into(),
        "PostgreSQL".into(),
        config.ogr_connection_string(),
        ogr_source_path(source_path),
    ];

    if let Some(layer) = &request.layer_name {
        args.push(layer.clone());
    }

    args.push("-nln".into());
    args.push(request.table.clone());
    args.push("-lco".into());
    args.push(format!("GEOMETRY_NAME={}", GEOMETRY_COLUMN));

    if request.promote_to_multi {
        args.push("-nlt".into());
        args.push("PROMOTE_TO_MULTI".into());
    }

    if !source_has_srs {
        args.push("-a_srs".into());
        args.push(format!("EPSG:{}", request.srid));
    }
    args.push("-t_srs".into());
    args.push(format!("EPSG:{}", request.srid));

    args.push("-overwrite".into());
    args.push("-progress".into());

    ConversionCommand {
        program: "ogr2ogr",
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

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

    fn test_request() -> ImportRequest {
        ImportRequest {
            source_url: None,
            table: "walls".into(),
            srid: 25830,
            promote_to_multi: true,
            layer_name: None,
        }
    }

    #[test]
    fn assigns_source_srs_only_when_undeclared() {
        let path = PathBuf::from("/tmp/a.gml");

        let cmd = build(&test_config(), &test_request(), &path, false);
        let line = cmd.display();
        assert!(line.contains("-a_srs EPSG:25830"));
        assert!(line.contains("-t_srs EPSG:25830"));

        let cmd = build(&test_config(), &test_request(), &path, true);
        let line = cmd.display();
        assert!(!line.contains("-a_srs"));
        assert!(line.contains("-t_srs EPSG:25830"));
    }

    #[test]
    fn zip_sources_go_through_vsizip() {
        let cmd = build(
            &test_config(),
            &test_request(),
            &PathBuf::from("/tmp/parcels.ZIP"),
            true,
        );
        assert!(cmd.args.contains(&"/vsizip//tmp/parcels.ZIP".to_string()));
        assert!(!cmd.args.contains(&"/tmp/parcels.ZIP".to_string()));
    }

    #[test]
    fn plain_sources_are_passed_as_is() {
        assert_eq!(ogr_source_path(Path::new("/tmp/a.gpkg")), "/tmp/a.gpkg");
    }

    #[test]
    fn promote_flag_is_conditional() {
        let mut request = test_request();
        request.promote_to_multi = false;
        let cmd = build(&test_config(), &request, Path::new("/tmp/a.gml"), true);
        assert!(!cmd.args.contains(&"-nlt".to_string()));

        request.promote_to_multi = true;
        let cmd = build(&test_config(), &request, Path::new("/tmp/a.gml"), true);
        let pos = cmd.args.iter().position(|a| a == "-nlt").unwrap();
        assert_eq!(cmd.args[pos + 1], "PROMOTE_TO_MULTI");
    }

    #[test]
    fn layer_name_with_spaces_is_quoted_in_display() {
        let mut request = test_request();
        request.layer_name = Some("parcelas urbanas".into());
        let cmd = build(&test_config(), &request, Path::new("/tmp/a.gml"), true);

        // One argv element, quoted only in the printable form.
        assert!(cmd.args.contains(&"parcelas urbanas".to_string()));
        assert!(cmd.display().contains("\"parcelas urbanas\""));
    }

    #[test]
    fn table_and_geometry_column_are_always_set() {
        let cmd = build(&test_config(), &test_request(), Path::new("/tmp/a.gml"), true);
        let line = cmd.display();
        assert!(line.contains("-nln walls"));
        assert!(line.contains("-lco GEOMETRY_NAME=geom"));
        assert!(line.contains("-overwrite"));
        assert!(line.contains("-progress"));
    }
}
