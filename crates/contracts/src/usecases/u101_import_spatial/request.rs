use serde::{Deserialize, Serialize};

/// Destination table used when the request does not name one.
pub const DEFAULT_TABLE: &str = "parcelas_muros";

/// Target EPSG code used when the request does not name one.
pub const DEFAULT_SRID: i32 = 25830;

/// Parameters of a spatial import run.
///
/// Arrives either as the JSON body of `POST /import` or as the text fields of
/// a multipart form (next to the binary `data`/`file` part). Clients are
/// loose about field types, so `srid` accepts a JSON number or a numeric
/// string and `promoteToMulti` accepts a boolean or `"true"`/`"false"` text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Remote source to download. Mutually exclusive with an uploaded file.
    #[serde(rename = "sourceUrl", default)]
    pub source_url: Option<String>,

    /// Destination table name.
    #[serde(default = "default_table")]
    pub table: String,

    /// Target spatial reference (EPSG code).
    #[serde(default = "default_srid", with = "serde_lax_int")]
    pub srid: i32,

    /// Collapse single geometries into their multi-geometry type.
    #[serde(
        rename = "promoteToMulti",
        default = "default_promote",
        with = "serde_lax_bool"
    )]
    pub promote_to_multi: bool,

    /// Specific layer to import when the source holds several.
    #[serde(rename = "layerName", default)]
    pub layer_name: Option<String>,
}

impl Default for ImportRequest {
    fn default() -> Self {
        Self {
            source_url: None,
            table: DEFAULT_TABLE.to_string(),
            srid: DEFAULT_SRID,
            promote_to_multi: true,
            layer_name: None,
        }
    }
}

/// Coercion rule for textual boolean flags: only the literal `true`
/// (case-insensitive, surrounding whitespace ignored) is true.
pub fn coerce_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Coercion rule for textual SRIDs.
pub fn coerce_srid(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_srid() -> i32 {
    DEFAULT_SRID
}

fn default_promote() -> bool {
    true
}

// Accepts an integer or a numeric string.
mod serde_lax_int {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &i32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i32, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => i32::try_from(n)
                .map_err(|_| de::Error::custom(format!("srid out of range: {n}"))),
            Raw::Text(s) => super::coerce_srid(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid srid: {s:?}"))),
        }
    }
}

// Accepts a boolean or "true"/"false" text.
mod serde_lax_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(b) => b,
            Raw::Text(s) => super::coerce_flag(&s),
        })
    }
}
