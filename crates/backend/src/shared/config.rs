use thiserror::Error;

#[derive(Debug, Error)]
#[error("missing required environment variable {0}")]
pub struct MissingVar(pub &'static str);

/// Destination database credentials, read from the standard PG* variables.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub sslmode: Option<String>,
}

impl PgConfig {
    /// Load from the process environment. `PGPORT` defaults to 5432 and
    /// `PGSSLMODE` is optional; everything else is required.
    pub fn from_env() -> Result<Self, MissingVar> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, MissingVar> {
        let optional = |name: &str| get(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(MissingVar(name));

        Ok(Self {
            host: required("PGHOST")?,
            port: optional("PGPORT").unwrap_or_else(|| "5432".to_string()),
            database: required("PGDATABASE")?,
            user: required("PGUSER")?,
            password: required("PGPASSWORD")?,
            sslmode: optional("PGSSLMODE"),
        })
    }

    /// The ogr2ogr PostgreSQL destination datasource. Passed to the child as
    /// a single argv element; the password is quoted libpq-style so it
    /// survives embedded spaces.
    pub fn ogr_connection_string(&self) -> String {
        let mut conn = format!(
            "PG:host={} port={} dbname={} user={} password='{}'",
            self.host, self.port, self.database, self.user, self.password
        );
        if let Some(mode) = &self.sslmode {
            conn.push_str(&format!(" sslmode={}", mode));
        }
        conn
    }
}
