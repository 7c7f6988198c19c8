use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::metric::MetricCatalog;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub admin_key: Option<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the scoreboard Postgres instance")?;

        let max_connections = match std::env::var("SCOREBOARD_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("invalid SCOREBOARD_MAX_CONNECTIONS: {value}"))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            max_connections,
            admin_key: std::env::var("SCOREBOARD_ADMIN_KEY").ok(),
            catalog_path: std::env::var("SCOREBOARD_CATALOG").ok().map(PathBuf::from),
        })
    }

    /// Loads the catalog from `override_path`, then the configured path, else the built-in one.
    pub fn catalog(&self, override_path: Option<&Path>) -> anyhow::Result<MetricCatalog> {
        match override_path.or(self.catalog_path.as_deref()) {
            Some(path) => load_catalog(path),
            None => Ok(MetricCatalog::default()),
        }
    }
}

/// Admin-only commands run only when a key is configured and `provided` matches it.
pub fn check_admin_key(configured: Option<&str>, provided: &str) -> anyhow::Result<()> {
    match configured {
        Some(expected) if expected == provided => Ok(()),
        Some(_) => anyhow::bail!("invalid admin key"),
        None => anyhow::bail!("SCOREBOARD_ADMIN_KEY is not configured; refusing admin commands"),
    }
}

pub fn load_catalog(path: &Path) -> anyhow::Result<MetricCatalog> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metric catalog {}", path.display()))?;
    let catalog: MetricCatalog = serde_json::from_str(&contents)
        .with_context(|| format!("invalid metric catalog {}", path.display()))?;
    tracing::debug!(path = %path.display(), metrics = catalog.metrics.len(), "loaded metric catalog");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings(catalog_path: Option<PathBuf>) -> Settings {
        Settings {
            database_url: "postgres://localhost/scoreboard".to_string(),
            max_connections: 5,
            admin_key: None,
            catalog_path,
        }
    }

    #[test]
    fn admin_key_must_be_configured_and_match() {
        assert!(check_admin_key(Some("arena"), "arena").is_ok());
        assert!(check_admin_key(Some("arena"), "guess").is_err());
        assert!(check_admin_key(None, "arena").is_err());
    }

    #[test]
    fn falls_back_to_builtin_catalog() {
        let catalog = settings(None).catalog(None).unwrap();
        assert_eq!(catalog, MetricCatalog::default());
    }

    #[test]
    fn loads_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fallback_title": "Rookie", "metrics": [{{"key": "Calls", "display_name": "Calls Made", "title": "Phone Hero"}}]}}"#
        )
        .unwrap();

        let catalog = settings(Some(file.path().to_path_buf())).catalog(None).unwrap();
        assert_eq!(catalog.fallback_title, "Rookie");
        assert_eq!(catalog.display_name("Calls"), "Calls Made");
    }

    #[test]
    fn override_path_wins_and_reports_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = settings(None).catalog(Some(file.path()));
        assert!(result.is_err());
    }
}
