//! Loading `kiln.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use kiln_pipeline::MarkupOptions;
use kiln_server::DevServerConfig;

/// Configuration file structure (kiln.toml).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markup: MarkupOptions,
    pub server: DevServerConfig,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the file exists but is malformed.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = load(&temp.path().join("kiln.toml")).unwrap();

        assert_eq!(config.markup, MarkupOptions::default());
        assert_eq!(config.server, DevServerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[markup]\ninclude_dir = \"src/partials\"\n\n[server]\nport = 8080\n").unwrap();

        let config = load(&path).unwrap();

        assert_eq!(config.markup.include_prefix, "@@");
        assert_eq!(config.markup.include_dir, PathBuf::from("src/partials"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.open);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[server]\nport = \"three thousand\"\n").unwrap();

        let err = load(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }
}
