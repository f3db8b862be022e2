use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<QcConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    parse_config(&content)
}

/// Parse configuration text after substituting environment variables.
pub fn parse_config(content: &str) -> Result<QcConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: QcConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load the config file if it exists, otherwise fall back to built-in defaults.
///
/// The defaults still go through environment substitution so that
/// `DB_PASSWORD` reaches the local database settings.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<QcConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    warn!(
        path = ?path,
        "Configuration file not found, using built-in defaults"
    );
    let yaml = serde_yaml::to_string(&generate_default_config())
        .with_context(|| "Failed to serialize default configuration")?;
    parse_config(&yaml)
}

#[instrument]
pub fn generate_default_config() -> QcConfig {
    use defaults::*;

    QcConfig {
        output_dir: default_output_dir(),
        local_database: LocalDatabaseConfig::default(),
        macs: default_macs(),
        upload: UploadConfig::default(),
        plot: PlotConfig::default(),
        studies: Vec::new(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &QcConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_config() {
        let config = generate_default_config();

        assert_eq!(config.local_database.database, "hgcdb_fnal");
        assert_eq!(config.local_database.host, "localhost");
        assert_eq!(config.macs.len(), 2);
        assert!(config.studies.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moduleqc.yaml");

        let mut config = generate_default_config();
        config.local_database.database = "qc_scratch".to_string();
        config.local_database.password = Some("pw".to_string());
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.local_database.database, "qc_scratch");
        assert_eq!(loaded.local_database.password(), Some("pw"));
        assert_eq!(loaded.macs.len(), 2);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.local_database.database, "hgcdb_fnal");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path().join("absent.yaml")).is_err());
    }
}
