use common::MacId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QcConfig {
    /// Directory that CSV exports and plots are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub local_database: LocalDatabaseConfig,
    /// MAC sites keyed by identifier (e.g. CMU, UCSB)
    #[serde(default = "default_macs")]
    pub macs: BTreeMap<String, MacConfig>,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default)]
    pub studies: Vec<StudyConfig>,
}

impl QcConfig {
    /// Look up a MAC by identifier, ignoring case.
    pub fn mac(&self, id: &MacId) -> Option<&MacConfig> {
        self.macs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id.as_str()))
            .map(|(_, mac)| mac)
    }

    /// Like [`QcConfig::mac`], but an unknown MAC is an error naming the
    /// configured ones.
    pub fn require_mac(&self, id: &MacId) -> common::Result<&MacConfig> {
        self.mac(id).ok_or_else(|| {
            let known: Vec<String> = self.mac_ids().iter().map(|m| m.to_string()).collect();
            common::Error::not_found(format!(
                "MAC '{}' (configured: {})",
                id,
                known.join(", ")
            ))
        })
    }

    /// Configured MAC identifiers, upper case
    pub fn mac_ids(&self) -> Vec<MacId> {
        self.macs.keys().map(|k| MacId::new(k.as_str())).collect()
    }
}

/// The PostgreSQL server that test records are mirrored into.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalDatabaseConfig {
    #[serde(default = "default_local_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_local_host")]
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    /// Database used for administrative statements such as CREATE DATABASE
    #[serde(default = "default_admin_database")]
    pub admin_database: String,
    /// Database holding the module_tests table
    #[serde(default = "default_local_database")]
    pub database: String,
}

impl LocalDatabaseConfig {
    /// Password to connect with, if one was resolved.
    ///
    /// Empty values and `${VAR}` placeholders left by a missing environment
    /// variable count as "no password".
    pub fn password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty() && !has_unresolved_env_vars(p))
    }
}

impl Default for LocalDatabaseConfig {
    fn default() -> Self {
        Self {
            user: default_local_user(),
            password: Some("${DB_PASSWORD}".to_string()),
            host: default_local_host(),
            port: default_postgres_port(),
            admin_database: default_admin_database(),
            database: default_local_database(),
        }
    }
}

/// Connection settings for one MAC's read-only database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MacConfig {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    #[serde(default = "default_mac_dbname")]
    pub dbname: String,
    #[serde(default = "default_mac_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Whether `--list-modules` may query this MAC
    #[serde(default)]
    pub allow_module_listing: bool,
}

impl MacConfig {
    pub fn password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty() && !has_unresolved_env_vars(p))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Temperature (°C) used when the operator gives none
    #[serde(default = "default_temperature_c")]
    pub default_temperature_c: f64,
    /// Relative humidity (%) used when the operator gives none
    #[serde(default = "default_rel_hum")]
    pub default_rel_hum: f64,
    /// Site recorded as the `source` of uploaded files
    #[serde(default = "default_reference_site")]
    pub reference_site: String,
    #[serde(default = "default_data_extension")]
    pub file_extension: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_temperature_c: default_temperature_c(),
            default_rel_hum: default_rel_hum(),
            reference_site: default_reference_site(),
            file_extension: default_data_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlotConfig {
    #[serde(default = "default_plot_width")]
    pub width: u32,
    #[serde(default = "default_plot_height")]
    pub height: u32,
    /// Bias voltage axis (V) for comparison and study plots
    #[serde(default = "default_voltage_range")]
    pub voltage_range: [f64; 2],
    /// Leakage current axis (A) for logarithmic comparison plots
    #[serde(default = "default_current_range_log")]
    pub current_range_log: [f64; 2],
    /// Leakage current axis (µA) for condition study plots
    #[serde(default = "default_current_range_ua")]
    pub current_range_ua: [f64; 2],
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_plot_width(),
            height: default_plot_height(),
            voltage_range: default_voltage_range(),
            current_range_log: default_current_range_log(),
            current_range_ua: default_current_range_ua(),
        }
    }
}

/// A series of IV measurements of one module under changing conditions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StudyConfig {
    pub module: String,
    /// Directories scanned in order; files pair with `conditions` by sorted name
    pub data_dirs: Vec<PathBuf>,
    /// One legend label per measurement file
    pub conditions: Vec<String>,
    #[serde(default)]
    pub output_file: Option<String>,
}
