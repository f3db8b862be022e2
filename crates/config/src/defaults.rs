use super::MacConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_postgres_port() -> u16 {
    5432
}

pub fn default_local_user() -> String {
    "postgres".to_string()
}

pub fn default_local_host() -> String {
    "localhost".to_string()
}

pub fn default_admin_database() -> String {
    "postgres".to_string()
}

pub fn default_local_database() -> String {
    "hgcdb_fnal".to_string()
}

pub fn default_mac_dbname() -> String {
    "hgcdb".to_string()
}

pub fn default_mac_user() -> String {
    "viewer".to_string()
}

pub fn default_macs() -> BTreeMap<String, MacConfig> {
    let mut macs = BTreeMap::new();
    macs.insert(
        "CMU".to_string(),
        MacConfig {
            host: "cmsmac04.phys.cmu.edu".to_string(),
            port: default_postgres_port(),
            dbname: default_mac_dbname(),
            user: default_mac_user(),
            password: None,
            allow_module_listing: true,
        },
    );
    macs.insert(
        "UCSB".to_string(),
        MacConfig {
            host: "gut.physics.ucsb.edu".to_string(),
            port: default_postgres_port(),
            dbname: default_mac_dbname(),
            user: default_mac_user(),
            password: None,
            allow_module_listing: false,
        },
    );
    macs
}

pub fn default_temperature_c() -> f64 {
    25.0
}

pub fn default_rel_hum() -> f64 {
    50.0
}

pub fn default_reference_site() -> String {
    "FNAL".to_string()
}

pub fn default_data_extension() -> String {
    "txt".to_string()
}

pub fn default_plot_width() -> u32 {
    1200
}

pub fn default_plot_height() -> u32 {
    800
}

pub fn default_voltage_range() -> [f64; 2] {
    [0.0, 600.0]
}

pub fn default_current_range_log() -> [f64; 2] {
    [1e-9, 1e-3]
}

pub fn default_current_range_ua() -> [f64; 2] {
    [0.0, 2.0]
}
