use crate::*;
use common::is_sql_identifier;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Local database name '{0}' is not a valid SQL identifier")]
    InvalidDatabaseName(String),

    #[error("Local database {field} is required")]
    MissingLocalField { field: String },

    #[error("No MAC sites defined")]
    NoMacs,

    #[error("MAC {mac}: {message}")]
    InvalidMac { mac: String, message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be between 0 and 100")]
    InvalidPercentageRange { field: String },

    #[error("{field}: lower bound {min} must be below upper bound {max}")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("{field}: logarithmic axis bounds must be positive, got {min}")]
    NonPositiveLogRange { field: String, min: f64 },

    #[error("Study '{module}': {message}")]
    InvalidStudy { module: String, message: String },

    #[error("Study for module '{0}' is defined more than once")]
    DuplicateStudy(String),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &QcConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_local_database(&config.local_database, &mut report);
    validate_macs(config, &mut report);
    validate_upload(&config.upload, &mut report);
    validate_plot(&config.plot, &mut report);
    validate_studies(&config.studies, &mut report);

    report
}

fn validate_local_database(db: &LocalDatabaseConfig, report: &mut ValidationReport) {
    if !is_sql_identifier(&db.database) {
        report.add_error(ValidationError::InvalidDatabaseName(db.database.clone()));
    }

    if db.host.is_empty() {
        report.add_error(ValidationError::MissingLocalField {
            field: "host".to_string(),
        });
    }

    if db.user.is_empty() {
        report.add_error(ValidationError::MissingLocalField {
            field: "user".to_string(),
        });
    }

    if db.admin_database.is_empty() {
        report.add_error(ValidationError::MissingLocalField {
            field: "admin_database".to_string(),
        });
    }

    if db.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "local_database.port".to_string(),
        });
    }

    if db.password().is_none() {
        report.add_warning(
            "local_database.password",
            "No password resolved; set DB_PASSWORD or local_database.password",
        );
    }
}

fn validate_macs(config: &QcConfig, report: &mut ValidationReport) {
    if config.macs.is_empty() {
        report.add_error(ValidationError::NoMacs);
        return;
    }

    let mut seen = HashSet::new();
    for (id, mac) in &config.macs {
        if !seen.insert(id.to_uppercase()) {
            report.add_error(ValidationError::InvalidMac {
                mac: id.clone(),
                message: "defined more than once (identifiers are case-insensitive)".to_string(),
            });
        }

        if mac.host.is_empty() {
            report.add_error(ValidationError::InvalidMac {
                mac: id.clone(),
                message: "host is required".to_string(),
            });
        }

        if mac.dbname.is_empty() {
            report.add_error(ValidationError::InvalidMac {
                mac: id.clone(),
                message: "dbname is required".to_string(),
            });
        }

        if mac.port == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: format!("macs.{}.port", id),
            });
        }
    }

    if !config.macs.values().any(|m| m.allow_module_listing) {
        report.add_warning(
            "macs",
            "No MAC allows module listing; --list-modules will always be refused",
        );
    }
}

fn validate_upload(upload: &UploadConfig, report: &mut ValidationReport) {
    if !(0.0..=100.0).contains(&upload.default_rel_hum) {
        report.add_error(ValidationError::InvalidPercentageRange {
            field: "upload.default_rel_hum".to_string(),
        });
    }

    if !(-60.0..=100.0).contains(&upload.default_temperature_c) {
        report.add_warning(
            "upload.default_temperature_c",
            "Default temperature is outside the expected test-stand range",
        );
    }

    if upload.reference_site.is_empty() {
        report.add_warning("upload.reference_site", "Empty reference site label");
    }

    if upload.file_extension.is_empty() {
        report.add_default("upload.file_extension", "txt");
    }
}

fn validate_plot(plot: &PlotConfig, report: &mut ValidationReport) {
    if plot.width == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "plot.width".to_string(),
        });
    }
    if plot.height == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "plot.height".to_string(),
        });
    }

    check_range("plot.voltage_range", plot.voltage_range, report);
    check_range("plot.current_range_ua", plot.current_range_ua, report);
    check_range("plot.current_range_log", plot.current_range_log, report);

    if plot.current_range_log[0] <= 0.0 {
        report.add_error(ValidationError::NonPositiveLogRange {
            field: "plot.current_range_log".to_string(),
            min: plot.current_range_log[0],
        });
    }
}

fn check_range(field: &str, range: [f64; 2], report: &mut ValidationReport) {
    if range[0].is_nan() || range[1].is_nan() || range[0] >= range[1] {
        report.add_error(ValidationError::InvalidRange {
            field: field.to_string(),
            min: range[0],
            max: range[1],
        });
    }
}

fn validate_studies(studies: &[StudyConfig], report: &mut ValidationReport) {
    let mut seen = HashSet::new();

    for study in studies {
        if !seen.insert(study.module.to_uppercase()) {
            report.add_error(ValidationError::DuplicateStudy(study.module.clone()));
        }

        if study.data_dirs.is_empty() {
            report.add_error(ValidationError::InvalidStudy {
                module: study.module.clone(),
                message: "at least one data directory is required".to_string(),
            });
        }

        if study.conditions.is_empty() {
            report.add_error(ValidationError::InvalidStudy {
                module: study.module.clone(),
                message: "at least one condition label is required".to_string(),
            });
        }

        for dir in &study.data_dirs {
            if !dir.is_dir() {
                report.add_warning(
                    &format!("studies.{}.data_dirs", study.module),
                    &format!("{:?} does not exist or is not a directory", dir),
                );
            }
        }
    }
}
