//! Local IV files: selection, environment prompts, row assembly

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use config::UploadConfig;
use ivcurve::file::{module_name_from_path, test_timestamp};
use ivcurve::IvCurve;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use storage::NewModuleTest;
use tracing::{debug, warn};

/// Conditions entered for one file
#[derive(Debug, Clone, PartialEq)]
pub struct TestEnvironment {
    pub temperature_c: f64,
    pub rel_hum: f64,
    pub comments: Option<String>,
}

impl TestEnvironment {
    pub fn defaults(upload: &UploadConfig) -> Self {
        Self {
            temperature_c: upload.default_temperature_c,
            rel_hum: upload.default_rel_hum,
            comments: None,
        }
    }
}

fn normalize_module(name: &str) -> String {
    name.replace('-', "").to_uppercase()
}

/// Sorted data files with their derived module names
pub fn collect_iv_files(
    dir: &Path,
    extension: &str,
    module: Option<&str>,
) -> Result<Vec<(PathBuf, String)>> {
    let wanted = module.map(normalize_module);
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let path = entry
            .with_context(|| format!("Failed to read directory {:?}", dir))?
            .path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }

        let Some(name) = module_name_from_path(&path) else {
            warn!(path = ?path, "Cannot derive module name from file name, skipping");
            continue;
        };

        match &wanted {
            Some(w) if *w != name => debug!(path = ?path, module = %name, "Skipping other module"),
            _ => files.push((path, name)),
        }
    }

    files.sort();
    Ok(files)
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<String> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Empty input means `default`; anything unparsable is `None`
fn parse_or_default(input: &str, default: f64) -> Option<f64> {
    if input.is_empty() {
        Some(default)
    } else {
        input.parse().ok()
    }
}

/// Ask for temperature, humidity and comments
///
/// Invalid numbers abandon the prompts and fall back to the configured
/// defaults without a comment.
pub fn prompt_environment<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    file: &str,
    upload: &UploadConfig,
) -> io::Result<TestEnvironment> {
    let defaults = TestEnvironment::defaults(upload);
    writeln!(out, "\nProcessing file: {}", file)?;

    let temp = ask(
        input,
        out,
        &format!(
            "Enter temperature (°C) for {} [default: {:?}]: ",
            file, defaults.temperature_c
        ),
    )?;
    let Some(temperature_c) = parse_or_default(&temp, defaults.temperature_c) else {
        return invalid_input(out, file, defaults);
    };

    let rh = ask(
        input,
        out,
        &format!(
            "Enter relative humidity (%) for {} [default: {:?}]: ",
            file, defaults.rel_hum
        ),
    )?;
    let Some(rel_hum) = parse_or_default(&rh, defaults.rel_hum) else {
        return invalid_input(out, file, defaults);
    };

    let comments = ask(input, out, &format!("Enter any comments for {} (optional): ", file))?;

    Ok(TestEnvironment {
        temperature_c,
        rel_hum,
        comments: if comments.is_empty() { None } else { Some(comments) },
    })
}

fn invalid_input<W: Write>(
    out: &mut W,
    file: &str,
    defaults: TestEnvironment,
) -> io::Result<TestEnvironment> {
    warn!(file, "Invalid environment input, using defaults");
    writeln!(
        out,
        "Invalid input for {}. Using defaults: {:?}°C, {:?}%",
        file, defaults.temperature_c, defaults.rel_hum
    )?;
    Ok(defaults)
}

/// Row for one uploaded file
pub fn upload_record(
    path: &Path,
    curve: &IvCurve,
    module_name: &str,
    env: &TestEnvironment,
    source: &str,
    imported_at: NaiveDateTime,
) -> NewModuleTest {
    let timestamp = test_timestamp(path);
    let to_f32 = |values: &[f64]| values.iter().map(|v| *v as f32).collect::<Vec<_>>();

    NewModuleTest {
        module_name: Some(module_name.to_string()),
        test_type: Some("iv".to_string()),
        source: Some(source.to_string()),
        rel_hum: Some(format!("{:?}", env.rel_hum)),
        temp_c: Some(format!("{:?}", env.temperature_c)),
        date_test: Some(timestamp.date()),
        test_timestamp: Some(timestamp),
        meas_v: Some(to_f32(&curve.voltage)),
        meas_i: Some(to_f32(&curve.current)),
        imported_at,
        comments: env.comments.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn upload_config() -> UploadConfig {
        UploadConfig {
            default_temperature_c: 25.0,
            default_rel_hum: 50.0,
            reference_site: "FNAL".to_string(),
            file_extension: "txt".to_string(),
        }
    }

    fn prompt(input: &str) -> (TestEnvironment, String) {
        let mut out = Vec::new();
        let env = prompt_environment(&mut Cursor::new(input), &mut out, "f.txt", &upload_config())
            .unwrap();
        (env, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_prompt_values() {
        let (env, out) = prompt("23\n44\ndry air\n");
        assert_eq!(env.temperature_c, 23.0);
        assert_eq!(env.rel_hum, 44.0);
        assert_eq!(env.comments.as_deref(), Some("dry air"));
        assert!(out.contains("[default: 25.0]"));
    }

    #[test]
    fn test_prompt_empty_takes_defaults() {
        let (env, _) = prompt("\n\n\n");
        assert_eq!(env, TestEnvironment::defaults(&upload_config()));
    }

    #[test]
    fn test_prompt_eof_takes_defaults() {
        let (env, _) = prompt("");
        assert_eq!(env.temperature_c, 25.0);
        assert!(env.comments.is_none());
    }

    #[test]
    fn test_prompt_invalid_falls_back() {
        let (env, out) = prompt("21\nhumid\nignored comment\n");
        assert_eq!(env, TestEnvironment::defaults(&upload_config()));
        assert!(out.contains("Invalid input for f.txt. Using defaults: 25.0°C, 50.0%"));
    }

    #[test]
    fn test_collect_files_filters_module() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "iv_320-MH-F1T4-SB-0006_20250728_132608_normal.txt",
            "iv_320-MH-F1T4-SB-0006_20250728_132204_normal.txt",
            "iv_320-ML-F3TC-CM-0102_20250701_101500_normal.txt",
            "notes.csv",
            "single.txt",
        ] {
            fs::write(dir.path().join(name), "0 0\n").unwrap();
        }

        let all = collect_iv_files(dir.path(), "txt", None).unwrap();
        assert_eq!(all.len(), 3);

        let some = collect_iv_files(dir.path(), "txt", Some("320-mh-f1t4-sb-0006")).unwrap();
        assert_eq!(some.len(), 2);
        assert!(some[0].0.to_string_lossy().contains("132204"));
        assert_eq!(some[0].1, "320MHF1T4SB0006");
    }

    #[test]
    fn test_upload_record() {
        let path = Path::new("iv_320-MH-F1T4-SB-0006_20250728_132204_normal.txt");
        let curve = IvCurve::new("x", vec![10.0, 20.0], vec![1e-9, 2e-9]);
        let env = TestEnvironment {
            temperature_c: 23.0,
            rel_hum: 44.5,
            comments: None,
        };
        let imported = NaiveDate::from_ymd_opt(2025, 8, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let row = upload_record(path, &curve, "320MHF1T4SB0006", &env, "FNAL", imported);
        assert_eq!(row.temp_c.as_deref(), Some("23.0"));
        assert_eq!(row.rel_hum.as_deref(), Some("44.5"));
        assert_eq!(row.source.as_deref(), Some("FNAL"));
        assert_eq!(row.date_test, NaiveDate::from_ymd_opt(2025, 7, 28));
        assert_eq!(row.meas_v, Some(vec![10.0, 20.0]));
        assert!(row.status.is_none());
    }
}
