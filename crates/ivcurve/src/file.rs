//! IV text files
//!
//! Files hold two whitespace-separated columns, bias voltage and leakage
//! current, without a header. Names look like
//! `iv_320-MH-F1T4-SB-0006_20250728_132204_normal.txt`.

use crate::{IvCurve, IvError, IvResult};
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{8})_(\d{6})").expect("valid timestamp regex"))
}

/// Parse file content; `path` is only used in error messages
pub fn parse_iv_text(content: &str, path: &Path) -> IvResult<(Vec<f64>, Vec<f64>)> {
    let mut voltage = Vec::new();
    let mut current = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        let parse_error = |message: String| IvError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        if fields.len() != 2 {
            return Err(parse_error(format!(
                "expected 2 columns, found {}",
                fields.len()
            )));
        }

        let v: f64 = fields[0]
            .parse()
            .map_err(|_| parse_error(format!("invalid voltage {:?}", fields[0])))?;
        let i: f64 = fields[1]
            .parse()
            .map_err(|_| parse_error(format!("invalid current {:?}", fields[1])))?;

        voltage.push(v.abs());
        current.push(i.abs());
    }

    Ok((voltage, current))
}

/// Read an IV file; the curve is labelled with the file name
pub fn read_iv_file(path: &Path) -> IvResult<IvCurve> {
    let content = fs::read_to_string(path).map_err(|e| IvError::io(path, e))?;
    let (voltage, current) = parse_iv_text(&content, path)?;
    debug!(path = ?path, points = voltage.len(), "Read IV file");

    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(IvCurve::new(label, voltage, current))
}

/// `YYYYMMDD_HHMMSS` anywhere in the name
pub fn parse_timestamp_from_filename(name: &str) -> Option<NaiveDateTime> {
    let caps = timestamp_regex().captures(name)?;
    let stamp = format!("{}{}", &caps[1], &caps[2]);
    NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S").ok()
}

/// Timestamp from the file name, or the current local time
pub fn test_timestamp(path: &Path) -> NaiveDateTime {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match parse_timestamp_from_filename(&name) {
        Some(ts) => ts,
        None => {
            warn!(file = %name, "No valid timestamp in file name, using current time");
            Local::now().naive_local()
        }
    }
}

/// Second `_` field of the stem, dashes removed, upper-cased
pub fn module_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let field = stem.split('_').nth(1)?;
    let name = field.replace('-', "").to_uppercase();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
