use chrono::NaiveDateTime;
use std::fmt;

/// Relative padding added around auto-scaled data
pub const AUTO_RANGE_MARGIN: f64 = 0.05;

/// Voltage/current pairs with a legend label
#[derive(Debug, Clone, PartialEq)]
pub struct IvCurve {
    pub label: String,
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
    /// Module and test number of a database curve
    pub origin: Option<CurveOrigin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveOrigin {
    pub module: String,
    pub test_no: String,
}

/// Why a curve cannot be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveIssue {
    Empty,
    LengthMismatch { voltage: usize, current: usize },
}

impl fmt::Display for CurveIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveIssue::Empty => write!(f, "empty voltage/current arrays"),
            CurveIssue::LengthMismatch { voltage, current } => write!(
                f,
                "mismatched voltage/current arrays ({} vs {})",
                voltage, current
            ),
        }
    }
}

impl IvCurve {
    pub fn new(label: impl Into<String>, voltage: Vec<f64>, current: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            voltage,
            current,
            origin: None,
        }
    }

    pub fn with_origin(mut self, module: impl Into<String>, test_no: impl Into<String>) -> Self {
        self.origin = Some(CurveOrigin {
            module: module.into(),
            test_no: test_no.into(),
        });
        self
    }

    /// `"<module> (Test <n>)"` when the origin is known, else the label
    pub fn identity(&self) -> String {
        match &self.origin {
            Some(o) => test_label(&o.module, &o.test_no),
            None => self.label.clone(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn check(&self) -> Result<(), CurveIssue> {
        if self.voltage.is_empty() || self.current.is_empty() {
            return Err(CurveIssue::Empty);
        }
        if self.voltage.len() != self.current.len() {
            return Err(CurveIssue::LengthMismatch {
                voltage: self.voltage.len(),
                current: self.current.len(),
            });
        }
        Ok(())
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.voltage
            .iter()
            .copied()
            .zip(self.current.iter().copied())
            .collect()
    }

    /// Scale currents, e.g. `1e6` for µA
    pub fn scaled_current(mut self, factor: f64) -> Self {
        for i in &mut self.current {
            *i *= factor;
        }
        self
    }
}

/// Points drawable on a logarithmic current axis
pub fn log_points(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    points
        .iter()
        .copied()
        .filter(|&(_, i)| i > 0.0 && i.is_finite())
        .collect()
}

/// Data range padded by [`AUTO_RANGE_MARGIN`]
///
/// On a log axis the padding is applied in decades. A single value gets a
/// unit-wide (linear) or one-decade (log) window around it.
pub fn auto_range<I>(values: I, log: bool) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite() && (!log || *v > 0.0))
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

    if log {
        let (lo, hi) = (min.log10(), max.log10());
        if hi - lo <= f64::EPSILON {
            return Some((10f64.powf(lo - 1.0), 10f64.powf(hi + 1.0)));
        }
        let pad = (hi - lo) * AUTO_RANGE_MARGIN;
        Some((10f64.powf(lo - pad), 10f64.powf(hi + pad)))
    } else {
        if max - min <= f64::EPSILON {
            return Some((min - 0.5, max + 0.5));
        }
        let pad = (max - min) * AUTO_RANGE_MARGIN;
        Some((min - pad, max + pad))
    }
}

/// `"<module> (Test <n>)"`
pub fn test_label(module: &str, test_no: &str) -> String {
    format!("{} (Test {})", module, test_no)
}

/// `"<MAC> (Test <n>)- <RH>% RH, <T>°C, <date> <time>"`, `n` counted from 1
pub fn conditions_label(
    mac: &str,
    index: usize,
    rel_hum: &str,
    temp_c: &str,
    date: &str,
    time: &str,
) -> String {
    format!(
        "{} (Test {})- {}% RH, {}°C, {} {}",
        mac,
        index + 1,
        rel_hum,
        temp_c,
        date,
        time
    )
}

/// `"<site> Test <n>, <timestamp>"`, `n` counted from 1
pub fn reference_label(site: &str, index: usize, timestamp: NaiveDateTime) -> String {
    format!(
        "{} Test {}, {}",
        site,
        index + 1,
        timestamp.format("%Y-%m-%d %H:%M:%S")
    )
}
