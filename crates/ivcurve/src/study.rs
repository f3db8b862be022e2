//! IV curves of one module measured under a series of conditions
//!
//! Each configured data directory holds one `.txt` file per condition. Files
//! are taken in sorted order and paired with the module's condition labels.

use crate::colors::study_color;
use crate::file::parse_iv_text;
use crate::plot::{IvPlot, Marker, Series, YScale};
use crate::{IvError, IvResult};
use config::{PlotConfig, StudyConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const DATA_EXTENSION: &str = "txt";

/// Microamps per amp
pub const MICROAMPS: f64 = 1e6;

/// All points measured under one condition label
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCurve {
    pub condition: String,
    pub voltage: Vec<f64>,
    /// Leakage current in µA
    pub current_ua: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyData {
    pub module: String,
    /// In first-seen condition order
    pub curves: Vec<ConditionCurve>,
}

/// A point of the study, located by condition
#[derive(Debug, Clone, PartialEq)]
pub struct StudyPoint {
    pub condition: String,
    pub voltage: f64,
    pub current_ua: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyAnalysis {
    pub conditions: Vec<String>,
    pub min: StudyPoint,
    pub max: StudyPoint,
}

pub fn find_study<'a>(studies: &'a [StudyConfig], module: &str) -> IvResult<&'a StudyConfig> {
    studies
        .iter()
        .find(|s| s.module.eq_ignore_ascii_case(module))
        .ok_or_else(|| IvError::UnknownModule(module.to_string()))
}

/// Sorted `.txt` files of a directory
pub fn list_data_files(dir: &Path) -> IvResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| IvError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IvError::io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(DATA_EXTENSION) {
            files.push(path);
        } else {
            debug!(path = ?path, "Ignoring non-data file");
        }
    }
    files.sort();
    Ok(files)
}

/// Pair files with labels in order; surplus files are dropped
pub fn pair_with_conditions(files: Vec<PathBuf>, conditions: &[String]) -> Vec<(PathBuf, String)> {
    files.into_iter().zip(conditions.iter().cloned()).collect()
}

fn push_points(
    curves: &mut Vec<ConditionCurve>,
    condition: String,
    voltage: Vec<f64>,
    current: Vec<f64>,
) {
    let current_ua = current.into_iter().map(|i| i.abs() * MICROAMPS);
    let voltage = voltage.into_iter().map(f64::abs);

    match curves.iter_mut().find(|c| c.condition == condition) {
        Some(existing) => {
            existing.voltage.extend(voltage);
            existing.current_ua.extend(current_ua);
        }
        None => curves.push(ConditionCurve {
            condition,
            voltage: voltage.collect(),
            current_ua: current_ua.collect(),
        }),
    }
}

#[instrument(skip(study), fields(module = %study.module))]
pub fn load_study(study: &StudyConfig) -> IvResult<StudyData> {
    let mut curves = Vec::new();
    let mut points = 0;

    for dir in &study.data_dirs {
        let files = list_data_files(dir)?;
        if files.len() > study.conditions.len() {
            warn!(
                dir = ?dir,
                files = files.len(),
                conditions = study.conditions.len(),
                "More data files than condition labels, extra files ignored"
            );
        }

        for (path, condition) in pair_with_conditions(files, &study.conditions) {
            info!(file = ?path.file_name().unwrap_or_default(), %condition, "Processing data file");
            let content = fs::read_to_string(&path).map_err(|e| IvError::io(&path, e))?;
            let (voltage, current) = parse_iv_text(&content, &path)?;
            points += voltage.len();
            push_points(&mut curves, condition, voltage, current);
        }
    }

    info!(conditions = curves.len(), points, "Loaded study data");
    Ok(StudyData {
        module: study.module.clone(),
        curves,
    })
}

/// Lowest and highest leakage current over all conditions
pub fn analyze(data: &StudyData) -> IvResult<StudyAnalysis> {
    let mut points = data.curves.iter().flat_map(|c| {
        c.voltage
            .iter()
            .zip(&c.current_ua)
            .map(move |(&v, &i)| StudyPoint {
                condition: c.condition.clone(),
                voltage: v,
                current_ua: i,
            })
    });

    let first = points
        .next()
        .ok_or_else(|| IvError::InvalidData(format!("no data for {}", data.module)))?;
    let (min, max) = points.fold((first.clone(), first), |(min, max), p| {
        let min = if p.current_ua < min.current_ua { p.clone() } else { min };
        let max = if p.current_ua > max.current_ua { p } else { max };
        (min, max)
    });

    let analysis = StudyAnalysis {
        conditions: data.curves.iter().map(|c| c.condition.clone()).collect(),
        min,
        max,
    };

    info!(module = %data.module, conditions = ?analysis.conditions, "Unique conditions");
    info!(module = %data.module, current_ua = analysis.min.current_ua, "Min leakage current");
    info!(module = %data.module, current_ua = analysis.max.current_ua, "Max leakage current");
    debug!(module = %data.module, point = ?analysis.max, "Max current point");
    debug!(module = %data.module, point = ?analysis.min, "Min current point");
    Ok(analysis)
}

pub fn default_output_file(module: &str) -> String {
    format!("IV_curve_{}_nonLog_zoomIn.png", module)
}

/// Plot in the first data directory; returns the written path
pub fn plot_study(
    data: &StudyData,
    study: &StudyConfig,
    plot: &PlotConfig,
    output_file: Option<&str>,
) -> IvResult<PathBuf> {
    if data.curves.is_empty() {
        return Err(IvError::InvalidData(format!("no data for {}", data.module)));
    }
    let dir = study.data_dirs.first().ok_or_else(|| {
        IvError::InvalidData(format!("no data directory for {}", data.module))
    })?;

    let file_name = output_file
        .map(str::to_string)
        .or_else(|| study.output_file.clone())
        .unwrap_or_else(|| default_output_file(&data.module));
    let output_path = dir.join(file_name);

    let series = data
        .curves
        .iter()
        .enumerate()
        .map(|(idx, c)| Series {
            label: c.condition.clone(),
            points: c.voltage.iter().copied().zip(c.current_ua.iter().copied()).collect(),
            color: study_color(idx),
            marker: Marker::Circle,
        })
        .collect();

    IvPlot::new(format!("IV Curve for {}", data.module))
        .axis_labels("Bias Voltage (V)", "Leakage Current (μA)")
        .size(plot.width, plot.height)
        .y_scale(YScale::Linear)
        .ranges(
            Some((plot.voltage_range[0], plot.voltage_range[1])),
            Some((plot.current_range_ua[0], plot.current_range_ua[1])),
        )
        .with_series(series)
        .render(&output_path)?;

    Ok(output_path)
}

/// Load, analyse and plot one study
pub fn process_study(
    study: &StudyConfig,
    plot: &PlotConfig,
    output_file: Option<&str>,
) -> IvResult<(StudyAnalysis, PathBuf)> {
    let data = load_study(study)?;
    let analysis = analyze(&data)?;
    let path = plot_study(&data, study, plot, output_file)?;
    Ok((analysis, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn study(dirs: Vec<PathBuf>, conditions: &[&str]) -> StudyConfig {
        StudyConfig {
            module: "320-ML-F3TC-CM-0102".to_string(),
            data_dirs: dirs,
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            output_file: None,
        }
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_find_study() {
        let studies = vec![study(vec![], &["a"])];
        assert!(find_study(&studies, "320-ml-f3tc-cm-0102").is_ok());
        assert_matches!(
            find_study(&studies, "other-module"),
            Err(IvError::UnknownModule(m)) if m == "other-module"
        );
    }

    #[test]
    fn test_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", "0 0\n");
        write(dir.path(), "a.txt", "0 0\n");
        write(dir.path(), "notes.md", "x");
        write(dir.path(), "c.pickle", "x");

        let files = list_data_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_pairing_drops_extra_files() {
        let files = vec![PathBuf::from("1.txt"), PathBuf::from("2.txt"), PathBuf::from("3.txt")];
        let conditions = vec!["dry".to_string(), "wet".to_string()];
        let pairs = pair_with_conditions(files, &conditions);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], (PathBuf::from("2.txt"), "wet".to_string()));
    }

    #[test]
    fn test_load_scales_to_microamps() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01.txt", "-100 -1.0e-6\n-200 -1.5e-6\n");
        write(dir.path(), "02.txt", "-100 -0.5e-6\n");
        write(dir.path(), "03.txt", "-100 -9.0e-6\n");

        let config = study(vec![dir.path().to_path_buf()], &["RH 40", "RH 0"]);
        let data = load_study(&config).unwrap();

        assert_eq!(data.curves.len(), 2);
        assert_eq!(data.curves[0].condition, "RH 40");
        assert_eq!(data.curves[0].voltage, vec![100.0, 200.0]);
        assert!((data.curves[0].current_ua[1] - 1.5).abs() < 1e-9);
        assert!((data.curves[1].current_ua[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_same_condition_merges_across_dirs() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(a.path(), "x.txt", "10 1e-6\n");
        write(b.path(), "y.txt", "20 2e-6\n");

        let config = study(vec![a.path().to_path_buf(), b.path().to_path_buf()], &["dry"]);
        let data = load_study(&config).unwrap();
        assert_eq!(data.curves.len(), 1);
        assert_eq!(data.curves[0].voltage, vec![10.0, 20.0]);
    }

    #[test]
    fn test_analyze_min_max() {
        let data = StudyData {
            module: "M".to_string(),
            curves: vec![
                ConditionCurve {
                    condition: "dry".to_string(),
                    voltage: vec![100.0, 200.0],
                    current_ua: vec![0.4, 0.9],
                },
                ConditionCurve {
                    condition: "wet".to_string(),
                    voltage: vec![100.0, 200.0],
                    current_ua: vec![0.2, 1.7],
                },
            ],
        };

        let analysis = analyze(&data).unwrap();
        assert_eq!(analysis.conditions, ["dry", "wet"]);
        assert_eq!(analysis.min.condition, "wet");
        assert_eq!(analysis.min.voltage, 100.0);
        assert_eq!(analysis.max.current_ua, 1.7);
        assert_eq!(analysis.max.voltage, 200.0);
    }

    #[test]
    fn test_analyze_empty_is_error() {
        let data = StudyData {
            module: "M".to_string(),
            curves: vec![],
        };
        assert_matches!(analyze(&data), Err(IvError::InvalidData(_)));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let config = study(vec![PathBuf::from("/no/such/dir")], &["a"]);
        assert_matches!(load_study(&config), Err(IvError::Io { .. }));
    }

    #[test]
    fn test_process_study_writes_plot() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01.txt", "-100 -0.4e-6\n-300 -0.9e-6\n");
        write(dir.path(), "02.txt", "-100 -0.2e-6\n-300 -1.7e-6\n");

        let config = study(vec![dir.path().to_path_buf()], &["dry", "wet"]);
        let plot = PlotConfig {
            width: 640,
            height: 480,
            ..PlotConfig::default()
        };

        let (analysis, path) = process_study(&config, &plot, None).unwrap();
        assert_eq!(analysis.max.condition, "wet");
        assert_eq!(
            path,
            dir.path().join("IV_curve_320-ML-F3TC-CM-0102_nonLog_zoomIn.png")
        );
        assert!(fs::metadata(&path).unwrap().len() > 0);

        let named = plot_study(&load_study(&config).unwrap(), &config, &plot, Some("zoom.png"))
            .unwrap();
        assert_eq!(named, dir.path().join("zoom.png"));
        assert!(named.is_file());
    }

    #[test]
    fn test_default_output_file() {
        assert_eq!(
            default_output_file("320-ML-F3TC-CM-0102"),
            "IV_curve_320-ML-F3TC-CM-0102_nonLog_zoomIn.png"
        );
    }
}
