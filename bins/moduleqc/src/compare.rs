//! IV curves for comparison plots

use anyhow::{Context, Result};
use cli::LabelStyle;
use ivcurve::curve::{conditions_label, reference_label, test_label};
use ivcurve::file::{read_iv_file, test_timestamp};
use ivcurve::IvCurve;
use std::path::PathBuf;
use storage::Record;
use tracing::warn;

fn text_or_none(record: &Record, column: &str) -> String {
    record.text(column).unwrap_or_else(|| "None".to_string())
}

/// One curve per fetched row, labelled in the requested style
pub fn curves_from_records(records: &[Record], mac: &str, style: LabelStyle) -> Vec<IvCurve> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let module = text_or_none(r, "module_name");
            let test_no = text_or_none(r, "mod_ivtest_no");
            let label = match style {
                LabelStyle::Test => test_label(&module, &test_no),
                LabelStyle::Conditions => conditions_label(
                    mac,
                    i,
                    &text_or_none(r, "rel_hum"),
                    &text_or_none(r, "temp_c"),
                    &text_or_none(r, "date_test"),
                    &text_or_none(r, "time_test"),
                ),
            };
            IvCurve::new(
                label,
                r.f64_vec("meas_v").unwrap_or_default(),
                r.f64_vec("meas_i").unwrap_or_default(),
            )
            .with_origin(module, test_no)
        })
        .collect()
}

/// Reference files, labelled explicitly or from site and file timestamp
pub fn load_references(paths: &[PathBuf], labels: &[String], site: &str) -> Result<Vec<IvCurve>> {
    if labels.len() > paths.len() {
        warn!(
            labels = labels.len(),
            references = paths.len(),
            "More reference labels than reference files"
        );
    }

    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let curve = read_iv_file(path)
                .with_context(|| format!("Failed to read reference file {:?}", path))?;
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| reference_label(site, i, test_timestamp(path)));
            Ok(curve.with_label(label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::CellValue;

    fn row(test_no: i64, meas_i: Vec<f32>) -> Record {
        let mut r = Record::new();
        r.push("rel_hum", CellValue::Text("40.5".into()));
        r.push("temp_c", CellValue::Text("23".into()));
        r.push("module_name", CellValue::Text("320-ML-F3TC-CM-0102".into()));
        r.push("date_test", CellValue::Text("2025-07-01".into()));
        r.push("time_test", CellValue::Null);
        r.push("meas_v", CellValue::RealArray(vec![0.0, 100.0]));
        r.push("meas_i", CellValue::RealArray(meas_i));
        r.push("mod_ivtest_no", CellValue::Int(test_no));
        r
    }

    #[test]
    fn test_labels_by_style() {
        let records = vec![row(4, vec![1e-9, 2e-9]), row(5, vec![])];

        let curves = curves_from_records(&records, "CMU", LabelStyle::Test);
        assert_eq!(curves[0].label, "320-ML-F3TC-CM-0102 (Test 4)");
        assert_eq!(curves[0].voltage, vec![0.0, 100.0]);
        assert!(curves[1].check().is_err());

        let curves = curves_from_records(&records, "CMU", LabelStyle::Conditions);
        assert_eq!(curves[1].label, "CMU (Test 2)- 40.5% RH, 23°C, 2025-07-01 None");
        assert!(curves[1].check().is_err());
        assert_eq!(curves[1].identity(), "320-ML-F3TC-CM-0102 (Test 5)");
    }

    #[test]
    fn test_reference_labels() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("iv_320-MH-F1T4-SB-0006_20250728_132204_normal.txt");
        let b = dir.path().join("iv_320-MH-F1T4-SB-0006_20250728_132608_normal.txt");
        std::fs::write(&a, "-10 -1e-9\n").unwrap();
        std::fs::write(&b, "-10 -1e-9\n").unwrap();

        let refs = load_references(
            &[a, b],
            &["FNAL Test 1, 44% RH, 23°C".to_string()],
            "FNAL",
        )
        .unwrap();
        assert_eq!(refs[0].label, "FNAL Test 1, 44% RH, 23°C");
        assert_eq!(refs[1].label, "FNAL Test 2, 2025-07-28 13:26:08");
        assert_eq!(refs[1].current, vec![1e-9]);
    }

    #[test]
    fn test_missing_reference_is_error() {
        assert!(load_references(&[PathBuf::from("/no/such.txt")], &[], "FNAL").is_err());
    }
}
