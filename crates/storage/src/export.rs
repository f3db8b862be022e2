//! CSV files and console rendering for fetched records

use crate::{CellValue, Record, StorageResult};
use chrono::NaiveDateTime;
use common::{DataType, MacId, ModuleName};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Timestamp format used in export file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

/// What an export file holds, which decides its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Every module of a data type
    AsOf(DataType),
    /// Only the modules given on the command line
    Custom(DataType),
    ModuleNames,
}

pub fn export_file_name(mac: &MacId, kind: ExportKind, now: NaiveDateTime) -> String {
    let stamp = now.format(FILE_TIMESTAMP_FORMAT);
    match kind {
        ExportKind::AsOf(dt) => format!("{}_{}_asof_{}.csv", mac, dt, stamp),
        ExportKind::Custom(dt) => format!("{}_{}_custom_{}.csv", mac, dt, stamp),
        ExportKind::ModuleNames => format!("{}_module_names_{}.csv", mac, stamp),
    }
}

pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// CSV field for a cell; NULL is an empty field
pub fn csv_field(value: &CellValue) -> String {
    match value {
        CellValue::Null => String::new(),
        other => csv_escape(&other.to_string()),
    }
}

fn csv_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Header from the first record, then one line per record
pub fn write_records_csv<W: Write>(out: &mut W, records: &[Record]) -> StorageResult<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };

    writeln!(out, "{}", csv_line(first.column_names().map(csv_escape)))?;
    for record in records {
        writeln!(out, "{}", csv_line(record.iter().map(|(_, v)| csv_field(v))))?;
    }
    Ok(())
}

pub fn write_records_csv_file(path: &Path, records: &[Record]) -> StorageResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_records_csv(&mut out, records)?;
    out.flush()?;
    info!(path = ?path, rows = records.len(), "Wrote CSV export");
    Ok(())
}

pub fn write_module_names_csv_file(path: &Path, names: &[ModuleName]) -> StorageResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "module_name")?;
    for name in names {
        writeln!(out, "{}", csv_escape(name.as_str()))?;
    }
    out.flush()?;
    info!(path = ?path, rows = names.len(), "Wrote module name export");
    Ok(())
}

/// `{column: value, ...}`
pub fn format_record(record: &Record) -> String {
    let body = record
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 28)
            .unwrap()
            .and_hms_opt(13, 22, 4)
            .unwrap()
    }

    fn record(name: &str, comment: CellValue) -> Record {
        let mut r = Record::new();
        r.push("module_name", CellValue::Text(name.into()));
        r.push("meas_v", CellValue::RealArray(vec![0.0, 5.5]));
        r.push("comments", comment);
        r
    }

    #[test]
    fn test_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_file_names() {
        let mac = MacId::new("cmu");
        assert_eq!(
            export_file_name(&mac, ExportKind::AsOf(DataType::ModIv), at()),
            "CMU_mod_iv_asof_2025-07-28T132204.csv"
        );
        assert_eq!(
            export_file_name(&mac, ExportKind::Custom(DataType::ModPed), at()),
            "CMU_mod_ped_custom_2025-07-28T132204.csv"
        );
        assert_eq!(
            export_file_name(&mac, ExportKind::ModuleNames, at()),
            "CMU_module_names_2025-07-28T132204.csv"
        );
    }

    #[test]
    fn test_csv_output() {
        let records = vec![
            record("M1", CellValue::Null),
            record("M2", CellValue::Text("dry air, 3h".into())),
        ];
        let mut out = Vec::new();
        write_records_csv(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "module_name,meas_v,comments");
        assert_eq!(lines[1], "M1,\"[0.0, 5.5]\",");
        assert_eq!(lines[2], "M2,\"[0.0, 5.5]\",\"dry air, 3h\"");
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let mut out = Vec::new();
        write_records_csv(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_module_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.csv");
        write_module_names_csv_file(&path, &[ModuleName::new("a"), ModuleName::new("b")]).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "module_name\nA\nB\n");
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_record(&record("M1", CellValue::Null)),
            "{module_name: M1, meas_v: [0.0, 5.5], comments: NULL}"
        );
    }
}
