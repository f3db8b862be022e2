//! Schema evolution for the local `module_tests` table
//!
//! The expected column list is compared against `information_schema`. New
//! tables are created whole; existing ones get missing columns added and
//! mismatched types altered. Columns that are not expected are left alone.

use crate::{StorageError, StorageResult};
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::{debug, info, instrument};

pub const MODULE_TESTS_TABLE: &str = "module_tests";

/// Column types used by the local mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing primary key
    Serial,
    Integer,
    Real,
    RealArray,
    Text,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Type clause for `CREATE TABLE` and `ADD COLUMN`
    pub fn ddl(&self) -> &'static str {
        match self {
            ColumnType::Serial => "SERIAL PRIMARY KEY",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::RealArray => "REAL[]",
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    /// Type name for `ALTER COLUMN ... TYPE`
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Serial => "INTEGER",
            other => other.ddl(),
        }
    }

    /// Whether an `information_schema.columns` entry already has this type
    pub fn matches(&self, data_type: &str, udt_name: &str) -> bool {
        match self {
            ColumnType::Serial | ColumnType::Integer => data_type == "integer",
            ColumnType::Real => data_type == "real",
            ColumnType::RealArray => data_type == "ARRAY" && udt_name == "_float4",
            ColumnType::Text => data_type == "text",
            ColumnType::Date => data_type == "date",
            ColumnType::Timestamp => data_type == "timestamp without time zone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec { name, column_type }
}

/// Every column the local mirror has ever carried
pub const MODULE_TESTS_COLUMNS: &[ColumnSpec] = &[
    col("id", ColumnType::Serial),
    col("module_name", ColumnType::Text),
    col("test_type", ColumnType::Text),
    col("source", ColumnType::Text),
    col("status", ColumnType::Integer),
    col("status_desc", ColumnType::Text),
    col("ratio_i_at_vs", ColumnType::Real),
    col("ratio_at_vs", ColumnType::RealArray),
    col("rel_hum", ColumnType::Text),
    col("temp_c", ColumnType::Text),
    col("date_test", ColumnType::Date),
    col("test_timestamp", ColumnType::Timestamp),
    col("meas_v", ColumnType::RealArray),
    col("meas_i", ColumnType::RealArray),
    col("imported_at", ColumnType::Timestamp),
    col("comments", ColumnType::Text),
];

/// One row of `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExistingColumn {
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    AddColumn(ColumnSpec),
    AlterType { column: ColumnSpec, found: String },
}

impl SchemaChange {
    pub fn to_sql(&self, table: &str) -> String {
        match self {
            SchemaChange::AddColumn(spec) => format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table,
                spec.name,
                spec.column_type.ddl()
            ),
            SchemaChange::AlterType { column, .. } => format!(
                "ALTER TABLE {table} ALTER COLUMN {name} TYPE {ty} USING {name}::{ty}",
                table = table,
                name = column.name,
                ty = column.column_type.sql_type()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaPlan {
    CreateTable,
    /// Changes to an existing table, empty when it is up to date
    Alter(Vec<SchemaChange>),
}

impl SchemaPlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, SchemaPlan::Alter(changes) if changes.is_empty())
    }

    /// Statements that carry out the plan
    pub fn statements(&self, table: &str, expected: &[ColumnSpec]) -> Vec<String> {
        match self {
            SchemaPlan::CreateTable => vec![create_table_sql(table, expected)],
            SchemaPlan::Alter(changes) => changes.iter().map(|c| c.to_sql(table)).collect(),
        }
    }
}

pub fn create_table_sql(table: &str, columns: &[ColumnSpec]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.column_type.ddl()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, body)
}

/// Diff the expected columns against what the table has
pub fn plan_schema_changes(expected: &[ColumnSpec], existing: &[ExistingColumn]) -> SchemaPlan {
    if existing.is_empty() {
        return SchemaPlan::CreateTable;
    }

    let mut changes = Vec::new();
    for spec in expected {
        match existing.iter().find(|c| c.column_name == spec.name) {
            None => changes.push(SchemaChange::AddColumn(*spec)),
            // The key column is never retyped
            Some(_) if spec.column_type == ColumnType::Serial => {}
            Some(found) if !spec.column_type.matches(&found.data_type, &found.udt_name) => {
                changes.push(SchemaChange::AlterType {
                    column: *spec,
                    found: found.data_type.clone(),
                })
            }
            Some(_) => {}
        }
    }
    SchemaPlan::Alter(changes)
}

pub async fn existing_columns(
    conn: &mut PgConnection,
    table: &str,
) -> StorageResult<Vec<ExistingColumn>> {
    sqlx::query_as::<_, ExistingColumn>(
        "SELECT column_name::text AS column_name, data_type::text AS data_type, \
         udt_name::text AS udt_name \
         FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| StorageError::Schema(e.to_string()))
}

/// Bring `table` in line with `expected` inside one transaction
#[instrument(skip(conn, expected))]
pub async fn ensure_schema(
    conn: &mut PgConnection,
    table: &str,
    expected: &[ColumnSpec],
) -> StorageResult<SchemaPlan> {
    let existing = existing_columns(conn, table).await?;
    let plan = plan_schema_changes(expected, &existing);

    if plan.is_noop() {
        debug!(table, "Schema is up to date");
        return Ok(plan);
    }

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;
    for statement in plan.statements(table, expected) {
        debug!(%statement, "Applying schema change");
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Schema(format!("{}: {}", statement, e)))?;
    }
    tx.commit()
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

    match &plan {
        SchemaPlan::CreateTable => info!(table, "Created table"),
        SchemaPlan::Alter(changes) => info!(table, changes = changes.len(), "Updated table schema"),
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn existing(name: &str, data_type: &str, udt_name: &str) -> ExistingColumn {
        ExistingColumn {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            udt_name: udt_name.to_string(),
        }
    }

    fn current_table() -> Vec<ExistingColumn> {
        MODULE_TESTS_COLUMNS
            .iter()
            .map(|c| match c.column_type {
                ColumnType::Serial | ColumnType::Integer => existing(c.name, "integer", "int4"),
                ColumnType::Real => existing(c.name, "real", "float4"),
                ColumnType::RealArray => existing(c.name, "ARRAY", "_float4"),
                ColumnType::Text => existing(c.name, "text", "text"),
                ColumnType::Date => existing(c.name, "date", "date"),
                ColumnType::Timestamp => {
                    existing(c.name, "timestamp without time zone", "timestamp")
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_table_is_created() {
        let plan = plan_schema_changes(MODULE_TESTS_COLUMNS, &[]);
        assert_eq!(plan, SchemaPlan::CreateTable);

        let statements = plan.statements(MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with(
            "CREATE TABLE IF NOT EXISTS module_tests (id SERIAL PRIMARY KEY, module_name TEXT"
        ));
        assert!(statements[0].contains("meas_v REAL[]"));
        assert!(statements[0].ends_with("comments TEXT)"));
    }

    #[test]
    fn test_up_to_date_table_is_noop() {
        let plan = plan_schema_changes(MODULE_TESTS_COLUMNS, &current_table());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_missing_columns_added() {
        let mut table = current_table();
        table.retain(|c| c.column_name != "comments" && c.column_name != "source");

        let plan = plan_schema_changes(MODULE_TESTS_COLUMNS, &table);
        assert_matches!(&plan, SchemaPlan::Alter(changes) if changes.len() == 2);
        assert_eq!(
            plan.statements(MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS),
            vec![
                "ALTER TABLE module_tests ADD COLUMN source TEXT".to_string(),
                "ALTER TABLE module_tests ADD COLUMN comments TEXT".to_string(),
            ]
        );
    }

    #[test]
    fn test_mismatched_type_altered() {
        let mut table = current_table();
        for c in table.iter_mut() {
            if c.column_name == "rel_hum" {
                *c = existing("rel_hum", "real", "float4");
            }
        }

        let plan = plan_schema_changes(MODULE_TESTS_COLUMNS, &table);
        assert_matches!(
            &plan,
            SchemaPlan::Alter(changes) if matches!(
                changes.as_slice(),
                [SchemaChange::AlterType { column, found }]
                    if column.name == "rel_hum" && found == "real"
            )
        );
        assert_eq!(
            plan.statements(MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS),
            vec!["ALTER TABLE module_tests ALTER COLUMN rel_hum TYPE TEXT USING rel_hum::TEXT"
                .to_string()]
        );
    }

    #[test]
    fn test_array_matched_by_udt_name() {
        let mut table = current_table();
        for c in table.iter_mut() {
            if c.column_name == "meas_i" {
                *c = existing("meas_i", "ARRAY", "_float8");
            }
        }

        let plan = plan_schema_changes(MODULE_TESTS_COLUMNS, &table);
        assert_eq!(
            plan.statements(MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS),
            vec!["ALTER TABLE module_tests ALTER COLUMN meas_i TYPE REAL[] USING meas_i::REAL[]"
                .to_string()]
        );
    }

    #[test]
    fn test_extra_columns_untouched() {
        let mut table = current_table();
        table.push(existing("legacy_notes", "character varying", "varchar"));
        assert!(plan_schema_changes(MODULE_TESTS_COLUMNS, &table).is_noop());
    }

    #[test]
    fn test_primary_key_never_retyped() {
        let mut table = current_table();
        table[0] = existing("id", "bigint", "int8");
        assert!(plan_schema_changes(MODULE_TESTS_COLUMNS, &table).is_noop());
    }
}
