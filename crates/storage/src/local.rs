//! Local mirror database (`hgcdb_fnal` by default)

use crate::connection::{close_quietly, ConnectionSettings};
use crate::schema::{self, SchemaPlan, MODULE_TESTS_COLUMNS, MODULE_TESTS_TABLE};
use crate::{CellValue, Record, StorageError, StorageResult};
use chrono::{NaiveDate, NaiveDateTime};
use common::{is_sql_identifier, MacId, ModuleName};
use config::LocalDatabaseConfig;
use tracing::{info, instrument};

const DUPLICATE_DATABASE: &str = "42P04";

/// Outcome of `CREATE DATABASE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseCreation {
    Created,
    AlreadyExists,
}

/// A row to insert into `module_tests`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewModuleTest {
    pub module_name: Option<String>,
    pub test_type: Option<String>,
    pub source: Option<String>,
    pub status: Option<i32>,
    pub status_desc: Option<String>,
    pub ratio_i_at_vs: Option<f32>,
    pub ratio_at_vs: Option<Vec<f32>>,
    pub rel_hum: Option<String>,
    pub temp_c: Option<String>,
    pub date_test: Option<NaiveDate>,
    pub test_timestamp: Option<NaiveDateTime>,
    pub meas_v: Option<Vec<f32>>,
    pub meas_i: Option<Vec<f32>>,
    pub imported_at: NaiveDateTime,
    pub comments: Option<String>,
}

fn to_f32_vec(values: Vec<f64>) -> Vec<f32> {
    values.into_iter().map(|v| v as f32).collect()
}

impl NewModuleTest {
    /// Map an IV row fetched from a MAC onto the local columns
    pub fn from_mac_iv(record: &Record, source: &MacId, imported_at: NaiveDateTime) -> Self {
        let date_test = record.date("date_test");
        let test_timestamp =
            date_test.map(|d| d.and_time(record.time("time_test").unwrap_or_default()));

        Self {
            module_name: record.text("module_name"),
            test_type: Some("iv".to_string()),
            source: Some(source.to_string()),
            status: record.i64("status").and_then(|v| i32::try_from(v).ok()),
            status_desc: record.text("status_desc"),
            ratio_i_at_vs: record.f64("ratio_i_at_vs").map(|v| v as f32),
            ratio_at_vs: record.f64_vec("ratio_at_vs").map(to_f32_vec),
            rel_hum: record.text("rel_hum"),
            temp_c: record.text("temp_c"),
            date_test,
            test_timestamp,
            meas_v: record.f64_vec("meas_v").map(to_f32_vec),
            meas_i: record.f64_vec("meas_i").map(to_f32_vec),
            imported_at,
            comments: None,
        }
    }
}

/// A stored row of `module_tests`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ModuleTestRecord {
    pub id: i32,
    pub module_name: Option<String>,
    pub test_type: Option<String>,
    pub source: Option<String>,
    pub status: Option<i32>,
    pub status_desc: Option<String>,
    pub ratio_i_at_vs: Option<f32>,
    pub ratio_at_vs: Option<Vec<f32>>,
    pub rel_hum: Option<String>,
    pub temp_c: Option<String>,
    pub date_test: Option<NaiveDate>,
    pub test_timestamp: Option<NaiveDateTime>,
    pub meas_v: Option<Vec<f32>>,
    pub meas_i: Option<Vec<f32>>,
    pub imported_at: Option<NaiveDateTime>,
    pub comments: Option<String>,
}

fn cell<T>(value: &Option<T>, wrap: impl Fn(T) -> CellValue) -> CellValue
where
    T: Clone,
{
    value.clone().map(wrap).unwrap_or(CellValue::Null)
}

impl ModuleTestRecord {
    /// Generic view used for console output
    pub fn to_record(&self) -> Record {
        let mut r = Record::new();
        r.push("id", CellValue::Int(i64::from(self.id)));
        r.push("module_name", cell(&self.module_name, CellValue::Text));
        r.push("test_type", cell(&self.test_type, CellValue::Text));
        r.push("source", cell(&self.source, CellValue::Text));
        r.push("status", cell(&self.status, |v| CellValue::Int(i64::from(v))));
        r.push("status_desc", cell(&self.status_desc, CellValue::Text));
        r.push("ratio_i_at_vs", cell(&self.ratio_i_at_vs, CellValue::Real));
        r.push("ratio_at_vs", cell(&self.ratio_at_vs, CellValue::RealArray));
        r.push("rel_hum", cell(&self.rel_hum, CellValue::Text));
        r.push("temp_c", cell(&self.temp_c, CellValue::Text));
        r.push("date_test", cell(&self.date_test, CellValue::Date));
        r.push("test_timestamp", cell(&self.test_timestamp, CellValue::Timestamp));
        r.push("meas_v", cell(&self.meas_v, CellValue::RealArray));
        r.push("meas_i", cell(&self.meas_i, CellValue::RealArray));
        r.push("imported_at", cell(&self.imported_at, CellValue::Timestamp));
        r.push("comments", cell(&self.comments, CellValue::Text));
        r
    }
}

pub struct LocalDatabase {
    settings: ConnectionSettings,
    admin_database: String,
}

impl LocalDatabase {
    pub fn new(settings: ConnectionSettings, admin_database: impl Into<String>) -> Self {
        Self {
            settings,
            admin_database: admin_database.into(),
        }
    }

    pub fn from_config(local: &LocalDatabaseConfig) -> Self {
        Self::new(
            ConnectionSettings::from_local(local),
            local.admin_database.clone(),
        )
    }

    /// Same server, another database name
    pub fn with_database(&self, database: &str) -> Self {
        Self::new(
            self.settings.with_database(database),
            self.admin_database.clone(),
        )
    }

    pub fn database_name(&self) -> &str {
        &self.settings.database
    }

    /// `CREATE DATABASE` through the administrative database
    #[instrument(skip(self), fields(database = %self.settings.database))]
    pub async fn create_database(&self) -> StorageResult<DatabaseCreation> {
        let name = &self.settings.database;
        if !is_sql_identifier(name) {
            return Err(StorageError::InvalidIdentifier(name.clone()));
        }

        let mut conn = self
            .settings
            .with_database(&self.admin_database)
            .connect()
            .await?;
        let sql = format!("CREATE DATABASE {}", name);
        // CREATE DATABASE refuses to run inside a transaction block
        let result = sqlx::raw_sql(&sql).execute(&mut conn).await;
        close_quietly(conn).await;

        match result {
            Ok(_) => {
                info!("Database created");
                Ok(DatabaseCreation::Created)
            }
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(DUPLICATE_DATABASE) =>
            {
                info!("Database already exists");
                Ok(DatabaseCreation::AlreadyExists)
            }
            Err(e) => Err(StorageError::query(e)),
        }
    }

    /// Create or migrate `module_tests`
    pub async fn ensure_schema(&self) -> StorageResult<SchemaPlan> {
        let mut conn = self.settings.connect().await?;
        let result =
            schema::ensure_schema(&mut conn, MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS).await;
        close_quietly(conn).await;
        result
    }

    /// Insert rows one by one; the first failure aborts the rest
    #[instrument(skip(self, tests), fields(count = tests.len()))]
    pub async fn insert_module_tests(&self, tests: &[NewModuleTest]) -> StorageResult<usize> {
        let mut conn = self.settings.connect().await?;
        let result = insert_all(&mut conn, tests).await;
        close_quietly(conn).await;

        let inserted = result?;
        info!(inserted, "Inserted module tests");
        Ok(inserted)
    }

    /// Rows of `module_tests`, newest import first
    pub async fn read_module_tests(
        &self,
        module: Option<&ModuleName>,
    ) -> StorageResult<Vec<ModuleTestRecord>> {
        let columns = MODULE_TESTS_COLUMNS
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = self.settings.connect().await?;
        let result = match module {
            Some(name) => {
                sqlx::query_as::<_, ModuleTestRecord>(&format!(
                    "SELECT {} FROM {} WHERE UPPER(module_name) = $1 ORDER BY imported_at DESC",
                    columns, MODULE_TESTS_TABLE
                ))
                .bind(name.as_str())
                .fetch_all(&mut conn)
                .await
            }
            None => {
                sqlx::query_as::<_, ModuleTestRecord>(&format!(
                    "SELECT {} FROM {} ORDER BY imported_at DESC",
                    columns, MODULE_TESTS_TABLE
                ))
                .fetch_all(&mut conn)
                .await
            }
        };
        close_quietly(conn).await;

        result.map_err(StorageError::query)
    }
}

async fn insert_all(
    conn: &mut sqlx::PgConnection,
    tests: &[NewModuleTest],
) -> StorageResult<usize> {
    schema::ensure_schema(conn, MODULE_TESTS_TABLE, MODULE_TESTS_COLUMNS).await?;

    let sql = insert_sql();
    for test in tests {
        sqlx::query(&sql)
            .bind(&test.module_name)
            .bind(&test.test_type)
            .bind(&test.source)
            .bind(test.status)
            .bind(&test.status_desc)
            .bind(test.ratio_i_at_vs)
            .bind(&test.ratio_at_vs)
            .bind(&test.rel_hum)
            .bind(&test.temp_c)
            .bind(test.date_test)
            .bind(test.test_timestamp)
            .bind(&test.meas_v)
            .bind(&test.meas_i)
            .bind(test.imported_at)
            .bind(&test.comments)
            .execute(&mut *conn)
            .await
            .map_err(StorageError::query)?;
    }
    Ok(tests.len())
}

/// `INSERT` over every column except the key
fn insert_sql() -> String {
    let columns: Vec<&str> = MODULE_TESTS_COLUMNS
        .iter()
        .filter(|c| c.column_type != schema::ColumnType::Serial)
        .map(|c| c.name)
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        MODULE_TESTS_TABLE,
        columns.join(", "),
        crate::query::placeholders(columns.len())
    )
}
