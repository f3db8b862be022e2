//! Read-only client for a MAC database

use crate::connection::{close_quietly, ConnectionSettings};
use crate::query::{self, ModuleQuery};
use crate::{Record, StorageError, StorageResult};
use common::{DataType, MacId, ModuleName, ModuleSelection};
use config::MacConfig;
use sqlx::Row;
use tracing::{info, instrument};

pub struct MacClient {
    id: MacId,
    settings: ConnectionSettings,
}

impl MacClient {
    pub fn new(id: MacId, settings: ConnectionSettings) -> Self {
        Self { id, settings }
    }

    pub fn from_config(id: MacId, mac: &MacConfig) -> Self {
        Self::new(id, ConnectionSettings::from_mac(mac))
    }

    pub fn id(&self) -> &MacId {
        &self.id
    }

    async fn run(&self, query: &ModuleQuery) -> StorageResult<Vec<Record>> {
        let mut conn = self.settings.connect().await?;

        let mut statement = sqlx::query(&query.sql);
        for name in &query.params {
            statement = statement.bind(name.as_str());
        }
        let result = statement.fetch_all(&mut conn).await;
        close_quietly(conn).await;

        let rows = result.map_err(StorageError::query)?;
        rows.iter().map(Record::from_row).collect()
    }

    /// All rows of one data type for the selected modules
    #[instrument(skip(self), fields(mac = %self.id))]
    pub async fn fetch_testing_data(
        &self,
        data_type: DataType,
        selection: &ModuleSelection,
    ) -> StorageResult<Vec<Record>> {
        let records = self
            .run(&query::testing_data_query(data_type, selection))
            .await?;
        info!(count = records.len(), %data_type, "Fetched test records");
        Ok(records)
    }

    /// IV columns for plotting
    #[instrument(skip(self), fields(mac = %self.id))]
    pub async fn fetch_iv_curves(&self, selection: &ModuleSelection) -> StorageResult<Vec<Record>> {
        let records = self.run(&query::iv_plot_query(selection)).await?;
        info!(count = records.len(), "Fetched IV curves");
        Ok(records)
    }

    #[instrument(skip(self), fields(mac = %self.id))]
    pub async fn fetch_all_module_names(&self) -> StorageResult<Vec<ModuleName>> {
        let mut conn = self.settings.connect().await?;
        let result = sqlx::query(&query::module_names_query())
            .fetch_all(&mut conn)
            .await;
        close_quietly(conn).await;

        let rows = result.map_err(StorageError::query)?;
        let names = rows
            .iter()
            .filter_map(|row| row.try_get::<Option<String>, _>("module_name").transpose())
            .map(|name| {
                name.map(ModuleName::new).map_err(|e| StorageError::Decode {
                    column: "module_name".to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        info!(count = names.len(), "Fetched module names");
        Ok(names)
    }

    /// Rows of the highest-numbered IV test of one module
    #[instrument(skip(self), fields(mac = %self.id))]
    pub async fn fetch_latest_iv(&self, module: &ModuleName) -> StorageResult<Vec<Record>> {
        let records = self.run(&query::latest_iv_query(module)).await?;
        info!(count = records.len(), %module, "Fetched latest IV test");
        Ok(records)
    }
}
