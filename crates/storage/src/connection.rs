//! Single-connection access to Postgres servers

use crate::{StorageError, StorageResult};
use config::{LocalDatabaseConfig, MacConfig};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::fmt;
use tracing::{debug, warn};

/// Where and as whom to connect
#[derive(Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl ConnectionSettings {
    pub fn from_mac(mac: &MacConfig) -> Self {
        Self {
            host: mac.host.clone(),
            port: mac.port,
            database: mac.dbname.clone(),
            user: mac.user.clone(),
            password: mac.password().map(str::to_string),
        }
    }

    /// Settings for the local mirror database
    pub fn from_local(local: &LocalDatabaseConfig) -> Self {
        Self {
            host: local.host.clone(),
            port: local.port,
            database: local.database.clone(),
            user: local.user.clone(),
            password: local.password().map(str::to_string),
        }
    }

    /// Same server and credentials, different database
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..self.clone()
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);
        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    pub async fn connect(&self) -> StorageResult<PgConnection> {
        debug!(target_db = %self, "Opening database connection");
        PgConnection::connect_with(&self.connect_options())
            .await
            .map_err(|e| StorageError::Connection {
                target: self.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

// Password stays out of logs
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Close a connection, logging instead of failing
pub(crate) async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close database connection cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            host: "cmsmac04.phys.cmu.edu".to_string(),
            port: 5432,
            database: "hgcdb".to_string(),
            user: "viewer".to_string(),
            password: Some("secret".to_string()),
        }
    }

    #[test]
    fn test_display_hides_password() {
        let s = settings();
        assert_eq!(s.to_string(), "viewer@cmsmac04.phys.cmu.edu:5432/hgcdb");
        assert!(!format!("{:?}", s).contains("secret"));
    }

    #[test]
    fn test_with_database() {
        let admin = settings().with_database("postgres");
        assert_eq!(admin.database, "postgres");
        assert_eq!(admin.host, "cmsmac04.phys.cmu.edu");
        assert_eq!(admin.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_from_mac_without_password() {
        let mac = MacConfig {
            host: "gut.physics.ucsb.edu".to_string(),
            port: 5432,
            dbname: "hgcdb".to_string(),
            user: "viewer".to_string(),
            password: None,
            allow_module_listing: false,
        };
        let s = ConnectionSettings::from_mac(&mac);
        assert_eq!(s.database, "hgcdb");
        assert!(s.password.is_none());
    }
}
