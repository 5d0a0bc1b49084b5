use crate::{config::AppConfig, errors::ServiceError};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Connection-pool settings applied when establishing the pool.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            ..Default::default()
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let conn = Database::connect(opts).await?;
    info!("Database connection established");
    Ok(conn)
}

/// Connects using the application configuration, running migrations when
/// `auto_migrate` is set.
pub async fn connect(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let conn = establish_connection(&DbConfig::from(cfg)).await?;
    if cfg.auto_migrate {
        crate::migrator::Migrator::up(&conn, None).await?;
        info!("Database migrations applied");
    }
    Ok(conn)
}
