//! Postgres adapters for the content store, link service and type registry.
//!
//! Every query is composed at runtime: extension tables and their columns are
//! only known once the type registry has been read.

mod content;
mod links;
mod registry;
mod util;

pub use util::map_sqlx_error;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::info;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handle implementing every repository trait over one pool.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: PgPool,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        info!(
            target = "folio::infra::db",
            max_connections, "Connected to Postgres"
        );
        Ok(pool)
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}
