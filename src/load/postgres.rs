//! PostgreSQL bulk loader
//!
//! Streams each file through `COPY ... FROM STDIN` inside its own transaction.

use std::fs::File;
use std::io::Read;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::SinkExt;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use super::copy::CopyPlan;
use super::error::{LoadError, LoadResult};
use super::loader::BulkLoader;

/// Bytes sent per COPY message
const CHUNK_SIZE: usize = 64 * 1024;

/// Bulk loader backed by a single PostgreSQL connection
pub struct PostgresLoader {
    client: Client,
}

impl PostgresLoader {
    /// Connect to a PostgreSQL database
    ///
    /// Must be called from within a tokio runtime; the connection task is spawned on it.
    pub async fn connect(connection_string: &str) -> LoadResult<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| LoadError::Connect(e.to_string()))?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client })
    }

    async fn copy_file(&mut self, plan: &CopyPlan) -> Result<u64, String> {
        let mut file = File::open(&plan.path).map_err(|e| e.to_string())?;

        let statement = plan.statement();
        let tx = self.client.transaction().await.map_err(|e| e.to_string())?;
        let sink = tx
            .copy_in::<_, Bytes>(statement.as_str())
            .await
            .map_err(|e| e.to_string())?;
        let mut sink = std::pin::pin!(sink);

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|e| e.to_string())?;
            if n == 0 {
                break;
            }
            sink.send(Bytes::copy_from_slice(&buf[..n]))
                .await
                .map_err(|e| e.to_string())?;
        }

        let rows = sink.as_mut().finish().await.map_err(|e| e.to_string())?;
        // An uncommitted transaction rolls back on drop.
        tx.commit().await.map_err(|e| e.to_string())?;
        Ok(rows)
    }
}

#[async_trait]
impl BulkLoader for PostgresLoader {
    async fn execute_ddl(&mut self, sql: &str) -> LoadResult<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| LoadError::Schema(e.to_string()))
    }

    async fn load(&mut self, plan: &CopyPlan) -> LoadResult<u64> {
        debug!("{}", plan.statement());
        self.copy_file(plan).await.map_err(|cause| LoadError::Copy {
            table: plan.table.name().to_string(),
            cause,
        })
    }
}
