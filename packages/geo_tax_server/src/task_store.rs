//! The [`geo_tax_orders::ImportTaskStore`] implementation binding the
//! Import Executor to Postgres (`geo_tax_database`) and the object
//! store (`geo_tax_storage`).

use std::sync::Arc;

use geo_tax_database::queries;
use geo_tax_models::error::OrderError;
use geo_tax_models::order::OrderComputedPayload;
use geo_tax_models::task::TaskStatus;
use geo_tax_orders::{ImportTaskStore, TaskCounters};
use geo_tax_storage::ObjectStore;
use switchy_database::Database;

/// Durable collaborator for [`geo_tax_orders::process_import_task`],
/// backed by a live database connection and object store client.
pub struct DatabaseTaskStore {
    db: Arc<dyn Database>,
    storage: Arc<ObjectStore>,
}

impl DatabaseTaskStore {
    /// Builds a store over an existing database connection and object
    /// store client.
    #[must_use]
    pub const fn new(db: Arc<dyn Database>, storage: Arc<ObjectStore>) -> Self {
        Self { db, storage }
    }
}

#[async_trait::async_trait]
impl ImportTaskStore for DatabaseTaskStore {
    async fn load_task_counters(&self, task_id: i64) -> Result<Option<TaskCounters>, OrderError> {
        Ok(queries::load_task_counters(self.db.as_ref(), task_id).await?)
    }

    async fn load_csv_bytes(&self, task_id: i64) -> Result<Vec<u8>, OrderError> {
        let file_path = queries::load_task_file_path(self.db.as_ref(), task_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("file task {task_id}")))?;

        let object_name = geo_tax_storage::extract_object_name(&file_path, self.storage.bucket());
        Ok(self.storage.get_object_bytes(&object_name).await?)
    }

    async fn insert_orders(
        &self,
        task_id: i64,
        orders: &[OrderComputedPayload],
    ) -> Result<usize, OrderError> {
        let author_user_id = queries::load_task_user_id(self.db.as_ref(), task_id).await?;
        Ok(queries::insert_orders(self.db.as_ref(), author_user_id, orders).await?)
    }

    async fn update_progress(
        &self,
        task_id: i64,
        successful_rows: i64,
        failed_rows: i64,
        status: TaskStatus,
    ) -> Result<(), OrderError> {
        Ok(
            queries::update_file_task_progress(self.db.as_ref(), task_id, successful_rows, failed_rows, status)
                .await?,
        )
    }
}
