//! Restore orchestration for the backups screen.

use std::sync::Arc;

use siad_core::envelope::PageQuery;
use siad_core::model::RestoreLog;

use crate::error::ClientError;
use crate::http::ApiClient;
use crate::notify::Notifier;
use crate::resource::Resource;

/// Starts restores and keeps the restore history loaded.
///
/// Errors are reported through the notifier and also returned, so callers
/// can keep a dialog open or roll back optimistic UI.
pub struct RestoreTracker {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    pub restores: Resource<Vec<RestoreLog>>,
}

impl RestoreTracker {
    pub fn new(client: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            restores: Resource::new(notifier.clone(), "Error al cargar restauraciones"),
            notifier,
        }
    }

    /// Reload the restore history.
    pub async fn load(&self) -> Result<Vec<RestoreLog>, ClientError> {
        let client = self.client.clone();
        self.restores
            .fetch(|token| async move {
                let page = client
                    .scoped(token)
                    .restores(PageQuery::new(1, siad_core::envelope::MAX_PAGE_SIZE))
                    .await?;
                Ok(page.items)
            })
            .await
    }

    /// Ask the backend to restore `backup_id`, then reload the history.
    pub async fn create_restore(&self, backup_id: &str) -> Result<RestoreLog, ClientError> {
        match self.client.create_restore(backup_id).await {
            Ok(log) => {
                self.notifier.success("Restauración iniciada");
                // A failed reload has already been reported by the resource.
                let _ = self.load().await;
                Ok(log)
            }
            Err(e) => {
                self.notifier
                    .error(&e.user_message("Error al iniciar la restauración"));
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<RestoreLog, ClientError> {
        self.client.restore(id).await.inspect_err(|e| {
            self.notifier
                .error(&e.user_message("Error al obtener la restauración"));
        })
    }
}
