//! Dashboard analytics fetchers.
//!
//! One [`Resource`] per analytics endpoint. Each `fetch_*` method scopes the
//! call to the resource's token, so a dashboard that re-fetches (filter
//! change, refresh button) never sees an older response land last.

use std::sync::Arc;

use siad_core::analytics::{
    ArchivadorStats, DocumentAnalytics, ExpedienteStats, SignatureStats, TypologyGrouping,
    TypologyStat, UserStats, VitalSummary,
};

use crate::error::ClientError;
use crate::http::ApiClient;
use crate::notify::Notifier;
use crate::resource::Resource;

/// Display name of a period row.
pub fn period_label(year: i32) -> String {
    format!("Periodo {}", year)
}

/// Give period rows a display name. Rows that already carry a name keep it.
pub fn label_periods(rows: Vec<TypologyStat>) -> Vec<TypologyStat> {
    rows.into_iter()
        .map(|mut row| {
            if row.name.is_none() {
                row.name = row.year.map(period_label);
            }
            row
        })
        .collect()
}

pub struct AnalyticsFetchers {
    client: ApiClient,
    pub documents: Resource<DocumentAnalytics>,
    pub archivadores: Resource<ArchivadorStats>,
    pub expedientes: Resource<ExpedienteStats>,
    pub typologies: Resource<Vec<TypologyStat>>,
    pub users: Resource<UserStats>,
    pub signatures: Resource<SignatureStats>,
    pub web_vitals: Resource<Vec<VitalSummary>>,
}

impl AnalyticsFetchers {
    pub fn new(client: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            documents: Resource::new(
                notifier.clone(),
                "Error al cargar estadísticas de documentos",
            ),
            archivadores: Resource::new(
                notifier.clone(),
                "Error al cargar estadísticas de archivadores",
            ),
            expedientes: Resource::new(
                notifier.clone(),
                "Error al cargar estadísticas de expedientes",
            ),
            typologies: Resource::new(
                notifier.clone(),
                "Error al cargar estadísticas de tipologías",
            ),
            users: Resource::new(notifier.clone(), "Error al cargar estadísticas de usuarios"),
            signatures: Resource::new(notifier.clone(), "Error al cargar estadísticas de firmas"),
            web_vitals: Resource::new(notifier, "Error al cargar métricas de rendimiento"),
        }
    }

    pub async fn fetch_documents(&self) -> Result<DocumentAnalytics, ClientError> {
        let client = self.client.clone();
        self.documents
            .fetch(|token| async move { client.scoped(token).document_analytics().await })
            .await
    }

    pub async fn fetch_archivadores(&self) -> Result<ArchivadorStats, ClientError> {
        let client = self.client.clone();
        self.archivadores
            .fetch(|token| async move { client.scoped(token).archivador_stats().await })
            .await
    }

    pub async fn fetch_expedientes(&self) -> Result<ExpedienteStats, ClientError> {
        let client = self.client.clone();
        self.expedientes
            .fetch(|token| async move { client.scoped(token).expediente_stats().await })
            .await
    }

    /// Typology distribution. With [`TypologyGrouping::Period`] every row is
    /// named `Periodo {year}` unless the backend named it.
    pub async fn fetch_typologies(
        &self,
        group_by: TypologyGrouping,
    ) -> Result<Vec<TypologyStat>, ClientError> {
        let client = self.client.clone();
        self.typologies
            .fetch(|token| async move {
                let rows = client.scoped(token).typology_stats(group_by).await?;
                Ok(match group_by {
                    TypologyGrouping::Period => label_periods(rows),
                    TypologyGrouping::Typology => rows,
                })
            })
            .await
    }

    pub async fn fetch_users(&self) -> Result<UserStats, ClientError> {
        let client = self.client.clone();
        self.users
            .fetch(|token| async move { client.scoped(token).user_stats().await })
            .await
    }

    pub async fn fetch_signatures(&self) -> Result<SignatureStats, ClientError> {
        let client = self.client.clone();
        self.signatures
            .fetch(|token| async move { client.scoped(token).signature_stats().await })
            .await
    }

    pub async fn fetch_web_vitals(&self) -> Result<Vec<VitalSummary>, ClientError> {
        let client = self.client.clone();
        self.web_vitals
            .fetch(|token| async move { client.scoped(token).web_vitals_summary().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: Option<&str>, year: Option<i32>) -> TypologyStat {
        TypologyStat {
            id: None,
            name: name.map(str::to_string),
            year,
            count: 3,
            percentage: 50.0,
        }
    }

    #[test]
    fn period_rows_get_display_names() {
        let rows = label_periods(vec![
            row(None, Some(2024)),
            row(Some("Resoluciones"), Some(2025)),
        ]);
        assert_eq!(rows[0].name.as_deref(), Some("Periodo 2024"));
        assert_eq!(rows[1].name.as_deref(), Some("Resoluciones"));
    }

    #[test]
    fn rows_without_year_stay_unnamed() {
        let rows = label_periods(vec![row(None, None)]);
        assert_eq!(rows[0].name, None);
    }
}
