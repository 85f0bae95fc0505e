use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::info;
use std::path::PathBuf;

use super::common::RawEmail;

/// Origine d'un lot d'emails
pub trait EmailSource: Send + Sync {
    /// Récupère au plus `limit` emails récents, du plus récent au plus ancien
    fn fetch_recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RawEmail>>>;

    /// Nom de la source (pour les logs)
    fn source_name(&self) -> &str;
}

/// Rejoue des emails exportés sous forme de tableau JSON de `RawEmail`
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        JsonFileSource { path, name }
    }

    async fn read_emails(&self, limit: usize) -> Result<Vec<RawEmail>> {
        info!("Lecture des emails depuis {}", self.path.display());

        let content = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Impossible de lire {}", self.path.display()))?;

        let emails: Vec<RawEmail> = serde_json::from_slice(&content)
            .with_context(|| format!("Liste d'emails invalide dans {}", self.path.display()))?;

        let emails: Vec<RawEmail> = emails
            .into_iter()
            .map(|e| RawEmail::new(e.id, e.subject, e.from, e.date, e.snippet, &e.body))
            .take(limit)
            .collect();

        info!("{} email(s) chargé(s) depuis {}", emails.len(), self.path.display());
        Ok(emails)
    }
}

impl EmailSource for JsonFileSource {
    fn fetch_recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RawEmail>>> {
        Box::pin(self.read_emails(limit))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
