use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::classifier::{
    BatchClassifier, ChatCompletionsClient, Clock, CompletionClient, Credential, EmailClassifier,
    Pacer, TokioClock,
};
use crate::config::Config;
use crate::email::{EmailSource, JsonFileSource};
use crate::gmail_client::GmailClient;
use crate::slack_notifier::SlackNotifier;
use crate::store::{ResultStore, StoredRun};

/// Récupération → classification → sauvegarde → notification
pub struct EmailProcessor<C = ChatCompletionsClient, K = TokioClock> {
    source: Box<dyn EmailSource>,
    batch: BatchClassifier<C, K>,
    credential: Credential,
    store: Option<ResultStore>,
    slack: Option<SlackNotifier>,
}

impl EmailProcessor {
    pub async fn new(config: &Config, input: Option<PathBuf>) -> Result<Self> {
        info!("Initialisation du processeur d'emails");

        let mut processor = Self::from_config(config, input).await?;
        processor.store = Some(ResultStore::new(&config.data_dir));

        // Initialiser le notifieur Slack si configuré
        processor.slack = match &config.slack {
            Some(slack_config) => match SlackNotifier::new(slack_config) {
                Ok(notifier) => {
                    info!("✅ Notifications Slack activées");
                    Some(notifier)
                }
                Err(e) => {
                    warn!("⚠️  Impossible d'initialiser le notifieur Slack : {} - notifications désactivées", e);
                    None
                }
            },
            None => {
                info!("ℹ️  Notifications Slack non configurées");
                None
            }
        };

        Ok(processor)
    }

    pub async fn new_dry_run(config: &Config, input: Option<PathBuf>) -> Result<Self> {
        info!("🧪 Initialisation du processeur en mode dry-run (pas de sauvegarde, pas de notification)");
        Self::from_config(config, input).await
    }

    async fn from_config(config: &Config, input: Option<PathBuf>) -> Result<Self> {
        let credential = config.classifier.credential()?;

        let source: Box<dyn EmailSource> = match input {
            Some(path) => Box::new(JsonFileSource::new(path)),
            None => Box::new(
                GmailClient::new(&config.gmail)
                    .await
                    .context("Impossible de se connecter à l'API Gmail")?,
            ),
        };

        let client = ChatCompletionsClient::new(&config.classifier.base_url, config.classifier.timeout())?;
        let classifier = EmailClassifier::new(client, &config.classifier);
        let batch = BatchClassifier::new(classifier, Pacer::fixed(config.classifier.pacing()));

        Ok(EmailProcessor::from_parts(source, batch, credential))
    }
}

impl<C: CompletionClient, K: Clock> EmailProcessor<C, K> {
    /// Processeur sans sauvegarde ni notification
    pub fn from_parts(
        source: Box<dyn EmailSource>,
        batch: BatchClassifier<C, K>,
        credential: Credential,
    ) -> Self {
        EmailProcessor {
            source,
            batch,
            credential,
            store: None,
            slack: None,
        }
    }

    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Classe au plus `limit` emails récents.
    ///
    /// Seul l'échec de la récupération des emails (ou de la sauvegarde des
    /// résultats) est une erreur ; les échecs de classification sont absorbés.
    pub async fn process_emails(&self, limit: usize, cancel: &CancellationToken) -> Result<StoredRun> {
        info!("Début de la classification depuis {}", self.source.source_name());

        let emails = self
            .source
            .fetch_recent(limit)
            .await
            .with_context(|| format!("Impossible de récupérer les emails depuis {}", self.source.source_name()))?;

        if emails.is_empty() {
            info!("Aucun email à classer");
        }

        let outcome = self.batch.classify_all(emails, &self.credential, cancel).await;
        let run = StoredRun::from_outcome(self.source.source_name(), outcome);

        if let Some(store) = &self.store {
            store.save(&run).context("Impossible de sauvegarder les emails classés")?;
        }

        if let Some(slack) = &self.slack {
            if let Err(e) = slack.notify_run_completed(&run).await {
                error!("Échec de la notification Slack pour l'exécution {} : {:#}", run.run_id, e);
            }
        }

        info!(
            "Classification terminée : {} email(s), {} échec(s){}",
            run.emails.len(),
            run.failures,
            if run.cancelled { " (annulée)" } else { "" }
        );

        Ok(run)
    }
}
