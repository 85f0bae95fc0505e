use futures::FutureExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;

use super::category::Category;
use super::completion::{CompletionClient, Credential};
use super::error::ClassificationError;
use super::pacing::{Clock, Pacer, TokioClock};
use super::single::EmailClassifier;
use crate::email::{truncate_chars, ClassifiedEmail, RawEmail};

/// Nombre d'emails par catégorie dans un lot. Les catégories vides sont absentes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchSummary(BTreeMap<Category, usize>);

impl BatchSummary {
    pub fn from_emails(emails: &[ClassifiedEmail]) -> Self {
        let mut counts = BTreeMap::new();
        for email in emails {
            *counts.entry(email.category).or_insert(0) += 1;
        }
        BatchSummary(counts)
    }

    pub fn count(&self, category: Category) -> usize {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.0.iter().map(|(category, count)| (*category, *count))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(category, count)| format!("{}: {}", category, count))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Résultat d'un lot
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Une entrée par email traité, dans l'ordre d'entrée
    pub emails: Vec<ClassifiedEmail>,
    pub summary: BatchSummary,
    /// Emails rangés en `General` après un échec de classification
    pub failures: usize,
    /// Vrai si le token a arrêté le lot avant la fin
    pub cancelled: bool,
}

/// Applique le classifieur à un lot, un appel à la fois
pub struct BatchClassifier<C, K = TokioClock> {
    classifier: EmailClassifier<C>,
    pacer: Pacer<K>,
}

impl<C: CompletionClient, K: Clock> BatchClassifier<C, K> {
    pub fn new(classifier: EmailClassifier<C>, pacer: Pacer<K>) -> Self {
        BatchClassifier { classifier, pacer }
    }

    /// Classe `emails` strictement dans l'ordre.
    ///
    /// Un email en échec (ou qui panique) devient `General` et le lot continue.
    /// Quand `cancel` est déclenché, aucun nouvel appel n'est lancé et les
    /// emails déjà classés sont renvoyés avec `cancelled` positionné.
    pub async fn classify_all(
        &self,
        emails: Vec<RawEmail>,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let total = emails.len();
        let mut classified = Vec::with_capacity(total);
        let mut failures = 0;
        let mut cancelled = false;

        if total > 0 {
            info!("Classification de {} email(s)", total);
        }

        for (index, email) in emails.into_iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = self.pacer.before_call(index) => {}
            }

            let attempt = AssertUnwindSafe(self.classifier.classify(&email, credential))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ClassificationError::Panicked(panic_message(payload))));

            let category = match attempt {
                Ok(category) => category,
                Err(e) => {
                    failures += 1;
                    warn!("Échec de l'email {}/{} ({}) : {} - General utilisé", index + 1, total, email.id, e);
                    Category::General
                }
            };

            info!(
                "📧 [{}/{}] \"{}\" → {}",
                index + 1,
                total,
                truncate_chars(&email.subject, 40),
                category
            );

            classified.push(ClassifiedEmail::new(email, category));
        }

        if cancelled {
            warn!("Lot annulé après {}/{} email(s)", classified.len(), total);
        }

        let summary = BatchSummary::from_emails(&classified);
        if total > 0 {
            info!("Résultats : {} ({} échec(s))", summary, failures);
        }

        BatchOutcome {
            emails: classified,
            summary,
            failures,
            cancelled,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
