use std::time::Duration;
use thiserror::Error;

/// Raison pour laquelle un email n'a pas pu être classé.
///
/// Le lot convertit chaque variante en `Category::General`.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("erreur de transport : {0}")]
    Transport(#[from] reqwest::Error),

    #[error("délai dépassé après {0:?}")]
    Timeout(Duration),

    #[error("l'endpoint a répondu HTTP {status} : {body}")]
    Endpoint { status: u16, body: String },

    #[error("réponse invalide : {0}")]
    MalformedResponse(String),

    #[error("panique pendant la classification : {0}")]
    Panicked(String),
}
