/// Structures communes à la récupération, la classification et la sauvegarde
use serde::{Deserialize, Serialize};

use crate::classifier::Category;

/// Nombre maximal de caractères conservés du corps d'un email
pub const BODY_MAX_CHARS: usize = 500;

/// Email tel que fourni par une source, immuable une fois créé
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEmail {
    pub id: String,
    pub subject: String,
    pub from: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body: String,
}

impl RawEmail {
    /// Construit un email en tronquant le corps à `BODY_MAX_CHARS`.
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        from: impl Into<String>,
        date: impl Into<String>,
        snippet: impl Into<String>,
        body: &str,
    ) -> Self {
        RawEmail {
            id: id.into(),
            subject: subject.into(),
            from: from.into(),
            date: date.into(),
            snippet: snippet.into(),
            body: truncate_chars(body, BODY_MAX_CHARS).to_string(),
        }
    }
}

/// Un email et sa catégorie. Jamais construit sans catégorie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedEmail {
    #[serde(flatten)]
    pub email: RawEmail,
    pub category: Category,
}

impl ClassifiedEmail {
    pub fn new(email: RawEmail, category: Category) -> Self {
        ClassifiedEmail { email, category }
    }

    pub fn id(&self) -> &str {
        &self.email.id
    }
}

/// Renvoie les `max_chars` premiers caractères de `text`, sans couper un caractère.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
