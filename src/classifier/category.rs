use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ensemble fermé des catégories d'un email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Important,
    Promotions,
    Social,
    Marketing,
    Spam,
    General,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("catégorie inconnue '{0}' (attendu : Important, Promotions, Social, Marketing, Spam ou General)")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Important,
        Category::Promotions,
        Category::Social,
        Category::Marketing,
        Category::Spam,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Important => "Important",
            Category::Promotions => "Promotions",
            Category::Social => "Social",
            Category::Marketing => "Marketing",
            Category::Spam => "Spam",
            Category::General => "General",
        }
    }

    /// Ramène une réponse brute du modèle à l'ensemble fermé.
    ///
    /// Tout caractère qui n'est pas une lettre ASCII est retiré, puis le reste est
    /// comparé aux noms canoniques sans tenir compte de la casse. Tout le reste,
    /// chaîne vide comprise, donne `General`.
    pub fn validate(raw: &str) -> Category {
        let letters: String = raw.chars().filter(|c| c.is_ascii_alphabetic()).collect();

        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(&letters))
            .unwrap_or(Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing strict des saisies utilisateur ; contrairement à `validate`, rejette les noms inconnus.
impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(trimmed.to_string()))
    }
}
