use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::classifier::{BatchOutcome, BatchSummary, Category, UnknownCategory};
use crate::email::ClassifiedEmail;

const RESULTS_FILE: &str = "classified_emails.json";

/// Une exécution de classification, conservée entre deux lancements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub run_id: Uuid,
    pub classified_at: DateTime<Utc>,
    pub source: String,
    pub emails: Vec<ClassifiedEmail>,
    pub summary: BatchSummary,
    pub failures: usize,
    pub cancelled: bool,
}

impl StoredRun {
    pub fn from_outcome(source: &str, outcome: BatchOutcome) -> Self {
        StoredRun {
            run_id: Uuid::new_v4(),
            classified_at: Utc::now(),
            source: source.to_string(),
            emails: outcome.emails,
            summary: outcome.summary,
            failures: outcome.failures,
            cancelled: outcome.cancelled,
        }
    }
}

/// Derniers emails classés, conservés en JSON dans le répertoire des données
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ResultStore { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    /// Remplace l'exécution sauvegardée. Le fichier est écrit à côté de sa cible puis renommé.
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Impossible de créer {}", self.dir.display()))?;

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(run).context("Impossible de sérialiser les résultats")?;
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Impossible d'écrire {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Impossible de remplacer {}", path.display()))?;

        info!("💾 {} email(s) classé(s) sauvegardé(s) dans {}", run.emails.len(), path.display());
        Ok(path)
    }

    /// Charge la dernière exécution. Un fichier corrompu est supprimé et considéré absent.
    pub fn load(&self) -> Result<Option<StoredRun>> {
        let path = self.path();

        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Aucun résultat sauvegardé dans {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Impossible de lire {}", path.display()));
            }
        };

        match serde_json::from_slice(&content) {
            Ok(run) => Ok(Some(run)),
            Err(e) => {
                warn!("⚠️  Résultats illisibles supprimés dans {} : {}", path.display(), e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Supprime les résultats sauvegardés. Indique si quelque chose a été supprimé.
    pub fn clear(&self) -> Result<bool> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("🗑️  Résultats supprimés {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Impossible de supprimer {}", path.display())),
        }
    }
}

/// Écrit des lignes `id,date,from,subject,category`. Renvoie le nombre de lignes.
pub fn export_csv(emails: &[ClassifiedEmail], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Impossible de créer {}", path.display()))?;

    writer.write_record(["id", "date", "from", "subject", "category"])?;
    for email in emails {
        writer.write_record([
            email.email.id.as_str(),
            email.email.date.as_str(),
            email.email.from.as_str(),
            email.email.subject.as_str(),
            email.category.as_str(),
        ])?;
    }
    writer.flush().context("Impossible de finaliser l'export CSV")?;

    info!("📄 {} email(s) exporté(s) vers {}", emails.len(), path.display());
    Ok(emails.len())
}

/// Emails à afficher : tous, ou une seule catégorie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, email: &ClassifiedEmail) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => email.category == *category,
        }
    }

    pub fn apply<'a>(&self, emails: &'a [ClassifiedEmail]) -> Vec<&'a ClassifiedEmail> {
        emails.iter().filter(|email| self.matches(email)).collect()
    }
}

impl FromStr for CategoryFilter {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}
