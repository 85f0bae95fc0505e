use anyhow::Result;
use log::warn;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::classifier::{Credential, DEFAULT_PROMPT_TEMPLATE, DEFAULT_SYSTEM_PROMPT};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub classifier: ClassifierConfig,
    pub data_dir: String,
    pub scheduler: SchedulerConfig,
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (ex: ["08:00", "18:00"])
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: Option<String>,
    pub token_cache_path: String,
    pub max_results: usize,
}

/// Endpoint de complétion, modèle et prompt utilisés pour la classification
#[derive(Deserialize, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub prompt_template: String,
    pub preview_chars: usize,
    pub pacing_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "nvidia/nemotron-nano-12b-2-vl:free".to_string(),
            temperature: 0.0,
            max_tokens: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            preview_chars: 200,
            pacing_ms: 200,
            timeout_secs: 20,
        }
    }
}

impl ClassifierConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn credential(&self) -> Result<Credential> {
        self.api_key
            .as_deref()
            .and_then(Credential::new)
            .ok_or_else(|| anyhow::anyhow!("CLASSIFIER_API_KEY non défini ou vide"))
    }
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("preview_chars", &self.preview_chars)
            .field("pacing_ms", &self.pacing_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Self::from_lookup(|name| std::env::var(name).ok()))
    }

    /// Construit la configuration depuis une source de variables (l'environnement en production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClassifierConfig::default();

        Config {
            gmail: GmailConfig {
                credentials_path: lookup("GMAIL_CREDENTIALS_PATH"),
                token_cache_path: lookup("GMAIL_TOKEN_CACHE_PATH")
                    .unwrap_or_else(|| "./gmail-token-cache.json".to_string()),
                max_results: parse_or(&lookup, "GMAIL_MAX_RESULTS", 15),
            },
            classifier: ClassifierConfig {
                api_key: lookup("CLASSIFIER_API_KEY"),
                base_url: lookup("CLASSIFIER_BASE_URL").unwrap_or(defaults.base_url),
                model: lookup("CLASSIFIER_MODEL").unwrap_or(defaults.model),
                temperature: parse_or(&lookup, "CLASSIFIER_TEMPERATURE", defaults.temperature),
                max_tokens: parse_or(&lookup, "CLASSIFIER_MAX_TOKENS", defaults.max_tokens),
                system_prompt: lookup("CLASSIFIER_SYSTEM_PROMPT")
                    .unwrap_or(defaults.system_prompt),
                prompt_template: lookup("CLASSIFIER_PROMPT_TEMPLATE")
                    .unwrap_or(defaults.prompt_template),
                preview_chars: parse_or(&lookup, "CLASSIFIER_PREVIEW_CHARS", defaults.preview_chars),
                pacing_ms: parse_or(&lookup, "CLASSIFIER_PACING_MS", defaults.pacing_ms),
                timeout_secs: parse_or(&lookup, "CLASSIFIER_TIMEOUT_SECS", defaults.timeout_secs),
            },
            data_dir: lookup("DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            scheduler: SchedulerConfig {
                enabled: parse_or(&lookup, "SCHEDULER_ENABLED", false),
                schedule_times: lookup("SCHEDULER_TIMES")
                    .unwrap_or_else(|| "08:00".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            slack: match (lookup("SLACK_BOT_TOKEN"), lookup("SLACK_CHANNEL_ID")) {
                (Some(bot_token), Some(channel_id)) => Some(SlackConfig {
                    bot_token,
                    channel_id,
                }),
                _ => {
                    warn!("SLACK_BOT_TOKEN ou SLACK_CHANNEL_ID non défini - notifications Slack désactivées");
                    None
                }
            },
        }
    }

    /// Vérifie les variables nécessaires à une exécution. Les identifiants Gmail
    /// ne sont requis que si les emails ne viennent pas d'un fichier.
    pub fn check_required(&self, needs_gmail: bool) -> Result<()> {
        let mut missing_vars = Vec::new();

        if self.classifier.credential().is_err() {
            missing_vars.push("CLASSIFIER_API_KEY");
        }
        if needs_gmail && self.gmail.credentials_path.is_none() {
            missing_vars.push("GMAIL_CREDENTIALS_PATH");
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Variables d'environnement manquantes: {}\n\
                 \n\
                 💡 Solutions :\n\
                 1. Créer un fichier .env avec vos credentials :\n\
                    CLASSIFIER_API_KEY=sk-...\n\
                    GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                 \n\
                 2. Ou définir les variables manuellement :\n\
                    export CLASSIFIER_API_KEY=sk-...\n\
                    export GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                    cargo run -- --dry-run\n\
                 \n\
                 3. Utiliser --input emails.json pour classer une liste d'emails sauvegardée sans Gmail",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Valeur invalide '{}' pour {} - valeur par défaut utilisée", raw, name);
            default
        }),
        None => default,
    }
}
