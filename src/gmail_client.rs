use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::{stream, StreamExt};
use google_gmail1::api::Scope;
use google_gmail1::{hyper, hyper_rustls, oauth2, Gmail};
use log::{debug, info, warn};

use crate::config::GmailConfig;
use crate::email::{EmailSource, RawEmail};

/// Messages récupérés en parallèle ; les résultats gardent l'ordre du listing
const FETCH_CONCURRENCY: usize = 5;

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connexion à l'API Gmail via OAuth2");

        let credentials_path = config
            .credentials_path
            .as_deref()
            .context("GMAIL_CREDENTIALS_PATH n'est pas défini")?;

        // Lire les identifiants client OAuth2 depuis le fichier
        let secret = oauth2::read_application_secret(credentials_path)
            .await
            .context("Impossible de lire le fichier d'identifiants OAuth2")?;

        // Authentificateur avec persistance du token
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Impossible de créer l'authentificateur OAuth2")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Connexion à l'API Gmail établie");

        Ok(GmailClient { hub })
    }

    /// Liste les identifiants des `limit` messages les plus récents
    pub async fn list_recent_ids(&self, limit: usize) -> Result<Vec<String>> {
        info!("Recherche des {} email(s) les plus récents", limit);

        let max_results = u32::try_from(limit).unwrap_or(u32::MAX);

        let result = self
            .hub
            .users()
            .messages_list("me")
            .max_results(max_results)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .context("Erreur lors du listing des emails")?;

        let message_ids: Vec<String> = result
            .1
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .take(limit)
            .collect();

        info!("{} email(s) trouvé(s)", message_ids.len());

        Ok(message_ids)
    }

    pub async fn fetch_email(&self, message_id: &str) -> Result<RawEmail> {
        debug!("Récupération de l'email {}", message_id);

        let (_, message) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("raw")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .with_context(|| format!("Impossible de récupérer l'email {}", message_id))?;

        // Le contenu brut est déjà décodé par l'API Gmail (format RFC822)
        let raw = message.raw.context("Pas de contenu brut dans l'email")?;
        let snippet = message.snippet.unwrap_or_default();

        debug!("Email {} récupéré, taille : {} octets", message_id, raw.len());

        parse_raw_message(message_id, &snippet, &raw)
    }

    async fn fetch_recent_emails(&self, limit: usize) -> Result<Vec<RawEmail>> {
        let message_ids = self.list_recent_ids(limit).await?;

        let fetched: Vec<Option<RawEmail>> = stream::iter(message_ids)
            .map(|id| async move {
                match self.fetch_email(&id).await {
                    Ok(email) => Some(email),
                    Err(e) => {
                        warn!("Email {} ignoré : {:#}", id, e);
                        None
                    }
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        Ok(fetched.into_iter().flatten().collect())
    }
}

impl EmailSource for GmailClient {
    fn fetch_recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RawEmail>>> {
        Box::pin(self.fetch_recent_emails(limit))
    }

    fn source_name(&self) -> &str {
        "gmail"
    }
}

/// Convertit un message RFC822 en `RawEmail`.
/// L'en-tête Date est conservé tel quel, sans normalisation.
pub fn parse_raw_message(id: &str, snippet: &str, raw: &[u8]) -> Result<RawEmail> {
    let parsed = mail_parser::MessageParser::default()
        .parse(raw)
        .context("Impossible de parser l'email")?;

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("No Subject")
        .to_string();

    let from = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (&addr.name, &addr.address) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (None, Some(email)) => email.to_string(),
            (Some(name), None) => name.to_string(),
            _ => "Unknown".to_string(),
        })
        .unwrap_or_else(|| "Unknown".to_string());

    let date = parsed
        .header_raw("Date")
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let body = parsed.body_text(0).unwrap_or_default();

    Ok(RawEmail::new(id, subject, from, date, snippet, &body))
}
