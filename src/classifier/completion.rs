use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::ClassificationError;
use crate::email::truncate_chars;

/// Secret Bearer de l'endpoint de complétion. Jamais affiché.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Renvoie `None` pour une valeur vide.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Credential(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Une complétion : une instruction système et un message utilisateur
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Transport de complétion utilisé par le classifieur
pub trait CompletionClient: Send + Sync {
    /// Renvoie le texte de la première complétion ; vide si le modèle n'a rien envoyé.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<String, ClassificationError>>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client `POST {base}/chat/completions` compatible OpenAI
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        anyhow::ensure!(!base.is_empty(), "l'URL de base du classifieur ne doit pas être vide");

        let http = reqwest::Client::builder()
            .user_agent(concat!("mailsorter/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Impossible de créer le client HTTP")?;

        Ok(ChatCompletionsClient {
            http,
            endpoint: format!("{}/chat/completions", base),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        credential: &Credential,
    ) -> Result<String, ClassificationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClassificationError::Endpoint {
                status: status.as_u16(),
                body: truncate_chars(&text, 200).to_string(),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            ClassificationError::MalformedResponse(format!(
                "{} | brut : {}",
                e,
                truncate_chars(&text, 200)
            ))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClassificationError::MalformedResponse("aucun choix".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<String, ClassificationError>> {
        Box::pin(async move {
            debug!("POST {} (modèle {})", self.endpoint, request.model);

            tokio::time::timeout(self.timeout, self.send(request, credential))
                .await
                .map_err(|_| ClassificationError::Timeout(self.timeout))?
        })
    }
}
