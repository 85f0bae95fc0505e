use log::{debug, warn};

use super::category::Category;
use super::completion::{CompletionClient, CompletionRequest, Credential};
use super::error::ClassificationError;
use crate::config::ClassifierConfig;
use crate::email::{truncate_chars, RawEmail};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an email classifier. Respond with ONLY one word: \
Important, Promotions, Social, Marketing, Spam, or General.";

/// Variables : `{from}`, `{subject}`, `{preview}`
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "From: {from}\nSubject: {subject}\nPreview: {preview}\n\nWhat category is this email?";

/// Classe un email avec un seul appel de complétion
pub struct EmailClassifier<C> {
    client: C,
    model: String,
    system_prompt: String,
    prompt_template: String,
    temperature: f32,
    max_tokens: u32,
    preview_chars: usize,
}

impl<C: CompletionClient> EmailClassifier<C> {
    pub fn new(client: C, config: &ClassifierConfig) -> Self {
        EmailClassifier {
            client,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            prompt_template: config.prompt_template.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            preview_chars: config.preview_chars,
        }
    }

    pub fn build_request(&self, email: &RawEmail) -> CompletionRequest {
        let preview = preview_text(email, self.preview_chars);

        CompletionRequest {
            model: self.model.clone(),
            system: self.system_prompt.clone(),
            user: render_prompt(&self.prompt_template, email, preview),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub async fn classify(
        &self,
        email: &RawEmail,
        credential: &Credential,
    ) -> Result<Category, ClassificationError> {
        let request = self.build_request(email);
        let answer = self.client.complete(&request, credential).await?;
        let answer = answer.trim();

        debug!(
            "🤖 Réponse du modèle {:?} pour l'email \"{}\"",
            answer,
            truncate_chars(&email.subject, 40)
        );

        let category = Category::validate(answer);
        debug!("Catégorie finale pour l'email {} : {}", email.id, category);

        Ok(category)
    }

    /// Comme `classify`, mais tout échec donne `General`.
    pub async fn classify_or_general(&self, email: &RawEmail, credential: &Credential) -> Category {
        match self.classify(email, credential).await {
            Ok(category) => category,
            Err(e) => {
                warn!("Échec de la classification de l'email {} : {}", email.id, e);
                Category::General
            }
        }
    }
}

/// L'extrait s'il existe, sinon le début du corps.
pub fn preview_text(email: &RawEmail, max_chars: usize) -> &str {
    if email.snippet.is_empty() {
        truncate_chars(&email.body, max_chars)
    } else {
        &email.snippet
    }
}

/// Remplace les variables du modèle en une seule passe : un texte d'email
/// contenant `{preview}` n'est jamais substitué une seconde fois.
pub fn render_prompt(template: &str, email: &RawEmail, preview: &str) -> String {
    let mut rendered = String::with_capacity(template.len() + preview.len() + 64);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];

        let (value, placeholder_len) = if tail.starts_with("{from}") {
            (Some(email.from.as_str()), "{from}".len())
        } else if tail.starts_with("{subject}") {
            (Some(email.subject.as_str()), "{subject}".len())
        } else if tail.starts_with("{preview}") {
            (Some(preview), "{preview}".len())
        } else {
            (None, 1)
        };

        match value {
            Some(value) => rendered.push_str(value),
            None => rendered.push('{'),
        }
        rest = &tail[placeholder_len..];
    }
    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct CannedClient {
        answer: Result<String, u16>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedClient {
        fn answering(answer: &str) -> Self {
            CannedClient { answer: Ok(answer.to_string()), seen: Mutex::new(Vec::new()) }
        }

        fn failing(status: u16) -> Self {
            CannedClient { answer: Err(status), seen: Mutex::new(Vec::new()) }
        }
    }

    impl CompletionClient for CannedClient {
        fn complete<'a>(
            &'a self,
            request: &'a CompletionRequest,
            _credential: &'a Credential,
        ) -> BoxFuture<'a, Result<String, ClassificationError>> {
            self.seen.lock().unwrap().push(request.clone());
            let answer = match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ClassificationError::Endpoint {
                    status: *status,
                    body: "rate limited".to_string(),
                }),
            };
            Box::pin(async move { answer })
        }
    }

    fn email(snippet: &str, body: &str) -> RawEmail {
        RawEmail::new("m1", "Weekly deals", "Shop <deals@shop.example>", "", snippet, body)
    }

    fn credential() -> Credential {
        Credential::new("sk-test").unwrap()
    }

    #[test]
    fn test_preview_prefers_snippet() {
        let with_snippet = email("Big sale today", "body text");
        assert_eq!(preview_text(&with_snippet, 4), "Big sale today");

        let without_snippet = email("", "body text that is long");
        assert_eq!(preview_text(&without_snippet, 4), "body");
    }

    #[test]
    fn test_render_prompt_substitutes_once() {
        let mut raw = email("", "");
        raw.subject = "About {preview}".to_string();

        let prompt = render_prompt("S={subject} P={preview} {other}", &raw, "snip");
        assert_eq!(prompt, "S=About {preview} P=snip {other}");
    }

    #[test]
    fn test_build_request_uses_config() {
        let config = ClassifierConfig::default();
        let classifier = EmailClassifier::new(CannedClient::answering("Spam"), &config);

        let request = classifier.build_request(&email("Big sale today", ""));
        assert_eq!(request.model, config.model);
        assert_eq!(request.max_tokens, 10);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.system, DEFAULT_SYSTEM_PROMPT);
        assert!(request.user.contains("From: Shop <deals@shop.example>"));
        assert!(request.user.contains("Subject: Weekly deals"));
        assert!(request.user.contains("Preview: Big sale today"));
    }

    #[tokio::test]
    async fn test_classify_validates_model_answer() {
        let classifier =
            EmailClassifier::new(CannedClient::answering("  promotions.\n"), &ClassifierConfig::default());

        let category = classifier.classify(&email("", "x"), &credential()).await.unwrap();
        assert_eq!(category, Category::Promotions);
        assert_eq!(classifier.client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_general() {
        let classifier = EmailClassifier::new(CannedClient::answering(""), &ClassifierConfig::default());

        let category = classifier.classify(&email("", ""), &credential()).await.unwrap();
        assert_eq!(category, Category::General);
    }

    #[tokio::test]
    async fn test_endpoint_failure_is_reported_then_defaulted() {
        let classifier = EmailClassifier::new(CannedClient::failing(429), &ClassifierConfig::default());

        let err = classifier.classify(&email("", ""), &credential()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Endpoint { status: 429, .. }));

        let category = classifier.classify_or_general(&email("", ""), &credential()).await;
        assert_eq!(category, Category::General);
    }
}
