use anyhow::{Context, Result};
use log::{error, info};
use slack_morphism::prelude::*;

use crate::config::SlackConfig;
use crate::store::StoredRun;

pub struct SlackNotifier {
    client: SlackClient<SlackClientHyperHttpsConnector>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initialisation du notifieur Slack");

        let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
        let token = SlackApiToken::new(config.bot_token.clone().into());
        let channel_id = SlackChannelId::new(config.channel_id.clone());

        Ok(SlackNotifier {
            client,
            token,
            channel_id,
        })
    }

    /// Envoie le résumé par catégorie d'une exécution terminée
    pub async fn notify_run_completed(&self, run: &StoredRun) -> Result<()> {
        info!("Envoi du résumé Slack pour l'exécution {}", run.run_id);
        self.send_message(&format_run_summary(run)).await
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(text.to_string()),
        );

        let session = self.client.open_session(&self.token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                info!("✅ Message Slack envoyé avec succès: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Erreur lors de l'envoi du message Slack: {}", e);
                Err(e).context("Impossible d'envoyer le message Slack")
            }
        }
    }
}

pub fn format_run_summary(run: &StoredRun) -> String {
    let mut message_text = format!(
        "📬 *Boîte de réception classée*\n\n\
         • Exécution: `{}`\n\
         • Source: {}\n\
         • Date: {}\n\
         • Emails: *{}*\n",
        run.run_id,
        run.source,
        run.classified_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.emails.len()
    );

    if !run.summary.is_empty() {
        message_text.push_str("• Catégories:\n");
        for (category, count) in run.summary.iter() {
            message_text.push_str(&format!("  - {}: {}\n", category, count));
        }
    }

    if run.failures > 0 {
        message_text.push_str(&format!(
            "• ⚠️ {} email(s) non classé(s), rangé(s) en General\n",
            run.failures
        ));
    }

    if run.cancelled {
        message_text.push_str("• ⏹️ Exécution annulée avant la fin du lot\n");
    }

    message_text
}
