use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::error::AppError;
use crate::parser::Substitution;

/// Embed color for a newly detected substitution.
pub const COLOR_NEW: u32 = 0x00ff00;
/// Embed color for operator alerts.
pub const COLOR_ALERT: u32 = 0xff0000;

#[derive(Serialize, Debug)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

#[derive(Serialize, Debug)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

/// Delivers formatted announcement embeds to a Discord-style webhook.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: String,
    content: Option<String>,
}

impl Notifier {
    pub fn new(client: Client, webhook_url: String, content: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
            content,
        }
    }

    /// POST one embed to the webhook. The endpoint acknowledges with 204;
    /// any other status is a delivery failure.
    pub async fn send_embed(
        &self,
        title: &str,
        description: &str,
        color: u32,
    ) -> Result<(), AppError> {
        let message = WebhookMessage {
            content: self.content.clone(),
            embeds: vec![Embed {
                title: title.to_string(),
                description: description.to_string(),
                color,
            }],
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::NO_CONTENT {
            return Err(AppError::Delivery { status });
        }

        Ok(())
    }

    /// Announce one newly detected substitution.
    pub async fn send_substitution(&self, sub: &Substitution) -> Result<(), AppError> {
        let (title, description) = format_substitution(sub);
        self.send_embed(&title, &description, COLOR_NEW).await
    }

    /// Operator alert (fetch outages, shutdown diagnostics).
    pub async fn send_alert(&self, message: &str) -> Result<(), AppError> {
        self.send_embed("\u{26a0}\u{fe0f} Monitor zastępstw", message, COLOR_ALERT)
            .await
    }
}

fn format_substitution(sub: &Substitution) -> (String, String) {
    let title = format!("Lekcja: {}", sub.lesson_num);
    let description = format!(
        "Lekcja: `{}`\nZa: `{}`\nSala: `{}`\nDodatkowa informacja: `{}`\nZ: `{}`\nData: `{}`",
        sub.lesson_name, sub.substitute, sub.room, sub.additional_info, sub.teacher, sub.day
    );
    (title, description)
}
