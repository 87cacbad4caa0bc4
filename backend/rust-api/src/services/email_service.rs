use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::models::email::{EmailSettings, ResultNotification};
use crate::services::credentials::CredentialCache;

/// Delivers the "results recorded" message for a stored game result.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &ResultNotification) -> Result<()>;
}

pub struct EmailService {
    credentials: Arc<CredentialCache>,
    recipients: Vec<String>,
}

impl EmailService {
    pub fn new(credentials: Arc<CredentialCache>, recipients: Vec<String>) -> Self {
        Self {
            credentials,
            recipients,
        }
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub async fn send_results_email(&self, notification: &ResultNotification) -> Result<()> {
        if self.recipients.is_empty() && notification.player_email.is_none() {
            bail!("No recipients configured for results email");
        }

        let settings = self
            .credentials
            .get()
            .await
            .context("Failed to obtain SMTP credentials")?;

        let email = self.build_message(&settings, notification)?;
        let mailer = self.build_mailer(&settings)?;

        if let Err(err) = mailer.send(email).await {
            // Rotated or revoked credentials are picked up on the next attempt.
            self.credentials.invalidate().await;
            return Err(err).context("Failed to send results email");
        }

        tracing::info!(
            player_name = %notification.player_name,
            "Results email sent"
        );
        Ok(())
    }

    fn build_message(
        &self,
        settings: &EmailSettings,
        notification: &ResultNotification,
    ) -> Result<Message> {
        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;

        let mut builder = Message::builder()
            .from(from_address)
            .subject(results_subject(notification.final_balance))
            .header(ContentType::TEXT_HTML);

        for recipient in &self.recipients {
            let to_address: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient email address: {}", recipient))?;
            builder = builder.to(to_address);
        }

        if let Some(player_email) = &notification.player_email {
            let cc_address: Mailbox = player_email
                .parse()
                .context("Invalid player email address")?;
            builder = builder.cc(cc_address);
        }

        builder
            .body(render_results_html(notification, Utc::now().year()))
            .context("Failed to build results email")
    }

    fn build_mailer(&self, settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(settings.login.clone(), settings.password.clone());

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .context("Invalid SMTP server for TLS")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port)
        .credentials(creds);

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn notify(&self, notification: &ResultNotification) -> Result<()> {
        self.send_results_email(notification).await
    }
}

/// Used when email delivery is switched off.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &ResultNotification) -> Result<()> {
        tracing::info!(
            player_name = %notification.player_name,
            final_balance = notification.final_balance,
            gift_type = notification.gift_type.as_str(),
            "Email delivery disabled, skipping results email"
        );
        Ok(())
    }
}

pub fn results_subject(final_balance: i64) -> String {
    format!("Birthday Challenge Results - ${} won!", final_balance)
}

pub fn render_results_html(notification: &ResultNotification, year: i32) -> String {
    format!(
        r#"<html>
  <head>
    <style>
      body {{ font-family: Arial, sans-serif; background-color: #f5f5f5; }}
      .container {{ max-width: 600px; margin: 0 auto; background-color: white; padding: 30px; border-radius: 8px; }}
      .header {{ text-align: center; border-bottom: 2px solid #ff6b35; padding-bottom: 20px; margin-bottom: 20px; }}
      .balance {{ font-size: 36px; font-weight: bold; color: #ff6b35; text-align: center; margin: 20px 0; }}
      .gift-choice {{ background-color: #f9f9f9; padding: 15px; border-left: 4px solid #ff6b35; margin: 15px 0; }}
      .footer {{ text-align: center; color: #666; font-size: 12px; margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header"><h1>Birthday Challenge Results</h1></div>
      <p>Hi {name},</p>
      <p>Congratulations on completing the Birthday Challenge! Here are your results:</p>
      <div class="balance">${balance}</div>
      <p style="text-align: center; color: #666;">Your real-world birthday gift amount</p>
      <div class="gift-choice"><strong>Your Choice:</strong><br>{gift}</div>
      <p>Your gift has been recorded and will be processed shortly. Thank you for playing!</p>
      <div class="footer"><p>The Birthday Challenge &bull; {year}</p></div>
    </div>
  </body>
</html>
"#,
        name = escape_html(&notification.player_name),
        balance = notification.final_balance,
        gift = notification.gift_type.label(),
        year = year,
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::GiftType;
    use crate::services::credentials::StaticCredentials;

    fn notification(email: Option<&str>) -> ResultNotification {
        ResultNotification {
            player_name: "Dave <script>".to_string(),
            final_balance: 77,
            gift_type: GiftType::Playstation,
            player_email: email.map(str::to_string),
        }
    }

    fn service(recipients: Vec<&str>) -> EmailService {
        let settings = EmailSettings {
            server: "127.0.0.1".to_string(),
            port: 2525,
            login: "user".to_string(),
            password: "pass".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Birthday Challenge".to_string(),
            use_tls: false,
        };
        EmailService::new(
            Arc::new(CredentialCache::new(Box::new(StaticCredentials::new(
                settings,
            )))),
            recipients.into_iter().map(str::to_string).collect(),
        )
    }

    #[test]
    fn subject_carries_balance() {
        assert_eq!(results_subject(77), "Birthday Challenge Results - $77 won!");
    }

    #[test]
    fn html_body_uses_gift_label_and_escapes_name() {
        let html = render_results_html(&notification(None), 2026);
        assert!(html.contains("PlayStation gift card"));
        assert!(html.contains("$77"));
        assert!(html.contains("Dave &lt;script&gt;"));
        assert!(html.contains("2026"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn message_addresses_recipients_and_copies_player() {
        let service = service(vec!["host@example.com"]);
        let settings = EmailSettings {
            server: "127.0.0.1".to_string(),
            port: 2525,
            login: String::new(),
            password: String::new(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Birthday Challenge".to_string(),
            use_tls: false,
        };

        let message = service
            .build_message(&settings, &notification(Some("dave@example.com")))
            .unwrap();
        let envelope = message.envelope();
        let to: Vec<String> = envelope.to().iter().map(|a| a.to_string()).collect();

        assert!(to.contains(&"host@example.com".to_string()));
        assert!(to.contains(&"dave@example.com".to_string()));

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Cc: dave@example.com"));
        assert!(formatted.contains("Content-Type: text/html"));
    }

    #[tokio::test]
    async fn refuses_to_send_without_any_recipient() {
        let err = service(vec![])
            .send_results_email(&notification(None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No recipients"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify(&notification(None)).await.is_ok());
    }
}
