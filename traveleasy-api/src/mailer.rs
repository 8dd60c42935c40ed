use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Mutex;
use tracing::info;
use traveleasy_store::app_config::MailConfig;

const APP_NAME: &str = "TravelEasy";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("smtp error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, name: &str, code: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.expose().clone());
        // Port 465 speaks TLS from the first byte, anything else upgrades with STARTTLS.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            transport: builder.port(config.port).credentials(credentials).build(),
            from: format!("{} <{}>", APP_NAME, config.sender()),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, name: &str, code: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| MailError::Address(format!("{}", e)))?)
            .to(to.parse().map_err(|e| MailError::Address(format!("{}", e)))?)
            .subject(format!("Your {} verification code", APP_NAME))
            .header(ContentType::TEXT_HTML)
            .body(verification_html(name, code))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!("Verification email sent to {}", to);
        Ok(())
    }
}

/// Used when no SMTP server is configured: the code goes to the log instead.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_verification(&self, to: &str, _name: &str, code: &str) -> Result<(), MailError> {
        info!("SMTP not configured; verification code for {} is {}", to, code);
        Ok(())
    }
}

/// Keeps every message in memory. Lets tests read back the code a user was sent.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code sent to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.iter().rev().find(|(addr, _)| addr == to).map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, _name: &str, code: &str) -> Result<(), MailError> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push((to.to_string(), code.to_string()));
        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn verification_html(name: &str, code: &str) -> String {
    let name = escape_html(name);
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
    <meta charset="utf-8" />
    <title>Verify your email</title>
</head>
<body style="margin: 0; padding: 0; background-color: #f4f6f8; font-family: Arial, sans-serif;">
    <div style="max-width: 600px; margin: 24px auto; background: #ffffff; border-radius: 8px; overflow: hidden;">
        <div style="background: #059669; color: #ffffff; padding: 24px; text-align: center;">
            <h1 style="margin: 0; font-size: 20px;">Welcome to {app}</h1>
        </div>
        <div style="padding: 24px; color: #0f172a; line-height: 1.5;">
            <p style="font-weight: 600;">Hi {name},</p>
            <p style="color: #475569;">Use the code below to verify your email address and finish setting up your account.</p>
            <p style="background: #f8fafc; border: 1px dashed #10b981; padding: 16px; text-align: center; font-size: 28px; letter-spacing: 6px; font-weight: 700;">{code}</p>
            <p style="color: #64748b; font-size: 13px;">If you didn't create an account with {app}, you can ignore this email.</p>
        </div>
    </div>
</body>
</html>
"#,
        app = APP_NAME,
        name = name,
        code = code,
    )
}
