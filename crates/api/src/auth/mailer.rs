//! Outbound email for account verification and password reset.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport. When SMTP is not
//! configured, [`LogMailer`] writes the message to the log instead so that
//! local runs can still follow verification links.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email-verification message. The link is valid for 24 hours.
pub fn verification_email(app_url: &str, to: &str, username: &str, token: &str) -> OutgoingEmail {
    let link = format!("{}/verify-email?token={token}", app_url.trim_end_matches('/'));
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        body: format!(
            "Hi {username},\n\n\
             Confirm your email address by opening the link below:\n\n{link}\n\n\
             The link expires in 24 hours. If you did not create an account, ignore this email.\n"
        ),
    }
}

/// Password-reset message. The link is valid for 1 hour.
pub fn password_reset_email(app_url: &str, to: &str, username: &str, token: &str) -> OutgoingEmail {
    let link = format!("{}/reset-password?token={token}", app_url.trim_end_matches('/'));
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        body: format!(
            "Hi {username},\n\n\
             A password reset was requested for your account. Choose a new password here:\n\n{link}\n\n\
             The link expires in 1 hour. If you did not request a reset, ignore this email.\n"
        ),
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
}

impl SmtpConfig {
    /// `None` unless both `SMTP_HOST` and `FROM_EMAIL` are set.
    ///
    /// | Variable        | Required | Default |
    /// |-----------------|----------|---------|
    /// | `SMTP_HOST`     | yes      |         |
    /// | `FROM_EMAIL`    | yes      |         |
    /// | `SMTP_PORT`     | no       | `587`   |
    /// | `SMTP_USERNAME` | no       |         |
    /// | `SMTP_PASSWORD` | no       |         |
    pub fn from_env() -> Option<Self> {
        Some(Self {
            host: std::env::var("SMTP_HOST").ok()?,
            from_email: std::env::var("FROM_EMAIL").ok()?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

pub struct SmtpMailer {
    from_email: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);
        if let (Some(user), Some(pass)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        Ok(Self {
            from_email: config.from_email,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from_email.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Logs messages instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(())
    }
}
