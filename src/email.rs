use axum::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

/// A single outbound message. Delivery is fire-and-forget: the boolean result
/// is advisory and must never abort the flow that requested the send.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundEmail) -> bool;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("SMTP_FROM is not a valid mailbox: {e}"))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutboundEmail) -> bool {
        let to: Mailbox = match mail.to.parse() {
            Ok(m) => m,
            Err(e) => {
                warn!(to = %mail.to, error = %e, "invalid recipient address");
                return false;
            }
        };

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(mail.text, mail.html))
        {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to build email message");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %mail.to, subject = %mail.subject, "email sent");
                true
            }
            Err(e) => {
                warn!(to = %mail.to, error = %e, "email send failed");
                false
            }
        }
    }
}

/// Stand-in used when SMTP is not configured. Drops mail on the floor.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, mail: OutboundEmail) -> bool {
        info!(to = %mail.to, subject = %mail.subject, "smtp not configured; email not sent");
        false
    }
}
