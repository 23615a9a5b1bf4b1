use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::templates::render;
use crate::{Notice, Notifier};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    /// Encrypted relay when true: implicit TLS on port 465, STARTTLS on
    /// any other port. Plaintext only for local relays.
    pub tls: bool,
}

/// Port that speaks TLS from the first byte (SMTPS).
const SMTPS_PORT: u16 = 465;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    ImplicitTls,
    StartTls,
    Plain,
}

impl SmtpConfig {
    fn security(&self) -> Security {
        match (self.tls, self.port) {
            (false, _) => Security::Plain,
            (true, SMTPS_PORT) => Security::ImplicitTls,
            (true, _) => Security::StartTls,
        }
    }
}

pub struct SmtpNotifier {
    from: Mailbox,
    brand: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address).parse()?;

        let builder = match config.security() {
            Security::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?,
            Security::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        }
        .port(config.port);

        let builder = match (config.username, config.password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(username, password)),
            _ => builder,
        };

        Ok(Self {
            from,
            brand: config.from_name,
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notice: &Notice) -> Result<()> {
        let rendered = render(notice, &self.brand);
        let to: Mailbox = notice
            .recipient()
            .parse()
            .map_err(|e| anyhow!("Invalid recipient '{}': {}", notice.recipient(), e))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(rendered.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(rendered.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(rendered.html),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(
            to = %notice.recipient(),
            kind = notice.kind(),
            subject = %rendered.subject,
            "Email sent"
        );
        Ok(())
    }
}
