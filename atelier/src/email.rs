//! Email service for relaying contact form messages to the site owner.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use tracing::instrument;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

/// A message submitted through the public contact form
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
    contact_to: Option<Mailbox>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from = format!("{} <{}>", email_config.from_name, email_config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let contact_to = email_config
            .contact_to
            .as_deref()
            .map(|to| to.parse::<Mailbox>())
            .transpose()
            .map_err(|e| Error::Internal {
                operation: format!("parse contact email: {e}"),
            })?;

        Ok(Self {
            transport,
            from,
            contact_to,
        })
    }

    /// Deliver a contact form message to the configured inbox, with replies going to the visitor.
    #[instrument(skip(self, contact), err)]
    pub async fn send_contact_email(&self, contact: &ContactMessage) -> Result<(), Error> {
        let to = self.contact_to.clone().ok_or_else(|| Error::Internal {
            operation: "send contact email: email.contact_to is not configured".to_string(),
        })?;

        let reply_to = contact.email.trim().parse::<Mailbox>().map_err(|_| Error::BadRequest {
            message: "Invalid email address".to_string(),
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .reply_to(reply_to)
            .subject(contact_subject(&contact.name))
            .header(ContentType::TEXT_PLAIN)
            .body(contact_body(contact))
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

fn contact_subject(name: &str) -> String {
    format!("New contact from the site - {}", name.trim())
}

fn contact_body(contact: &ContactMessage) -> String {
    format!(
        "Name: {}\nEmail: {}\n\nMessage:\n{}",
        contact.name.trim(),
        contact.email.trim(),
        contact.message
    )
}
