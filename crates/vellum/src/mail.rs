/*
 *  Copyright 2025 Vellum Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outgoing mail and the transport seam.
//!
//! Mail cells build an [`OutgoingMail`] and hand it to whatever
//! [`MailTransport`] the host configured. [`RecordingMailer`] keeps the
//! messages in memory for tests and hosts that queue mail themselves; the
//! `smtp` feature adds a lettre-backed transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::MailError;
use crate::models::ExportFile;
use crate::render::fallback::escape_html;

/// Recipient input, either a list of addresses or a `,`/`;`-delimited
/// string.
#[derive(Debug, Clone)]
pub enum Recipients {
    List(Vec<String>),
    Text(String),
}

impl Recipients {
    /// Normalizes into a comma-joined address string.
    pub fn normalize(&self) -> String {
        match self {
            Recipients::List(items) => items
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(","),
            Recipients::Text(text) => text.replace(';', ","),
        }
    }
}

impl From<&str> for Recipients {
    fn from(text: &str) -> Self {
        Recipients::Text(text.to_string())
    }
}

impl From<Vec<String>> for Recipients {
    fn from(items: Vec<String>) -> Self {
        Recipients::List(items)
    }
}

/// A message assembled by a mail cell.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub subject: String,
    /// Comma-joined, normalized recipient addresses.
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub body_html: String,
    pub body_text: String,
    pub attachments: Vec<ExportFile>,
    /// When false the transport records the message without dispatching it.
    pub auto_send: bool,
}

impl OutgoingMail {
    /// Builds a message, normalizing recipients and deriving an HTML body
    /// from the text body when no HTML was given.
    ///
    /// Fails unless both a subject and at least one `to` recipient are
    /// present.
    pub fn build(
        subject: impl Into<String>,
        to: Recipients,
        body_html: Option<String>,
        body_text: Option<String>,
    ) -> Result<Self, MailError> {
        let subject = subject.into();
        let to = to.normalize();
        if subject.is_empty() || to.is_empty() {
            return Err(MailError::MissingSubjectOrRecipients);
        }
        let body_text = body_text.unwrap_or_default();
        let body_html = body_html.unwrap_or_else(|| escape_html(&body_text));
        Ok(Self {
            subject,
            to,
            cc: String::new(),
            bcc: String::new(),
            body_html,
            body_text,
            attachments: Vec::new(),
            auto_send: true,
        })
    }

    pub fn cc(mut self, cc: Recipients) -> Self {
        self.cc = cc.normalize();
        self
    }

    pub fn bcc(mut self, bcc: Recipients) -> Self {
        self.bcc = bcc.normalize();
        self
    }

    pub fn attach(mut self, file: ExportFile) -> Self {
        self.attachments.push(file);
        self
    }

    pub fn auto_send(mut self, auto_send: bool) -> Self {
        self.auto_send = auto_send;
        self
    }
}

/// Transport seam between mail cells and the host's mail system.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Creates the message in the host's mail system, dispatches it when
    /// `auto_send` is set, and returns its identifier.
    async fn create_and_send(&self, mail: OutgoingMail) -> Result<Uuid, MailError>;
}

/// In-memory transport that records every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Uuid, OutgoingMail)>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, in send order.
    pub fn messages(&self) -> Vec<(Uuid, OutgoingMail)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn create_and_send(&self, mail: OutgoingMail) -> Result<Uuid, MailError> {
        let id = Uuid::new_v4();
        self.sent.lock().push((id, mail));
        Ok(id)
    }
}

/// SMTP transport over lettre.
#[cfg(feature = "smtp")]
pub mod smtp {
    use base64::Engine as _;
    use lettre::message::header::ContentType;
    use lettre::message::{Attachment, MultiPart, SinglePart};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use tracing::info;

    use super::*;

    /// Sends mail through an SMTP relay. Messages with `auto_send` off are
    /// acknowledged without being dispatched.
    pub struct SmtpMailer {
        from_address: String,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    }

    impl SmtpMailer {
        pub fn new(
            host: &str,
            port: u16,
            username: String,
            password: String,
            from_address: String,
        ) -> Result<Self, MailError> {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Transport(e.to_string()))?
                .port(port)
                .credentials(Credentials::new(username, password))
                .build();
            Ok(Self {
                from_address,
                transport,
            })
        }

        fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
            let mut builder = Message::builder()
                .from(
                    self.from_address
                        .parse()
                        .map_err(|e| MailError::Transport(format!("invalid from address: {e}")))?,
                )
                .subject(&mail.subject);
            for address in mail.to.split(',').filter(|a| !a.trim().is_empty()) {
                builder = builder.to(address
                    .trim()
                    .parse()
                    .map_err(|e| MailError::Transport(format!("invalid recipient: {e}")))?);
            }
            for address in mail.cc.split(',').filter(|a| !a.trim().is_empty()) {
                builder = builder.cc(address
                    .trim()
                    .parse()
                    .map_err(|e| MailError::Transport(format!("invalid cc recipient: {e}")))?);
            }
            for address in mail.bcc.split(',').filter(|a| !a.trim().is_empty()) {
                builder = builder.bcc(address
                    .trim()
                    .parse()
                    .map_err(|e| MailError::Transport(format!("invalid bcc recipient: {e}")))?);
            }

            let body = MultiPart::alternative()
                .singlepart(SinglePart::plain(mail.body_text.clone()))
                .singlepart(SinglePart::html(mail.body_html.clone()));
            if !mail.attachments.is_empty() {
                let mut mixed = MultiPart::mixed().multipart(body);
                for file in &mail.attachments {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(&file.content_b64)
                        .map_err(|e| MailError::Transport(format!("bad attachment: {e}")))?;
                    mixed = mixed.singlepart(
                        Attachment::new(file.filename.clone())
                            .body(bytes, ContentType::parse("application/octet-stream").map_err(
                                |e| MailError::Transport(e.to_string()),
                            )?),
                    );
                }
                return builder
                    .multipart(mixed)
                    .map_err(|e| MailError::Transport(e.to_string()));
            }
            builder
                .multipart(body)
                .map_err(|e| MailError::Transport(e.to_string()))
        }
    }

    #[async_trait]
    impl MailTransport for SmtpMailer {
        async fn create_and_send(&self, mail: OutgoingMail) -> Result<Uuid, MailError> {
            let id = Uuid::new_v4();
            if !mail.auto_send {
                info!(subject = %mail.subject, "mail staged without dispatch");
                return Ok(id);
            }
            let message = self.build_message(&mail)?;
            self.transport
                .send(message)
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;
            info!(subject = %mail.subject, to = %mail.to, "mail sent");
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_normalize_lists_and_strings() {
        let list = Recipients::List(vec![" a@x.io ".into(), String::new(), "b@x.io".into()]);
        assert_eq!(list.normalize(), "a@x.io,b@x.io");
        assert_eq!(
            Recipients::from("a@x.io; b@x.io").normalize(),
            "a@x.io, b@x.io"
        );
    }

    #[test]
    fn build_requires_subject_and_recipients() {
        assert!(matches!(
            OutgoingMail::build("", Recipients::from("a@x.io"), None, None),
            Err(MailError::MissingSubjectOrRecipients)
        ));
        assert!(matches!(
            OutgoingMail::build("hi", Recipients::List(Vec::new()), None, None),
            Err(MailError::MissingSubjectOrRecipients)
        ));
    }

    #[test]
    fn html_body_falls_back_to_escaped_text() {
        let mail = OutgoingMail::build(
            "hi",
            Recipients::from("a@x.io"),
            None,
            Some("1 < 2".to_string()),
        )
        .unwrap();
        assert_eq!(mail.body_html, "1 &lt; 2");
    }

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::new();
        let mail = OutgoingMail::build("hi", Recipients::from("a@x.io"), None, None).unwrap();
        let id = mailer.create_and_send(mail).await.unwrap();
        let messages = mailer.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, id);
        assert_eq!(messages[0].1.to, "a@x.io");
    }
}
